//! Address lookup against a Nominatim-compatible `/search` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

/// Decode a `/search?format=json` body. Entries with unparsable coordinates
/// are dropped.
fn parse_places(body: &str) -> AppResult<Vec<Place>> {
    let raw: Vec<NominatimPlace> = serde_json::from_str(body)
        .map_err(|e| AppError::Internal(format!("Unexpected geocoder response: {}", e)))?;

    Ok(raw
        .into_iter()
        .filter_map(|p| {
            Some(Place {
                lat: p.lat.parse().ok()?,
                lng: p.lon.parse().ok()?,
                display_name: p.display_name,
            })
        })
        .collect())
}

#[derive(Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(base_url: &str, user_agent: &str) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn search(&self, address: &str, limit: usize) -> AppResult<Vec<Place>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AppError::BadRequest("Address is required".to_string()));
        }

        let limit = limit.to_string();
        let body = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", address), ("format", "json"), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let places = parse_places(&body)?;
        tracing::debug!(address, results = places.len(), "Geocoder lookup");
        Ok(places)
    }

    /// Best match for an address.
    pub async fn lookup(&self, address: &str) -> AppResult<Place> {
        self.search(address, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Address not found".to_string()))
    }

    /// Up to five candidates for autocompletion; may be empty.
    pub async fn suggest(&self, address: &str) -> AppResult<Vec<Place>> {
        self.search(address, SUGGESTION_LIMIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_results() {
        let body = r#"[
            {"place_id": 1, "lat": "12.9716", "lon": "77.5946", "display_name": "MG Road, Bengaluru"},
            {"place_id": 2, "lat": "not-a-number", "lon": "77.6", "display_name": "Broken"}
        ]"#;

        let places = parse_places(body).unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].lat, 12.9716);
        assert_eq!(places[0].lng, 77.5946);
        assert_eq!(places[0].display_name, "MG Road, Bengaluru");
    }

    #[test]
    fn empty_result_list_is_not_an_error() {
        assert!(parse_places("[]").unwrap().is_empty());
    }

    #[test]
    fn garbage_bodies_are_internal_errors() {
        assert!(matches!(parse_places("<html>"), Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn blank_addresses_are_rejected_before_any_request() {
        let geocoder = Geocoder::new("http://127.0.0.1:9/", "ride-share-tests").unwrap();
        assert_eq!(geocoder.base_url, "http://127.0.0.1:9");

        let err = geocoder.lookup("   ").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
