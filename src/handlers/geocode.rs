use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::handlers::AppQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub autocomplete: bool,
}

/// Resolve an address, or list suggestions when `autocomplete=true`
pub async fn geocode(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<GeocodeQuery>,
) -> AppResult<Response> {
    if query.autocomplete {
        let places = state.geocoder.suggest(&query.address).await?;
        Ok(Json(places).into_response())
    } else {
        let place = state.geocoder.lookup(&query.address).await?;
        Ok(Json(place).into_response())
    }
}
