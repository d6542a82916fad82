use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::entities::{transaction, wallet};
use crate::error::AppResult;
use crate::handlers::AppJson;
use crate::services::wallet as ledger;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddFundsRequest {
    pub amount: f64,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<wallet::Model>> {
    Ok(Json(ledger::get_or_create_wallet(&state.db, claims.sub).await?))
}

pub async fn add_funds(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<AddFundsRequest>,
) -> AppResult<Json<wallet::Model>> {
    Ok(Json(ledger::add_funds(&state.db, claims.sub, payload.amount).await?))
}

/// Latest 50 wallet transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<transaction::Model>>> {
    Ok(Json(ledger::list_transactions(&state.db, claims.sub).await?))
}
