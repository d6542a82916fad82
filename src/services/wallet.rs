use chrono::Utc;
use sea_orm::{
    prelude::DateTimeWithTimeZone, sea_query::Expr, ActiveModelTrait, ColumnTrait,
    ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::transaction::{self, TransactionKind};
use crate::entities::wallet;
use crate::error::{AppError, AppResult};

const TRANSACTION_HISTORY_LIMIT: u64 = 50;

async fn find_wallet<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<Option<wallet::Model>> {
    Ok(wallet::Entity::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// Fetch the user's wallet, creating an empty one on first use.
pub async fn get_or_create_wallet<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<wallet::Model> {
    if let Some(wallet) = find_wallet(db, user_id).await? {
        return Ok(wallet);
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let created = wallet::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        balance: Set(0.0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await;

    match created {
        Ok(wallet) => {
            tracing::info!(user_id = %user_id, "Wallet created");
            Ok(wallet)
        }
        // Another request created it first.
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            find_wallet(db, user_id)
                .await?
                .ok_or_else(|| AppError::Internal("Wallet vanished after creation".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Credit the wallet and record the transaction atomically.
pub async fn add_funds(db: &DatabaseConnection, user_id: Uuid, amount: f64) -> AppResult<wallet::Model> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::BadRequest("Amount must be a positive number".to_string()));
    }

    let wallet = get_or_create_wallet(db, user_id).await?;
    let now: DateTimeWithTimeZone = Utc::now().into();

    let txn = db.begin().await?;

    wallet::Entity::update_many()
        .col_expr(wallet::Column::Balance, Expr::col(wallet::Column::Balance).add(amount))
        .col_expr(wallet::Column::UpdatedAt, Expr::value(now))
        .filter(wallet::Column::Id.eq(wallet.id))
        .exec(&txn)
        .await?;

    transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        amount: Set(amount),
        kind: Set(TransactionKind::Credit),
        description: Set("Money added to wallet".to_string()),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let updated = wallet::Entity::find_by_id(wallet.id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Wallet not found".to_string()))?;

    txn.commit().await?;

    tracing::info!(user_id = %user_id, amount, balance = updated.balance, "Wallet credited");
    Ok(updated)
}

/// Latest transactions, newest first.
pub async fn list_transactions<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> AppResult<Vec<transaction::Model>> {
    Ok(transaction::Entity::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .limit(TRANSACTION_HISTORY_LIMIT)
        .all(db)
        .await?)
}
