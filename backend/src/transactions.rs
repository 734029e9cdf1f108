use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::auth::{require_admin, AuthUser};
use crate::db;
use crate::error::ApiError;
use crate::models::{Listing, Transaction, TransactionStatus};
use crate::schema::{listings, transactions};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub role: Option<String>,
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
}

#[derive(Debug, Serialize)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub listing: Option<Listing>,
}

/// GET /api/transactions?role=buyer|seller[&status=] — scoped to the
/// caller; the fall-through branch is admin-only and lists everything.
pub async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<TransactionsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;

    let mut query = match q.role.as_deref() {
        Some("buyer") => transactions::table
            .filter(transactions::buyer_id.eq(auth.id))
            .into_boxed(),
        Some("seller") => transactions::table
            .filter(transactions::seller_id.eq(auth.id))
            .into_boxed(),
        _ => {
            require_admin(&mut conn, &auth).await?;
            transactions::table.into_boxed()
        }
    };
    if let Some(status) = q.status {
        query = query.filter(transactions::status.eq(status));
    }

    let rows = query
        .order(transactions::created_at.desc())
        .load::<Transaction>(&mut conn)
        .await?;

    let mut listing_ids: Vec<Uuid> = rows.iter().map(|t| t.listing_id).collect();
    listing_ids.sort();
    listing_ids.dedup();
    let by_id: HashMap<Uuid, Listing> = listings::table
        .filter(listings::id.eq_any(&listing_ids))
        .load::<Listing>(&mut conn)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    let data: Vec<TransactionDetail> = rows
        .into_iter()
        .map(|transaction| {
            let listing = by_id.get(&transaction.listing_id).cloned();
            TransactionDetail {
                transaction,
                listing,
            }
        })
        .collect();
    Ok(Json(json!({ "success": true, "data": data })))
}

/// PUT /api/transactions — admin settles, cancels or disputes a pending
/// commission transaction.
pub async fn update_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateTransactionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    require_admin(&mut conn, &auth).await?;

    let transaction = transactions::table
        .find(req.transaction_id)
        .first::<Transaction>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))?;

    if !transaction.status.can_transition_to(req.status) {
        return Err(ApiError::Validation(format!(
            "Invalid status transition: {} -> {}",
            transaction.status.as_str(),
            req.status.as_str()
        )));
    }

    let updated = diesel::update(transactions::table.find(transaction.id))
        .set((
            transactions::status.eq(req.status),
            transactions::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result::<Transaction>(&mut conn)
        .await?;

    info!(
        "Transaction {} moved to {} by admin {}",
        updated.id,
        updated.status.as_str(),
        auth.id
    );
    Ok(Json(json!({ "success": true, "data": updated })))
}
