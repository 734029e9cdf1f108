use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::auth::{require_admin, AuthUser};
use crate::db;
use crate::error::ApiError;
use crate::models::{
    Inquiry, InquiryStatus, Listing, NewInquiry, NewTransaction, Transaction, TransactionStatus,
};
use crate::schema::{inquiries, listings, transactions};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateInquiryRequest {
    pub listing_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct InquiriesQuery {
    pub role: Option<String>,
    pub status: Option<InquiryStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInquiryRequest {
    pub inquiry_id: Uuid,
    pub status: InquiryStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InquiryDetail {
    #[serde(flatten)]
    pub inquiry: Inquiry,
    pub listing: Option<Listing>,
}

/// Platform cut of a sale, rounded to the nearest whole unit.
pub fn commission_amount(price: i64, rate: f64) -> i64 {
    (price as f64 * rate).round() as i64
}

/// POST /api/inquiries — buyer expresses interest in a listing.
///
/// The self-inquiry and duplicate-pending checks run in the same
/// database transaction as the insert, so two identical concurrent
/// requests cannot both pass the check and both insert.
pub async fn create_inquiry(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateInquiryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::Validation(
            "Missing required field: message".to_string(),
        ));
    }

    let mut conn = db::get_conn(&state.pool).await?;
    let buyer_id = auth.id;
    let listing_id = req.listing_id;

    let inquiry = conn
        .transaction::<Inquiry, ApiError, _>(|conn| {
            Box::pin(async move {
                let listing = listings::table
                    .find(listing_id)
                    .first::<Listing>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::NotFound("Listing not found".to_string()))?;

                if listing.seller_id == buyer_id {
                    return Err(ApiError::Validation(
                        "You cannot inquire about your own listing".to_string(),
                    ));
                }

                let pending_exists = inquiries::table
                    .filter(inquiries::listing_id.eq(listing_id))
                    .filter(inquiries::buyer_id.eq(buyer_id))
                    .filter(inquiries::status.eq(InquiryStatus::Pending))
                    .first::<Inquiry>(conn)
                    .await
                    .optional()?
                    .is_some();
                if pending_exists {
                    return Err(ApiError::Validation(
                        "You already have a pending inquiry for this listing".to_string(),
                    ));
                }

                let now = Utc::now().naive_utc();
                let new_inquiry = NewInquiry {
                    id: Uuid::new_v4(),
                    listing_id,
                    buyer_id,
                    seller_id: listing.seller_id,
                    message,
                    status: InquiryStatus::Pending,
                    created_at: now,
                    updated_at: now,
                };
                let inquiry = diesel::insert_into(inquiries::table)
                    .values(&new_inquiry)
                    .get_result::<Inquiry>(conn)
                    .await?;
                Ok(inquiry)
            })
        })
        .await?;

    info!(
        "Inquiry {} created by buyer {} on listing {}",
        inquiry.id, buyer_id, listing_id
    );
    Ok(Json(json!({ "success": true, "data": inquiry })))
}

/// Attaches each inquiry's listing with one batched query; a missing
/// listing surfaces as `null` rather than dropping the inquiry.
async fn attach_listings(
    conn: &mut AsyncPgConnection,
    rows: Vec<Inquiry>,
) -> Result<Vec<InquiryDetail>, ApiError> {
    let mut listing_ids: Vec<Uuid> = rows.iter().map(|i| i.listing_id).collect();
    listing_ids.sort();
    listing_ids.dedup();

    let by_id: HashMap<Uuid, Listing> = listings::table
        .filter(listings::id.eq_any(&listing_ids))
        .load::<Listing>(conn)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    Ok(rows
        .into_iter()
        .map(|inquiry| {
            let listing = by_id.get(&inquiry.listing_id).cloned();
            InquiryDetail { inquiry, listing }
        })
        .collect())
}

/// GET /api/inquiries?role=buyer|seller[&status=] — scoped to the
/// caller; any other role value is the admin branch.
pub async fn list_inquiries(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<InquiriesQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;

    let mut query = match q.role.as_deref() {
        Some("buyer") => inquiries::table
            .filter(inquiries::buyer_id.eq(auth.id))
            .into_boxed(),
        Some("seller") => inquiries::table
            .filter(inquiries::seller_id.eq(auth.id))
            .into_boxed(),
        _ => {
            require_admin(&mut conn, &auth).await?;
            inquiries::table.into_boxed()
        }
    };
    if let Some(status) = q.status {
        query = query.filter(inquiries::status.eq(status));
    }

    let rows = query
        .order(inquiries::created_at.desc())
        .load::<Inquiry>(&mut conn)
        .await?;
    let data = attach_listings(&mut conn, rows).await?;
    Ok(Json(json!({ "success": true, "data": data })))
}

/// PUT /api/inquiries — admin moves an inquiry through its lifecycle.
///
/// Approval creates the commission transaction; the status update and
/// the insert commit or roll back together, so an approved inquiry
/// without its transaction cannot exist.
pub async fn update_inquiry(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateInquiryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    require_admin(&mut conn, &auth).await?;

    let (inquiry, transaction) = conn
        .transaction::<(Inquiry, Option<Transaction>), ApiError, _>(|conn| {
            Box::pin(async move {
                let inquiry = inquiries::table
                    .find(req.inquiry_id)
                    .first::<Inquiry>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::NotFound("Inquiry not found".to_string()))?;

                if !inquiry.status.can_transition_to(req.status) {
                    return Err(ApiError::Validation(format!(
                        "Invalid status transition: {} -> {}",
                        inquiry.status.as_str(),
                        req.status.as_str()
                    )));
                }

                let now = Utc::now().naive_utc();
                let updated = diesel::update(inquiries::table.find(inquiry.id))
                    .set((
                        inquiries::status.eq(req.status),
                        inquiries::admin_notes.eq(req.admin_notes.clone()),
                        inquiries::updated_at.eq(now),
                    ))
                    .get_result::<Inquiry>(conn)
                    .await?;

                let transaction = match req.status {
                    InquiryStatus::Approved => {
                        let listing = listings::table
                            .find(updated.listing_id)
                            .first::<Listing>(conn)
                            .await
                            .optional()?
                            .ok_or_else(|| {
                                ApiError::NotFound("Listing not found for inquiry".to_string())
                            })?;
                        let new_transaction = NewTransaction {
                            id: Uuid::new_v4(),
                            inquiry_id: updated.id,
                            listing_id: listing.id,
                            buyer_id: updated.buyer_id,
                            seller_id: updated.seller_id,
                            amount: listing.price,
                            commission_amount: commission_amount(
                                listing.price,
                                listing.commission_rate,
                            ),
                            commission_rate: listing.commission_rate,
                            status: TransactionStatus::Pending,
                            created_at: now,
                            updated_at: now,
                        };
                        let transaction = diesel::insert_into(transactions::table)
                            .values(&new_transaction)
                            .get_result::<Transaction>(conn)
                            .await?;
                        Some(transaction)
                    }
                    InquiryStatus::Rejected | InquiryStatus::Completed => None,
                    InquiryStatus::Pending => None,
                };

                Ok((updated, transaction))
            })
        })
        .await?;

    info!(
        "Inquiry {} moved to {} by admin {}",
        inquiry.id,
        inquiry.status.as_str(),
        auth.id
    );
    Ok(Json(json!({
        "success": true,
        "data": { "inquiry": inquiry, "transaction": transaction }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_is_rate_times_price_rounded() {
        // 1,000,000 at the default 30% rate.
        assert_eq!(commission_amount(1_000_000, 0.30), 300_000);
        assert_eq!(commission_amount(999_999, 0.30), 300_000);
        assert_eq!(commission_amount(1, 0.30), 0);
        assert_eq!(commission_amount(5, 0.30), 2);
        assert_eq!(commission_amount(0, 0.30), 0);
        assert_eq!(commission_amount(250_000, 0.10), 25_000);
    }

    #[test]
    fn approved_is_reachable_only_from_pending() {
        assert!(InquiryStatus::Pending.can_transition_to(InquiryStatus::Approved));
        for terminal in [
            InquiryStatus::Approved,
            InquiryStatus::Rejected,
            InquiryStatus::Completed,
        ] {
            assert!(!terminal.can_transition_to(InquiryStatus::Approved));
        }
    }
}
