use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::auth::{require_admin, AuthUser};
use crate::db;
use crate::error::ApiError;
use crate::models::{
    Listing, NewPaymentTransaction, NewPromotedListing, PaymentStatus, PaymentTransaction,
    PromotedListing, PromotionPackage,
};
use crate::schema::{listings, payment_transactions, promoted_listings, promotion_packages};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePromotionRequest {
    pub listing_id: Uuid,
    pub package_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPaymentRequest {
    pub payment_id: Uuid,
    pub action: PaymentAction,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub payment: PaymentTransaction,
    pub promotion: Option<PromotedListing>,
    pub listing: Option<Listing>,
}

pub fn promotion_expiry(starts_at: NaiveDateTime, duration_days: i32) -> NaiveDateTime {
    starts_at + Duration::days(duration_days as i64)
}

/// GET /api/packages — public catalogue of promotion packages.
pub async fn list_packages(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    let packages = promotion_packages::table
        .order(promotion_packages::price.asc())
        .load::<PromotionPackage>(&mut conn)
        .await?;
    Ok(Json(json!({ "success": true, "data": packages })))
}

/// POST /api/promotions — seller attaches a paid package to an own
/// listing. The inactive promotion and its pending payment record are
/// inserted together; an admin confirms the payment later.
pub async fn create_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreatePromotionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    let seller_id = auth.id;

    let (promotion, payment) = conn
        .transaction::<(PromotedListing, PaymentTransaction), ApiError, _>(|conn| {
            Box::pin(async move {
                let listing = listings::table
                    .find(req.listing_id)
                    .first::<Listing>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::NotFound("Listing not found".to_string()))?;
                if listing.seller_id != seller_id {
                    return Err(ApiError::Forbidden(
                        "You can only promote your own listings".to_string(),
                    ));
                }

                let package = promotion_packages::table
                    .find(req.package_id)
                    .first::<PromotionPackage>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| {
                        ApiError::NotFound("Promotion package not found".to_string())
                    })?;

                let now = Utc::now().naive_utc();
                let new_promotion = NewPromotedListing {
                    id: Uuid::new_v4(),
                    listing_id: listing.id,
                    seller_id,
                    package_id: package.id,
                    active: false,
                    created_at: now,
                    updated_at: now,
                };
                let promotion = diesel::insert_into(promoted_listings::table)
                    .values(&new_promotion)
                    .get_result::<PromotedListing>(conn)
                    .await?;

                let new_payment = NewPaymentTransaction {
                    id: Uuid::new_v4(),
                    promoted_listing_id: promotion.id,
                    seller_id,
                    amount: package.price,
                    paid: false,
                    status: PaymentStatus::Pending,
                    created_at: now,
                    updated_at: now,
                };
                let payment = diesel::insert_into(payment_transactions::table)
                    .values(&new_payment)
                    .get_result::<PaymentTransaction>(conn)
                    .await?;

                Ok((promotion, payment))
            })
        })
        .await?;

    info!(
        "Promotion {} requested for listing {} by seller {}",
        promotion.id, promotion.listing_id, seller_id
    );
    Ok(Json(json!({
        "success": true,
        "data": { "promotion": promotion, "payment": payment }
    })))
}

/// GET /api/admin/payments[?status=] — review dashboard list.
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<PaymentsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    require_admin(&mut conn, &auth).await?;

    let mut query = payment_transactions::table.into_boxed();
    if let Some(status) = q.status {
        query = query.filter(payment_transactions::status.eq(status));
    }
    let rows = query
        .order(payment_transactions::created_at.desc())
        .load::<PaymentTransaction>(&mut conn)
        .await?;

    let mut promotion_ids: Vec<Uuid> = rows.iter().map(|p| p.promoted_listing_id).collect();
    promotion_ids.sort();
    promotion_ids.dedup();
    let promotions: HashMap<Uuid, PromotedListing> = promoted_listings::table
        .filter(promoted_listings::id.eq_any(&promotion_ids))
        .load::<PromotedListing>(&mut conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut listing_ids: Vec<Uuid> = promotions.values().map(|p| p.listing_id).collect();
    listing_ids.sort();
    listing_ids.dedup();
    let listings_by_id: HashMap<Uuid, Listing> = listings::table
        .filter(listings::id.eq_any(&listing_ids))
        .load::<Listing>(&mut conn)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    let data: Vec<PaymentDetail> = rows
        .into_iter()
        .map(|payment| {
            let promotion = promotions.get(&payment.promoted_listing_id).cloned();
            let listing = promotion
                .as_ref()
                .and_then(|p| listings_by_id.get(&p.listing_id).cloned());
            PaymentDetail {
                payment,
                promotion,
                listing,
            }
        })
        .collect();
    Ok(Json(json!({ "success": true, "data": data })))
}

/// PUT /api/admin/payments — trust-based confirmation. Approve flips
/// `paid` and activates the promotion for the package duration; reject
/// records the reason. Either way the payment leaves `pending` exactly
/// once.
pub async fn review_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ReviewPaymentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    require_admin(&mut conn, &auth).await?;

    let payment = conn
        .transaction::<PaymentTransaction, ApiError, _>(|conn| {
            Box::pin(async move {
                let payment = payment_transactions::table
                    .find(req.payment_id)
                    .first::<PaymentTransaction>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;
                if payment.status != PaymentStatus::Pending {
                    return Err(ApiError::Validation(
                        "Payment has already been reviewed".to_string(),
                    ));
                }

                let now = Utc::now().naive_utc();
                match req.action {
                    PaymentAction::Approve => {
                        let updated = diesel::update(payment_transactions::table.find(payment.id))
                            .set((
                                payment_transactions::paid.eq(true),
                                payment_transactions::status.eq(PaymentStatus::Confirmed),
                                payment_transactions::admin_notes.eq(req.admin_notes.clone()),
                                payment_transactions::updated_at.eq(now),
                            ))
                            .get_result::<PaymentTransaction>(conn)
                            .await?;

                        let promotion = promoted_listings::table
                            .find(payment.promoted_listing_id)
                            .first::<PromotedListing>(conn)
                            .await
                            .optional()?
                            .ok_or_else(|| {
                                ApiError::NotFound("Promotion not found for payment".to_string())
                            })?;
                        let package = promotion_packages::table
                            .find(promotion.package_id)
                            .first::<PromotionPackage>(conn)
                            .await
                            .optional()?
                            .ok_or_else(|| {
                                ApiError::NotFound("Promotion package not found".to_string())
                            })?;

                        diesel::update(promoted_listings::table.find(promotion.id))
                            .set((
                                promoted_listings::active.eq(true),
                                promoted_listings::starts_at.eq(Some(now)),
                                promoted_listings::expires_at
                                    .eq(Some(promotion_expiry(now, package.duration_days))),
                                promoted_listings::updated_at.eq(now),
                            ))
                            .execute(conn)
                            .await?;
                        diesel::update(listings::table.find(promotion.listing_id))
                            .set((
                                listings::promoted.eq(true),
                                listings::updated_at.eq(now),
                            ))
                            .execute(conn)
                            .await?;

                        Ok(updated)
                    }
                    PaymentAction::Reject => {
                        let updated = diesel::update(payment_transactions::table.find(payment.id))
                            .set((
                                payment_transactions::status.eq(PaymentStatus::Rejected),
                                payment_transactions::admin_notes.eq(req.admin_notes.clone()),
                                payment_transactions::updated_at.eq(now),
                            ))
                            .get_result::<PaymentTransaction>(conn)
                            .await?;
                        Ok(updated)
                    }
                }
            })
        })
        .await?;

    info!(
        "Payment {} reviewed as {} by admin {}",
        payment.id,
        payment.status.as_str(),
        auth.id
    );
    Ok(Json(json!({ "success": true, "data": payment })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn expiry_is_start_plus_package_duration() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let end = promotion_expiry(start, 30);
        assert_eq!(
            end,
            NaiveDate::from_ymd_opt(2025, 3, 31)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn review_actions_parse_from_json() {
        let action: PaymentAction = serde_json::from_str("\"approve\"").unwrap();
        assert_eq!(action, PaymentAction::Approve);
        let action: PaymentAction = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(action, PaymentAction::Reject);
        assert!(serde_json::from_str::<PaymentAction>("\"refund\"").is_err());
    }
}
