use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::auth::{load_user, require_admin, AuthUser};
use crate::db;
use crate::error::ApiError;
use crate::models::{
    Listing, ListingCategory, ListingMedia, ListingStatus, NewListing, NewListingMedia, UserPublic,
};
use crate::schema::{listing_media, listings, users};
use crate::AppState;

pub const PRICE_ERROR: &str = "Price must be a valid positive number";

pub const DEFAULT_VISIT_FEE: i64 = 15_000;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.30;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    Views,
    Likes,
    Newest,
}

#[derive(Debug, Deserialize)]
pub struct ListingsQuery {
    pub category: Option<ListingCategory>,
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: Option<SortKey>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminListingsQuery {
    pub status: Option<ListingStatus>,
    pub category: Option<ListingCategory>,
}

#[derive(Debug, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub public_id: String,
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
}

fn default_resource_type() -> String {
    "image".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<serde_json::Value>,
    pub currency: Option<String>,
    pub category: Option<ListingCategory>,
    pub seller_id: Option<Uuid>,
    pub location: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<serde_json::Value>,
    pub currency: Option<String>,
    pub category: Option<ListingCategory>,
    pub location: Option<String>,
    pub status: Option<ListingStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TrackViewRequest {
    pub listing_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub seller: Option<UserPublic>,
    pub media: Vec<ListingMedia>,
}

#[derive(AsChangeset)]
#[diesel(table_name = listings)]
struct ListingChanges {
    title: Option<String>,
    description: Option<String>,
    price: Option<i64>,
    currency: Option<String>,
    category: Option<ListingCategory>,
    location: Option<String>,
    updated_at: chrono::NaiveDateTime,
}

/// Prices arrive from the web form as either a JSON number or a string.
/// Anything that does not parse to a positive number is rejected before
/// any insert happens.
pub fn parse_price(value: &serde_json::Value) -> Result<i64, ApiError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p.round() as i64),
        _ => Err(ApiError::Validation(PRICE_ERROR.to_string())),
    }
}

/// Attaches sellers and media to a page of listings with one batched
/// query per table instead of a lookup per row.
async fn attach_refs(
    conn: &mut AsyncPgConnection,
    rows: Vec<Listing>,
) -> Result<Vec<ListingDetail>, ApiError> {
    let listing_ids: Vec<Uuid> = rows.iter().map(|l| l.id).collect();
    let mut seller_ids: Vec<Uuid> = rows.iter().map(|l| l.seller_id).collect();
    seller_ids.sort();
    seller_ids.dedup();

    let sellers: HashMap<Uuid, UserPublic> = users::table
        .filter(users::id.eq_any(&seller_ids))
        .load::<crate::models::User>(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, UserPublic::from(u)))
        .collect();

    let mut media_by_listing: HashMap<Uuid, Vec<ListingMedia>> = HashMap::new();
    for item in listing_media::table
        .filter(listing_media::listing_id.eq_any(&listing_ids))
        .order(listing_media::created_at.asc())
        .load::<ListingMedia>(conn)
        .await?
    {
        media_by_listing.entry(item.listing_id).or_default().push(item);
    }

    Ok(rows
        .into_iter()
        .map(|listing| {
            let seller = sellers.get(&listing.seller_id).cloned();
            let media = media_by_listing.remove(&listing.id).unwrap_or_default();
            ListingDetail {
                listing,
                seller,
                media,
            }
        })
        .collect())
}

/// GET /api/listings — public, filtered, sorted, paginated.
pub async fn list_listings(
    State(state): State<AppState>,
    Query(q): Query<ListingsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;

    let mut query = listings::table
        .filter(listings::status.eq(ListingStatus::Available))
        .into_boxed();

    if let Some(category) = q.category {
        query = query.filter(listings::category.eq(category));
    }
    if let Some(term) = q.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = format!("%{}%", term.trim());
        query = query.filter(
            listings::title
                .ilike(pattern.clone())
                .or(listings::description.ilike(pattern)),
        );
    }
    if let Some(min) = q.min_price {
        query = query.filter(listings::price.ge(min));
    }
    if let Some(max) = q.max_price {
        query = query.filter(listings::price.le(max));
    }

    query = match q.sort.unwrap_or(SortKey::Newest) {
        SortKey::PriceAsc => query.order(listings::price.asc()),
        SortKey::PriceDesc => query.order(listings::price.desc()),
        SortKey::Views => query.order(listings::views.desc()),
        SortKey::Likes => query.order(listings::likes.desc()),
        SortKey::Newest => query.order(listings::created_at.desc()),
    };

    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = q.offset.unwrap_or(0).max(0);
    let rows = query
        .limit(limit)
        .offset(offset)
        .load::<Listing>(&mut conn)
        .await?;

    let data = attach_refs(&mut conn, rows).await?;
    Ok(Json(json!({ "success": true, "data": data })))
}

/// GET /api/listings/:id — public view of a single available listing.
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;

    let listing = listings::table
        .find(id)
        .filter(listings::status.eq(ListingStatus::Available))
        .first::<Listing>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Listing not found".to_string()))?;

    let mut data = attach_refs(&mut conn, vec![listing]).await?;
    let detail = data.remove(0);
    Ok(Json(json!({ "success": true, "data": detail })))
}

/// POST /api/listings — seller submits a listing for admin approval.
pub async fn create_listing(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateListingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing required field: title".to_string()))?
        .to_string();
    let description = req
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing required field: description".to_string()))?
        .to_string();
    let price = req
        .price
        .as_ref()
        .ok_or_else(|| ApiError::Validation("Missing required field: price".to_string()))
        .and_then(parse_price)?;
    let category = req
        .category
        .ok_or_else(|| ApiError::Validation("Missing required field: category".to_string()))?;
    let seller_id = req
        .seller_id
        .ok_or_else(|| ApiError::Validation("Missing required field: seller_id".to_string()))?;

    if seller_id != auth.id {
        return Err(ApiError::Forbidden(
            "Seller id does not match the authenticated user".to_string(),
        ));
    }

    let mut conn = db::get_conn(&state.pool).await?;
    load_user(&mut conn, auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User profile not found".to_string()))?;

    let now = Utc::now().naive_utc();
    let new_listing = NewListing {
        id: Uuid::new_v4(),
        title,
        description,
        price,
        currency: req.currency.unwrap_or_else(|| "RWF".to_string()),
        category,
        status: ListingStatus::Pending,
        seller_id,
        location: req.location,
        visit_fee_amount: DEFAULT_VISIT_FEE,
        commission_rate: DEFAULT_COMMISSION_RATE,
        featured: false,
        promoted: false,
        views: 0,
        likes: 0,
        created_at: now,
        updated_at: now,
    };
    let media: Vec<NewListingMedia> = req
        .media
        .into_iter()
        .map(|m| NewListingMedia {
            id: Uuid::new_v4(),
            listing_id: new_listing.id,
            url: m.url,
            public_id: m.public_id,
            resource_type: m.resource_type,
            created_at: now,
        })
        .collect();

    let listing = conn
        .transaction::<Listing, ApiError, _>(|conn| {
            Box::pin(async move {
                let listing = diesel::insert_into(listings::table)
                    .values(&new_listing)
                    .get_result::<Listing>(conn)
                    .await?;
                if !media.is_empty() {
                    diesel::insert_into(listing_media::table)
                        .values(&media)
                        .execute(conn)
                        .await?;
                }
                Ok(listing)
            })
        })
        .await?;

    info!("Listing {} created by seller {}", listing.id, seller_id);
    Ok(Json(json!({ "success": true, "data": listing })))
}

/// PUT /api/listings/:id — owner edits fields; admins move status
/// through the lifecycle.
pub async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth: AuthUser,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;

    let listing = listings::table
        .find(id)
        .first::<Listing>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Listing not found".to_string()))?;

    if let Some(next) = req.status {
        // Status moves are the admin review action.
        require_admin(&mut conn, &auth).await?;
        if !listing.status.can_transition_to(next) {
            return Err(ApiError::Validation(format!(
                "Invalid status transition: {} -> {}",
                listing.status.as_str(),
                next.as_str()
            )));
        }
        let updated = diesel::update(listings::table.find(id))
            .set((
                listings::status.eq(next),
                listings::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result::<Listing>(&mut conn)
            .await?;
        info!("Listing {} moved to {}", id, next.as_str());
        return Ok(Json(json!({ "success": true, "data": updated })));
    }

    if listing.seller_id != auth.id {
        return Err(ApiError::Forbidden(
            "You can only edit your own listings".to_string(),
        ));
    }

    let price = req.price.as_ref().map(parse_price).transpose()?;
    let changes = ListingChanges {
        title: req.title,
        description: req.description,
        price,
        currency: req.currency,
        category: req.category,
        location: req.location,
        updated_at: Utc::now().naive_utc(),
    };
    let updated = diesel::update(listings::table.find(id))
        .set(&changes)
        .get_result::<Listing>(&mut conn)
        .await?;
    Ok(Json(json!({ "success": true, "data": updated })))
}

/// GET /api/admin/listings — review queue across all statuses.
pub async fn admin_list_listings(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<AdminListingsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    require_admin(&mut conn, &auth).await?;

    let mut query = listings::table.into_boxed();
    if let Some(status) = q.status {
        query = query.filter(listings::status.eq(status));
    }
    if let Some(category) = q.category {
        query = query.filter(listings::category.eq(category));
    }
    let rows = query
        .order(listings::created_at.desc())
        .load::<Listing>(&mut conn)
        .await?;

    let data = attach_refs(&mut conn, rows).await?;
    Ok(Json(json!({ "success": true, "data": data })))
}

/// POST /api/track-view — public view counter.
pub async fn track_view(
    State(state): State<AppState>,
    Json(req): Json<TrackViewRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    let updated = diesel::update(listings::table.find(req.listing_id))
        .set(listings::views.eq(listings::views + 1))
        .execute(&mut conn)
        .await?;
    if updated == 0 {
        return Err(ApiError::NotFound("Listing not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}

/// POST /api/listings/:id/like
pub async fn like_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db::get_conn(&state.pool).await?;
    let updated = diesel::update(listings::table.find(id))
        .set(listings::likes.eq(listings::likes + 1))
        .execute(&mut conn)
        .await?;
    if updated == 0 {
        return Err(ApiError::NotFound("Listing not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_price(&json!(1_000_000)).unwrap(), 1_000_000);
        assert_eq!(parse_price(&json!("250000")).unwrap(), 250_000);
        assert_eq!(parse_price(&json!(" 42 ")).unwrap(), 42);
        assert_eq!(parse_price(&json!(19.6)).unwrap(), 20);
    }

    #[test]
    fn price_rejects_garbage_with_exact_message() {
        for bad in [
            json!("abc"),
            json!(""),
            json!(0),
            json!(-5),
            json!("-100"),
            json!(null),
            json!(true),
            json!({"amount": 5}),
        ] {
            match parse_price(&bad) {
                Err(ApiError::Validation(msg)) => assert_eq!(msg, PRICE_ERROR),
                other => panic!("expected validation error for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn sort_keys_parse_from_query_values() {
        let key: SortKey = serde_json::from_str("\"price_asc\"").unwrap();
        assert_eq!(key, SortKey::PriceAsc);
        let key: SortKey = serde_json::from_str("\"newest\"").unwrap();
        assert_eq!(key, SortKey::Newest);
        assert!(serde_json::from_str::<SortKey>("\"alphabetical\"").is_err());
    }
}
