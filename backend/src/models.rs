use chrono::NaiveDateTime;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::io::Write;
use uuid::Uuid;

use crate::schema::{
    inquiries, listing_media, listings, payment_transactions, promoted_listings, transactions,
    users,
};

/// Declares a closed status/category enum stored as text. Keeping these
/// as sum types instead of raw strings means every transition site has
/// to match exhaustively and an unknown value coming back from the
/// database is an error, not a silent passenger.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow,
        )]
        #[diesel(sql_type = Text)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
                let s = std::str::from_utf8(value.as_bytes())?;
                Self::parse(s)
                    .ok_or_else(|| format!(concat!("unrecognized ", stringify!($name), ": {}"), s).into())
            }
        }
    };
}

text_enum!(UserRole {
    User => "user",
    Admin => "admin",
});

text_enum!(ListingCategory {
    House => "house",
    Car => "car",
    Land => "land",
    Other => "other",
});

text_enum!(ListingStatus {
    Available => "available",
    Pending => "pending",
    Sold => "sold",
    Rejected => "rejected",
});

text_enum!(InquiryStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Completed => "completed",
});

text_enum!(TransactionStatus {
    Pending => "pending",
    Completed => "completed",
    Cancelled => "cancelled",
    Disputed => "disputed",
});

text_enum!(PaymentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Rejected => "rejected",
});

impl ListingStatus {
    /// Seller submissions start pending; admins approve, reject or mark
    /// the sale. Anything else is an invalid transition.
    pub fn can_transition_to(self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (ListingStatus::Pending, ListingStatus::Available)
                | (ListingStatus::Pending, ListingStatus::Rejected)
                | (ListingStatus::Available, ListingStatus::Sold)
        )
    }
}

impl InquiryStatus {
    /// pending -> approved | rejected | completed; terminal states stay put.
    pub fn can_transition_to(self, next: InquiryStatus) -> bool {
        matches!(
            (self, next),
            (InquiryStatus::Pending, InquiryStatus::Approved)
                | (InquiryStatus::Pending, InquiryStatus::Rejected)
                | (InquiryStatus::Pending, InquiryStatus::Completed)
        )
    }
}

impl TransactionStatus {
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Cancelled)
                | (TransactionStatus::Pending, TransactionStatus::Disputed)
        )
    }
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Seller details attached to public listing payloads. Deliberately not
/// the full profile row.
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
}

impl From<User> for UserPublic {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            phone: u.phone,
        }
    }
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub currency: String,
    pub category: ListingCategory,
    pub status: ListingStatus,
    pub seller_id: Uuid,
    pub location: Option<String>,
    pub visit_fee_amount: i64,
    pub commission_rate: f64,
    pub featured: bool,
    pub promoted: bool,
    pub views: i64,
    pub likes: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = listings)]
pub struct NewListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub currency: String,
    pub category: ListingCategory,
    pub status: ListingStatus,
    pub seller_id: Uuid,
    pub location: Option<String>,
    pub visit_fee_amount: i64,
    pub commission_rate: f64,
    pub featured: bool,
    pub promoted: bool,
    pub views: i64,
    pub likes: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct ListingMedia {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub url: String,
    pub public_id: String,
    pub resource_type: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = listing_media)]
pub struct NewListingMedia {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub url: String,
    pub public_id: String,
    pub resource_type: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct Inquiry {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub message: String,
    pub status: InquiryStatus,
    pub admin_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = inquiries)]
pub struct NewInquiry {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub message: String,
    pub status: InquiryStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub inquiry_id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub amount: i64,
    pub commission_amount: i64,
    pub commission_rate: f64,
    pub status: TransactionStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction {
    pub id: Uuid,
    pub inquiry_id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub amount: i64,
    pub commission_amount: i64,
    pub commission_rate: f64,
    pub status: TransactionStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct PromotionPackage {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub duration_days: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct PromotedListing {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub seller_id: Uuid,
    pub package_id: Uuid,
    pub active: bool,
    pub starts_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = promoted_listings)]
pub struct NewPromotedListing {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub seller_id: Uuid,
    pub package_id: Uuid,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Serialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub promoted_listing_id: Uuid,
    pub seller_id: Uuid,
    pub amount: i64,
    pub paid: bool,
    pub status: PaymentStatus,
    pub admin_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_transactions)]
pub struct NewPaymentTransaction {
    pub id: Uuid,
    pub promoted_listing_id: Uuid,
    pub seller_id: Uuid,
    pub amount: i64,
    pub paid: bool,
    pub status: PaymentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_round_trips() {
        for status in [
            InquiryStatus::Pending,
            InquiryStatus::Approved,
            InquiryStatus::Rejected,
            InquiryStatus::Completed,
        ] {
            assert_eq!(InquiryStatus::parse(status.as_str()), Some(status));
        }
        for category in [
            ListingCategory::House,
            ListingCategory::Car,
            ListingCategory::Land,
            ListingCategory::Other,
        ] {
            assert_eq!(ListingCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(InquiryStatus::parse("archived"), None);
        assert_eq!(UserRole::parse("superadmin"), None);
    }

    #[test]
    fn serde_uses_lowercase_text() {
        let json = serde_json::to_string(&InquiryStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
        let parsed: ListingCategory = serde_json::from_str("\"house\"").unwrap();
        assert_eq!(parsed, ListingCategory::House);
    }

    #[test]
    fn inquiry_transitions_only_leave_pending() {
        assert!(InquiryStatus::Pending.can_transition_to(InquiryStatus::Approved));
        assert!(InquiryStatus::Pending.can_transition_to(InquiryStatus::Rejected));
        assert!(InquiryStatus::Pending.can_transition_to(InquiryStatus::Completed));
        assert!(!InquiryStatus::Approved.can_transition_to(InquiryStatus::Completed));
        assert!(!InquiryStatus::Rejected.can_transition_to(InquiryStatus::Pending));
        assert!(!InquiryStatus::Completed.can_transition_to(InquiryStatus::Approved));
        assert!(!InquiryStatus::Pending.can_transition_to(InquiryStatus::Pending));
    }

    #[test]
    fn listing_transitions_follow_lifecycle() {
        assert!(ListingStatus::Pending.can_transition_to(ListingStatus::Available));
        assert!(ListingStatus::Pending.can_transition_to(ListingStatus::Rejected));
        assert!(ListingStatus::Available.can_transition_to(ListingStatus::Sold));
        assert!(!ListingStatus::Sold.can_transition_to(ListingStatus::Available));
        assert!(!ListingStatus::Rejected.can_transition_to(ListingStatus::Available));
    }

    #[test]
    fn transaction_transitions_leave_pending_only() {
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Completed));
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Cancelled));
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Disputed));
        assert!(!TransactionStatus::Completed.can_transition_to(TransactionStatus::Cancelled));
        assert!(!TransactionStatus::Disputed.can_transition_to(TransactionStatus::Pending));
    }
}
