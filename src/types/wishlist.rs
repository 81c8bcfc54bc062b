use serde::{Deserialize, Serialize};

/// A wishlisted product. Locally cached entries carry the full snapshot
/// captured at toggle time; the remote authoritative list is sparser
/// (membership plus name/status), so everything beyond the id defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub product_id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rating: f64,
}

/// One entry of `GET /wishlist/notifications`: a wishlisted product that
/// was sold since the last poll.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SoldNotification {
    pub product_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Body of `POST /wishlist/add`.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistAddRequest {
    pub product_id: i64,
}
