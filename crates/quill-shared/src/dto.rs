//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Request to register a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Request to login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response containing a user's public information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Response containing authentication tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Query parameters accepted by the post listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPostsParams {
    /// Free-text search over title, content and the author's name.
    pub q: Option<String>,
    /// Whitespace-separated words that must all appear in title or content.
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Body of a post create or update.
///
/// Every field is optional on the wire; which ones are required depends on
/// the operation. A field left out is `None`, one sent as `null` is
/// `Some(None)`. Fields the API does not accept (`id`, `slug`, `user`) are
/// ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostWriteRequest {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub publish: Option<Option<DateTime<Utc>>>,
}

/// Only called for fields that are present, so absence stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A post as it appears in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub publish: DateTime<Utc>,
    pub user: Uuid,
}

/// A single post as returned by the detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub publish: DateTime<Utc>,
}

/// A post as returned after a create or update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWriteView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub publish: DateTime<Utc>,
}
