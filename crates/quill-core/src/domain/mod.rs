//! Domain entities - the core business objects.

mod post;
mod slug;
mod user;

pub use post::{Post, PostChanges, PostFields, PostInput, TITLE_MAX_LENGTH};
pub use slug::{slugify, unique_slug};
pub use user::User;
