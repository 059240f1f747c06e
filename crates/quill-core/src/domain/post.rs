use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Maximum number of characters in a post title.
pub const TITLE_MAX_LENGTH: usize = 120;

/// Post entity - a published piece of content owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub publish: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post owned by `user_id`.
    ///
    /// The slug is expected to be unique already, see [`super::unique_slug`].
    pub fn new(user_id: Uuid, slug: String, fields: PostFields) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: fields.title,
            slug,
            content: fields.content,
            publish: fields.publish,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply validated changes made by `editor`.
    ///
    /// The editor becomes the owner. Callers must have checked the ownership
    /// policy first, so for a permitted edit this leaves the owner unchanged.
    /// The slug is fixed at creation and is not touched.
    pub fn apply(&mut self, changes: PostChanges, editor: Uuid) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(content) = changes.content {
            self.content = content;
        }
        if let Some(publish) = changes.publish {
            self.publish = publish;
        }
        self.user_id = editor;
        self.updated_at = Utc::now();
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// The complete set of writable post fields, already validated.
#[derive(Debug, Clone)]
pub struct PostFields {
    pub title: String,
    pub content: String,
    pub publish: DateTime<Utc>,
}

/// Validated partial update: `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub publish: Option<DateTime<Utc>>,
}

/// Writable post fields as supplied by a caller.
///
/// Each field is `None` when the caller left it out and `Some(None)` when
/// it was sent as an explicit null.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub title: Option<Option<String>>,
    pub content: Option<Option<String>>,
    pub publish: Option<Option<DateTime<Utc>>>,
}

impl PostInput {
    /// Validate a full write (create or replace): every field is required.
    pub fn into_complete(self) -> Result<PostFields, DomainError> {
        let mut errors = Vec::new();

        let title = required("title", self.title, &mut errors).map(|t| t.trim().to_string());
        let content = required("content", self.content, &mut errors).map(|c| c.trim().to_string());
        let publish = required("publish", self.publish, &mut errors);

        if let Some(title) = &title {
            check_text("title", title, &mut errors);
        }
        if let Some(content) = &content {
            check_text("content", content, &mut errors);
        }

        match (title, content, publish) {
            (Some(title), Some(content), Some(publish)) if errors.is_empty() => Ok(PostFields {
                title,
                content,
                publish,
            }),
            _ => Err(DomainError::Validation(errors)),
        }
    }

    /// Validate a partial write: only the fields that are present are checked.
    pub fn into_partial(self) -> Result<PostChanges, DomainError> {
        let mut errors = Vec::new();

        let title = present("title", self.title, &mut errors).map(|t| t.trim().to_string());
        let content = present("content", self.content, &mut errors).map(|c| c.trim().to_string());
        let publish = present("publish", self.publish, &mut errors);

        if let Some(title) = &title {
            check_text("title", title, &mut errors);
        }
        if let Some(content) = &content {
            check_text("content", content, &mut errors);
        }

        if errors.is_empty() {
            Ok(PostChanges {
                title,
                content,
                publish,
            })
        } else {
            Err(DomainError::Validation(errors))
        }
    }
}

impl From<PostFields> for PostChanges {
    fn from(fields: PostFields) -> Self {
        Self {
            title: Some(fields.title),
            content: Some(fields.content),
            publish: Some(fields.publish),
        }
    }
}

fn required<T>(field: &str, value: Option<Option<T>>, errors: &mut Vec<String>) -> Option<T> {
    if value.is_none() {
        errors.push(format!("{field}: This field is required."));
    }
    present(field, value, errors)
}

fn present<T>(field: &str, value: Option<Option<T>>, errors: &mut Vec<String>) -> Option<T> {
    match value {
        Some(None) => {
            errors.push(format!("{field}: This field may not be null."));
            None
        }
        Some(Some(v)) => Some(v),
        None => None,
    }
}

fn check_text(field: &str, value: &str, errors: &mut Vec<String>) {
    if value.is_empty() {
        errors.push(format!("{field}: This field may not be blank."));
    } else if field == "title" && value.chars().count() > TITLE_MAX_LENGTH {
        errors.push(format!(
            "title: Ensure this field has no more than {TITLE_MAX_LENGTH} characters."
        ));
    }
}
