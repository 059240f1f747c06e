//! URL slugs derived from post titles.

use crate::error::RepoError;
use crate::ports::PostRepository;

/// Slug used when a title has no usable characters.
const FALLBACK_SLUG: &str = "post";

/// Turn a title into a lowercase, hyphen-separated slug.
///
/// ASCII letters and digits are kept; every other run of characters becomes a
/// single `-`. Leading and trailing hyphens are dropped.
pub fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Derive a slug for `title` that no stored post uses yet.
///
/// Collisions get a numeric suffix: `hello`, `hello-2`, `hello-3`, ...
pub async fn unique_slug(posts: &dyn PostRepository, title: &str) -> Result<String, RepoError> {
    let base = slugify(title);
    let mut candidate = base.clone();
    let mut suffix = 2u32;

    while posts.find_by_slug(&candidate).await?.is_some() {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }

    Ok(candidate)
}
