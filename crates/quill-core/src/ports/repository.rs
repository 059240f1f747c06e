use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Post, User};
use crate::error::RepoError;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Save an entity (create or update).
    async fn save(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    /// Find a user by their email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
}

/// Post repository.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;

    /// List posts matching `query`, newest `publish` first.
    ///
    /// `PostPage::total` counts every match, not only the returned page.
    async fn list(&self, query: &PostQuery) -> Result<PostPage, RepoError>;
}

/// One page of a post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Number of rows before this page.
    ///
    /// `None` when the page starts beyond any row a store can address
    /// (past `i64::MAX`); such a page is always empty.
    pub fn offset(&self) -> Option<u64> {
        self.page
            .saturating_sub(1)
            .checked_mul(self.page_size)
            .filter(|offset| *offset <= i64::MAX as u64)
    }
}

/// Filter and window for [`PostRepository::list`].
///
/// Two independent filters, both applied when present:
/// - `search`: one phrase matched against title, content and the owner's
///   first and last name.
/// - `terms`: whitespace-separated words, each of which must appear in the
///   title or the content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    search: Option<String>,
    terms: Vec<String>,
    pub page: Option<PageRequest>,
}

impl PostQuery {
    /// Build a query from a raw search string. Blank searches match everything.
    pub fn new(search: Option<&str>) -> Self {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Self {
            search,
            ..Self::default()
        }
    }

    /// Add required words, split on whitespace from `raw`.
    pub fn with_terms(mut self, raw: Option<&str>) -> Self {
        self.terms = raw
            .map(|raw| raw.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = Some(page);
        self
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether `post`, owned by `owner`, passes both filters.
    pub fn matches(&self, post: &Post, owner: Option<&User>) -> bool {
        let title = post.title.to_lowercase();
        let content = post.content.to_lowercase();

        let phrase_ok = match &self.search {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

                title.contains(&needle)
                    || content.contains(&needle)
                    || owner.is_some_and(|u| contains(&u.first_name) || contains(&u.last_name))
            }
        };

        phrase_ok
            && self.terms.iter().all(|term| {
                let term = term.to_lowercase();
                title.contains(&term) || content.contains(&term)
            })
    }
}

/// Result of [`PostRepository::list`].
#[derive(Debug, Clone)]
pub struct PostPage {
    pub items: Vec<Post>,
    pub total: u64,
}
