//! In-memory repositories - used when no database is configured and in tests.
//!
//! Data is lost on process restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Post, User};
use quill_core::error::RepoError;
use quill_core::ports::{BaseRepository, PostPage, PostQuery, PostRepository, UserRepository};

/// In-memory user store keyed by id.
#[derive(Default)]
pub struct InMemoryUserRepository {
    store: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up several users under a single read lock.
    async fn snapshot(&self, ids: impl Iterator<Item = Uuid>) -> HashMap<Uuid, User> {
        let store = self.store.read().await;
        ids.filter_map(|id| store.get(&id).map(|u| (id, u.clone())))
            .collect()
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.store.read().await.get(&id).cloned())
    }

    async fn save(&self, user: User) -> Result<User, RepoError> {
        let mut store = self.store.write().await;

        let email_taken = store
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email));
        if email_taken {
            return Err(RepoError::Constraint("Entity already exists".to_string()));
        }

        store.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.store
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

/// In-memory post store.
///
/// Holds a handle to the user store so searches can match on author names.
pub struct InMemoryPostRepository {
    store: RwLock<HashMap<Uuid, Post>>,
    users: Arc<InMemoryUserRepository>,
}

impl InMemoryPostRepository {
    pub fn new(users: Arc<InMemoryUserRepository>) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            users,
        }
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.store.read().await.get(&id).cloned())
    }

    async fn save(&self, post: Post) -> Result<Post, RepoError> {
        let mut store = self.store.write().await;

        let slug_taken = store
            .values()
            .any(|p| p.id != post.id && p.slug == post.slug);
        if slug_taken {
            return Err(RepoError::Constraint("Entity already exists".to_string()));
        }

        store.insert(post.id, post.clone());
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.store
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let store = self.store.read().await;
        Ok(store.values().find(|p| p.slug == slug).cloned())
    }

    async fn list(&self, query: &PostQuery) -> Result<PostPage, RepoError> {
        let posts: Vec<Post> = self.store.read().await.values().cloned().collect();
        let owners = self.users.snapshot(posts.iter().map(|p| p.user_id)).await;

        let mut matched: Vec<Post> = posts
            .into_iter()
            .filter(|p| query.matches(p, owners.get(&p.user_id)))
            .collect();
        matched.sort_by(|a, b| {
            b.publish
                .cmp(&a.publish)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = matched.len() as u64;
        let items = match query.page {
            None => matched,
            Some(page) => match page.offset().and_then(|o| usize::try_from(o).ok()) {
                Some(offset) => matched
                    .into_iter()
                    .skip(offset)
                    .take(usize::try_from(page.page_size).unwrap_or(usize::MAX))
                    .collect(),
                None => Vec::new(),
            },
        };

        Ok(PostPage { items, total })
    }
}
