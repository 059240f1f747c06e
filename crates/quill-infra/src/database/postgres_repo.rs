//! PostgreSQL repository implementations.

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func, IntoColumnRef, LikeExpr, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};

use quill_core::domain::{Post, User};
use quill_core::error::RepoError;
use quill_core::ports::{PostPage, PostQuery, PostRepository, UserRepository};

use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, query_err};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        // Mask email for logging to avoid PII in logs
        let masked = if let Some(at_pos) = email.find('@') {
            let (local, domain) = email.split_at(at_pos);
            let masked_local = if local.len() > 1 {
                format!("{}***", &local[..1])
            } else {
                "***".to_string()
            };
            format!("{}{}", masked_local, domain)
        } else {
            "***".to_string()
        };
        tracing::debug!(user_email = %masked, "Finding user by email");

        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(query_err)?;

        Ok(result.map(Into::into))
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(query_err)?;

        Ok(result.map(Into::into))
    }

    async fn list(&self, query: &PostQuery) -> Result<PostPage, RepoError> {
        let mut select = PostEntity::find();

        if let Some(term) = query.search() {
            let pattern = contains_pattern(term);
            tracing::debug!(search = %term, "Filtering posts");

            select = select
                .join(JoinType::InnerJoin, post::Relation::User.def())
                .filter(
                    Condition::any()
                        .add(icontains((post::Entity, post::Column::Title), &pattern))
                        .add(icontains((post::Entity, post::Column::Content), &pattern))
                        .add(icontains((user::Entity, user::Column::FirstName), &pattern))
                        .add(icontains((user::Entity, user::Column::LastName), &pattern)),
                )
                .distinct();
        }

        if !query.terms().is_empty() {
            tracing::debug!(terms = ?query.terms(), "Filtering posts by terms");

            let all_terms = query.terms().iter().fold(Condition::all(), |all, term| {
                let pattern = contains_pattern(term);
                all.add(
                    Condition::any()
                        .add(icontains((post::Entity, post::Column::Title), &pattern))
                        .add(icontains((post::Entity, post::Column::Content), &pattern)),
                )
            });
            select = select.filter(all_terms);
        }

        let select = select
            .order_by_desc(post::Column::Publish)
            .order_by_desc(post::Column::CreatedAt);

        let (models, total) = match query.page {
            None => {
                let models = select.all(&self.db).await.map_err(query_err)?;
                let total = models.len() as u64;
                (models, total)
            }
            Some(page) => {
                let total = select.clone().count(&self.db).await.map_err(query_err)?;
                let models = match page.offset() {
                    Some(offset) if offset < total => select
                        .offset(offset)
                        .limit(page.page_size)
                        .all(&self.db)
                        .await
                        .map_err(query_err)?,
                    _ => Vec::new(),
                };
                (models, total)
            }
        };

        Ok(PostPage {
            items: models.into_iter().map(Into::into).collect(),
            total,
        })
    }
}

/// `%term%`, lowercased, with LIKE metacharacters escaped.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn icontains(column: impl IntoColumnRef, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape('\\'))
}
