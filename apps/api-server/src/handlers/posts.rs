//! Post handlers: list, detail, create, update, delete.

use actix_web::http::Method;
use actix_web::{HttpRequest, HttpResponse, web};
use uuid::Uuid;

use quill_core::DomainError;
use quill_core::domain::{Post, unique_slug};
use quill_core::policy::{Access, ensure_owner_or_read_only};
use quill_core::ports::{BaseRepository, PageRequest, PostQuery};
use quill_shared::dto::{ListPostsParams, PostListItem, PostWriteRequest};

use super::views;
use crate::config::PostSettings;
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Response header carrying the number of posts matching a listing.
pub const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// GET /api/posts?q=&search=&page=&page_size=
pub async fn list_posts(
    state: web::Data<AppState>,
    params: web::Query<ListPostsParams>,
) -> AppResult<HttpResponse> {
    let params = params.into_inner();

    let mut query = PostQuery::new(params.q.as_deref()).with_terms(params.search.as_deref());
    if let Some(page) = page_request(&params, &state.settings)? {
        query = query.with_page(page);
    }

    let page = state.posts.list(&query).await?;
    let body: Vec<PostListItem> = page.items.iter().map(views::list_item).collect();

    Ok(HttpResponse::Ok()
        .insert_header((TOTAL_COUNT_HEADER, page.total.to_string()))
        .json(body))
}

/// GET /api/posts/{key}
pub async fn post_detail(
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> AppResult<HttpResponse> {
    let post = load_post(&state, &key).await?;
    Ok(HttpResponse::Ok().json(views::detail(&post)))
}

/// POST /api/posts/create - Protected route
pub async fn create_post(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<PostWriteRequest>,
) -> AppResult<HttpResponse> {
    let fields = views::write_input(body.into_inner()).into_complete()?;

    let slug = unique_slug(state.posts.as_ref(), &fields.title).await?;
    let post = state
        .posts
        .save(Post::new(identity.user_id, slug, fields))
        .await?;

    tracing::info!(post_id = %post.id, user_id = %identity.user_id, slug = %post.slug, "Post created");

    Ok(HttpResponse::Created().json(views::write_view(&post)))
}

/// PUT|PATCH /api/posts/{key}/edit
///
/// PUT replaces every writable field, PATCH only the ones sent. The body is
/// parsed after the lookup and ownership check so a missing post is a 404 and
/// a stranger's post a 403 whatever the body looks like.
pub async fn update_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    caller: OptionalIdentity,
    key: web::Path<String>,
    body: Result<web::Json<PostWriteRequest>, actix_web::Error>,
) -> AppResult<HttpResponse> {
    let mut post = load_post(&state, &key).await?;

    let access = Access::from_method(req.method().as_str());
    ensure_owner_or_read_only(caller.user_id(), &post, access)?;
    let editor = caller.user_id().ok_or(AppError::Forbidden)?;

    let body = match body {
        Ok(body) => body.into_inner(),
        Err(e) => return Ok(e.error_response()),
    };
    let input = views::write_input(body);
    let changes = if req.method() == Method::PATCH {
        input.into_partial()?
    } else {
        input.into_complete()?.into()
    };

    post.apply(changes, editor);
    let post = state.posts.save(post).await?;

    tracing::info!(post_id = %post.id, user_id = %editor, "Post updated");

    Ok(HttpResponse::Ok().json(views::write_view(&post)))
}

/// DELETE /api/posts/{key}/delete
pub async fn delete_post(
    state: web::Data<AppState>,
    caller: OptionalIdentity,
    key: web::Path<String>,
) -> AppResult<HttpResponse> {
    let post = load_post(&state, &key).await?;

    state.settings.delete_policy.check(caller.user_id(), &post)?;
    state.posts.delete(post.id).await?;

    tracing::info!(post_id = %post.id, caller = ?caller.user_id(), "Post deleted");

    Ok(HttpResponse::NoContent().finish())
}

/// Look a post up by UUID, or by slug when the key is not a UUID.
async fn load_post(state: &AppState, key: &str) -> AppResult<Post> {
    let found = match Uuid::parse_str(key) {
        Ok(id) => state.posts.find_by_id(id).await?,
        Err(_) => state.posts.find_by_slug(key).await?,
    };

    found.ok_or_else(|| {
        DomainError::NotFound {
            entity_type: "Post",
            key: key.to_string(),
        }
        .into()
    })
}

/// Pagination only applies when the client asks for it.
fn page_request(
    params: &ListPostsParams,
    settings: &PostSettings,
) -> AppResult<Option<PageRequest>> {
    if params.page.is_none() && params.page_size.is_none() {
        return Ok(None);
    }

    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(settings.default_page_size);

    let mut errors = Vec::new();
    if page == 0 {
        errors.push("page: Ensure this value is greater than or equal to 1.".to_string());
    }
    if page_size == 0 {
        errors.push("page_size: Ensure this value is greater than or equal to 1.".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    Ok(Some(PageRequest {
        page,
        page_size: page_size.min(settings.max_page_size),
    }))
}
