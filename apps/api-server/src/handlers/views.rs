//! Post projections returned by the post endpoints.

use quill_core::domain::{Post, PostInput};
use quill_shared::dto::{PostDetail, PostListItem, PostWriteRequest, PostWriteView};

/// Listing shape: everything, including the owner's id.
pub fn list_item(post: &Post) -> PostListItem {
    PostListItem {
        id: post.id,
        title: post.title.clone(),
        slug: post.slug.clone(),
        content: post.content.clone(),
        publish: post.publish,
        user: post.user_id,
    }
}

/// Detail shape: no owner.
pub fn detail(post: &Post) -> PostDetail {
    PostDetail {
        id: post.id,
        title: post.title.clone(),
        slug: post.slug.clone(),
        content: post.content.clone(),
        publish: post.publish,
    }
}

/// Create/update shape: the writable fields plus the id.
pub fn write_view(post: &Post) -> PostWriteView {
    PostWriteView {
        id: post.id,
        title: post.title.clone(),
        content: post.content.clone(),
        publish: post.publish,
    }
}

/// The writable fields of a request body. Anything else the client sent is
/// already dropped by deserialization.
pub fn write_input(body: PostWriteRequest) -> PostInput {
    PostInput {
        title: body.title,
        content: body.content,
        publish: body.publish,
    }
}
