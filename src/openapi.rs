use crate::error::ApiErrorBody;
use crate::models::{
    Board, BoardKind, Comment, CommentNode, NewCommentPayload, Post, PostDetails, PostPage, PostPayload,
    UpdateCommentPayload, VenueDetails,
};
use crate::routes::{ActionResponse, CommentThread, MeResponse, TokenResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_boards,
        crate::routes::list_posts,
        crate::routes::create_post,
        crate::routes::get_post,
        crate::routes::update_post,
        crate::routes::delete_post,
        crate::routes::list_comments,
        crate::routes::create_comment,
        crate::routes::get_comment,
        crate::routes::update_comment,
        crate::routes::delete_comment,
        crate::routes::auth_me,
        crate::routes::refresh_token,
    ),
    components(schemas(
        Board, BoardKind, Post, PostDetails, VenueDetails, PostPage, PostPayload,
        Comment, CommentNode, NewCommentPayload, UpdateCommentPayload,
        ActionResponse, CommentThread, MeResponse, TokenResponse, ApiErrorBody
    )),
    tags(
        (name = "boards", description = "Board and post operations"),
        (name = "comments", description = "Threaded comment operations"),
        (name = "auth", description = "Session helpers"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/api/v1/boards",
            "/api/v1/boards/{code}/posts",
            "/api/v1/posts/{id}",
            "/api/v1/posts/{id}/comments",
            "/api/v1/comments/{id}",
            "/api/v1/auth/me",
            "/api/v1/auth/refresh",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn every_operation_carries_a_declared_tag() {
        let doc = ApiDoc::openapi();
        let declared: Vec<String> = doc.tags.iter().flatten().map(|t| t.name.clone()).collect();
        let mut used = Vec::new();
        for (path, item) in &doc.paths.paths {
            for op in item.operations.values() {
                let tags = op.tags.clone().unwrap_or_default();
                assert!(!tags.is_empty(), "untagged operation under {path}");
                assert!(tags.iter().all(|t| declared.contains(t)), "{path} uses an undeclared tag");
                used.extend(tags);
            }
        }
        for name in &declared {
            assert!(used.contains(name), "tag {name} is never used");
        }
    }
}
