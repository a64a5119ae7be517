use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{create_jwt, Auth};
use crate::comment_tree::count_comments;
use crate::comments::{CommentService, CreateCommentInput};
use crate::error::{ApiError, ServiceError};
use crate::models::*;
use crate::posts::{CreatePostInput, PostService, UpdatePostInput};
use crate::repo::{Repo, RepoError};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/boards").route(web::get().to(list_boards)))
            .service(
                web::resource("/boards/{code}/posts")
                    .route(web::get().to(list_posts))
                    .route(web::post().to(create_post)),
            )
            .service(
                web::resource("/posts/{id}")
                    .route(web::get().to(get_post))
                    .route(web::put().to(update_post))
                    .route(web::delete().to(delete_post)),
            )
            .service(
                web::resource("/posts/{id}/comments")
                    .route(web::get().to(list_comments))
                    .route(web::post().to(create_comment)),
            )
            .service(
                web::resource("/comments/{id}")
                    .route(web::get().to(get_comment))
                    .route(web::put().to(update_comment))
                    .route(web::delete().to(delete_comment)),
            )
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(web::resource("/auth/refresh").route(web::post().to(refresh_token))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub posts: PostService,
    pub comments: CommentService,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self {
            posts: PostService::new(repo.clone()),
            comments: CommentService::new(repo.clone()),
            repo,
        }
    }
}

/// Outcome of a mutation, mirrored by `ApiErrorBody` on failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ActionResponse {
    fn ok() -> Self {
        Self { success: true, id: None, content: None }
    }

    fn with_id(id: Id) -> Self {
        Self { success: true, id: Some(id), content: None }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentThread {
    /// Every comment in the tree, replies included.
    pub total: usize,
    pub comments: Vec<CommentNode>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub id: Id,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[utoipa::path(
    get,
    tag = "boards",
    path = "/api/v1/boards",
    responses((status = 200, description = "List boards", body = [Board]))
)]
pub async fn list_boards(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let boards = data.repo.list_boards().await?;
    Ok(HttpResponse::Ok().json(boards))
}

#[utoipa::path(
    get,
    tag = "boards",
    path = "/api/v1/boards/{code}/posts",
    params(("code" = String, Path, description = "Board code"), PageRequest),
    responses((status = 200, description = "Page of posts, newest first", body = PostPage))
)]
pub async fn list_posts(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageRequest>,
) -> Result<HttpResponse, ApiError> {
    let page = data.posts.list_posts(&path.into_inner(), query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    post,
    tag = "boards",
    path = "/api/v1/boards/{code}/posts",
    params(("code" = String, Path, description = "Board code")),
    request_body = PostPayload,
    responses(
        (status = 201, description = "Post created", body = ActionResponse),
        (status = 400, description = "Invalid title, content or venue details"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Board not found")
    )
)]
pub async fn create_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PostPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let id = data
        .posts
        .create_post(CreatePostInput {
            board_code: path.into_inner(),
            title: payload.title,
            content: payload.content,
            author_id: auth.user_id()?,
            venue: payload.venue,
        })
        .await?;
    Ok(HttpResponse::Created().json(ActionResponse::with_id(id)))
}

#[utoipa::path(
    get,
    tag = "boards",
    path = "/api/v1/posts/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post", body = Post),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let post = data.posts.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Authors manage their own posts; moderators and admins manage any.
async fn ensure_can_manage_post(data: &AppState, auth: &Auth, post_id: Id) -> Result<(), ApiError> {
    let post = data.posts.get_post(post_id).await?;
    if post.author_id != auth.user_id()? && !auth.is_staff() {
        return Err(ServiceError::forbidden("only the author may modify this post").into());
    }
    Ok(())
}

#[utoipa::path(
    put,
    tag = "boards",
    path = "/api/v1/posts/{id}",
    params(("id" = Id, Path, description = "Post id")),
    request_body = PostPayload,
    responses(
        (status = 200, description = "Post updated", body = ActionResponse),
        (status = 400, description = "Invalid title, content or venue details"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn update_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<PostPayload>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_can_manage_post(&data, &auth, id).await?;
    let payload = payload.into_inner();
    let post = data
        .posts
        .update_post(id, UpdatePostInput { title: payload.title, content: payload.content, venue: payload.venue })
        .await?;
    Ok(HttpResponse::Ok().json(ActionResponse::with_id(post.id)))
}

#[utoipa::path(
    delete,
    tag = "boards",
    path = "/api/v1/posts/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post and its comments deleted", body = ActionResponse),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ensure_can_manage_post(&data, &auth, id).await?;
    data.posts.delete_post(id).await?;
    Ok(HttpResponse::Ok().json(ActionResponse::ok()))
}

#[utoipa::path(
    get,
    tag = "comments",
    path = "/api/v1/posts/{id}/comments",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Comment tree, oldest first at every level", body = CommentThread),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_comments(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let comments = data.comments.get_comments_for_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(CommentThread { total: count_comments(&comments), comments }))
}

#[utoipa::path(
    post,
    tag = "comments",
    path = "/api/v1/posts/{id}/comments",
    params(("id" = Id, Path, description = "Post id")),
    request_body = NewCommentPayload,
    responses(
        (status = 201, description = "Comment created", body = ActionResponse),
        (status = 400, description = "Blank content, foreign or deleted parent"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post or parent comment not found")
    )
)]
pub async fn create_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewCommentPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let id = data
        .comments
        .create_comment(CreateCommentInput {
            content: payload.content,
            post_id: path.into_inner(),
            author_id: auth.user_id()?,
            parent_id: payload.parent_id,
        })
        .await?;
    Ok(HttpResponse::Created().json(ActionResponse::with_id(id)))
}

#[utoipa::path(
    get,
    tag = "comments",
    path = "/api/v1/comments/{id}",
    params(("id" = Id, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment", body = Comment),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn get_comment(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let comment = data.comments.get_comment(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comment))
}

#[utoipa::path(
    put,
    tag = "comments",
    path = "/api/v1/comments/{id}",
    params(("id" = Id, Path, description = "Comment id")),
    request_body = UpdateCommentPayload,
    responses(
        (status = 200, description = "Comment updated", body = ActionResponse),
        (status = 400, description = "Blank content or comment deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn update_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateCommentPayload>,
) -> Result<HttpResponse, ApiError> {
    let comment = data
        .comments
        .update_comment(path.into_inner(), payload.into_inner().content, auth.user_id()?)
        .await?;
    Ok(HttpResponse::Ok().json(ActionResponse { success: true, id: Some(comment.id), content: Some(comment.content) }))
}

#[utoipa::path(
    delete,
    tag = "comments",
    path = "/api/v1/comments/{id}",
    params(("id" = Id, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment flagged deleted", body = ActionResponse),
        (status = 400, description = "Comment already deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    data.comments.delete_comment(path.into_inner(), auth.user_id()?).await?;
    Ok(HttpResponse::Ok().json(ActionResponse::ok()))
}

#[utoipa::path(
    get,
    tag = "auth",
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    // a valid token for a user the store no longer knows is not a session
    let user = data.repo.get_user(auth.user_id()?).await.map_err(|e| match e {
        RepoError::NotFound => ApiError::Unauthorized,
        other => other.into(),
    })?;
    Ok(HttpResponse::Ok().json(MeResponse { id: user.id, username: user.username, role: user.role.as_str().to_string() }))
}

#[utoipa::path(
    post,
    tag = "auth",
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Fresh token", body = TokenResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn refresh_token(auth: Auth) -> Result<HttpResponse, ApiError> {
    let token = create_jwt(auth.user_id()?, auth.0.roles.clone()).map_err(|e| {
        tracing::error!("failed to sign token: {e}");
        ApiError::Internal
    })?;
    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}
