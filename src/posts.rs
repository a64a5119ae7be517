//! Post lifecycle, including the cascading delete of a post's comments.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{OrNotFound, ServiceError, ServiceResult};
use crate::models::{BoardKind, Id, NewPost, Page, PageRequest, Post, PostDetails, VenueDetails, TITLE_MAX_CHARS};
use crate::repo::Repo;

#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub board_code: String,
    pub title: String,
    pub content: String,
    pub author_id: Id,
    pub venue: Option<VenueDetails>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostInput {
    pub title: String,
    pub content: String,
    pub venue: Option<VenueDetails>,
}

#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn Repo>,
}

impl PostService {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// Newest first. `GENERAL` also lists posts stored without a board.
    pub async fn list_posts(&self, board_code: &str, page: PageRequest) -> ServiceResult<Page<Post>> {
        Ok(self.repo.list_posts(board_code, page).await?)
    }

    pub async fn get_post(&self, id: Id) -> ServiceResult<Post> {
        self.repo.get_post(id).await.or_not_found(|| format!("post {id} not found"))
    }

    pub async fn create_post(&self, input: CreatePostInput) -> ServiceResult<Id> {
        let board = self
            .repo
            .get_board(&input.board_code)
            .await
            .or_not_found(|| format!("board {} not found", input.board_code))?;
        let author = self.repo.get_user(input.author_id).await.or_not_found(|| format!("user {} not found", input.author_id))?;
        validate_text(&input.title, &input.content)?;

        let details = details_for(board.kind, input.venue)?;
        let post = self
            .repo
            .create_post(NewPost {
                board_code: board.code,
                title: input.title,
                content: input.content,
                author_id: author.id,
                details,
            })
            .await
            .or_not_found(|| format!("board {} or user {} no longer exists", input.board_code, input.author_id))?;
        tracing::info!(post_id = post.id, board = %post.board_code, author_id = post.author_id, "post created");
        Ok(post.id)
    }

    pub async fn update_post(&self, id: Id, input: UpdatePostInput) -> ServiceResult<Post> {
        let mut post = self.get_post(id).await?;
        validate_text(&input.title, &input.content)?;
        let kind = if post.is_venue() { BoardKind::Venue } else { BoardKind::General };

        post.details = details_for(kind, input.venue)?;
        post.title = input.title;
        post.content = input.content;
        // never move backwards, even if the wall clock does
        post.updated_at = Utc::now().max(post.updated_at);

        let saved = self.repo.save_post(&post).await.or_not_found(|| format!("post {id} not found"))?;
        tracing::info!(post_id = id, "post updated");
        Ok(saved)
    }

    /// Deletes the post together with every comment on it.
    pub async fn delete_post(&self, id: Id) -> ServiceResult<()> {
        self.repo.delete_post(id).await.or_not_found(|| format!("post {id} not found"))?;
        tracing::info!(post_id = id, "post deleted");
        Ok(())
    }
}

fn details_for(kind: BoardKind, venue: Option<VenueDetails>) -> ServiceResult<PostDetails> {
    match (kind, venue) {
        (BoardKind::Venue, venue) => Ok(PostDetails::Venue(venue.unwrap_or_default())),
        (BoardKind::General, None) => Ok(PostDetails::General),
        (BoardKind::General, Some(_)) => Err(ServiceError::invalid("venue details are only accepted on venue boards")),
    }
}

fn validate_text(title: &str, content: &str) -> ServiceResult<()> {
    if title.trim().is_empty() {
        return Err(ServiceError::invalid("title may not be empty"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ServiceError::invalid(format!("title may not exceed {TITLE_MAX_CHARS} characters")));
    }
    if content.trim().is_empty() {
        return Err(ServiceError::invalid("content may not be empty"));
    }
    Ok(())
}
