//! Comment lifecycle: threaded reads, replies, edits and soft deletes.

use std::sync::Arc;

use crate::comment_tree::build_comment_tree;
use crate::error::{OrNotFound, ServiceError, ServiceResult};
use crate::models::{Comment, CommentNode, Id, NewComment};
use crate::repo::{Repo, RepoError};

const EDIT_DELETED: &str = "deleted comment cannot be edited";
const ALREADY_DELETED: &str = "comment already deleted";

#[derive(Debug, Clone)]
pub struct CreateCommentInput {
    pub content: String,
    pub post_id: Id,
    pub author_id: Id,
    /// `None` for a top-level comment.
    pub parent_id: Option<Id>,
}

#[derive(Clone)]
pub struct CommentService {
    repo: Arc<dyn Repo>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// Root comments of the post with their replies nested to any depth.
    pub async fn get_comments_for_post(&self, post_id: Id) -> ServiceResult<Vec<CommentNode>> {
        self.repo.get_post(post_id).await.or_not_found(|| format!("post {post_id} not found"))?;
        let comments = self.repo.list_comments_for_post(post_id).await?;
        Ok(build_comment_tree(comments))
    }

    pub async fn get_comment(&self, comment_id: Id) -> ServiceResult<Comment> {
        self.repo.get_comment(comment_id).await.or_not_found(|| format!("comment {comment_id} not found"))
    }

    pub async fn create_comment(&self, input: CreateCommentInput) -> ServiceResult<Id> {
        let post = self.repo.get_post(input.post_id).await.or_not_found(|| format!("post {} not found", input.post_id))?;
        let author = self.repo.get_user(input.author_id).await.or_not_found(|| format!("user {} not found", input.author_id))?;
        if let Some(parent_id) = input.parent_id {
            self.get_comment(parent_id).await?;
        }
        require_content(&input.content)?;

        // the store re-checks post, parent placement and parent state atomically with the insert
        let comment = self
            .repo
            .create_comment(NewComment {
                post_id: post.id,
                parent_id: input.parent_id,
                author_id: author.id,
                content: input.content,
            })
            .await
            .map_err(|e| match e {
                RepoError::ParentMismatch => {
                    tracing::debug!(parent_id = ?input.parent_id, post_id = post.id, "reply targets a comment on another post");
                    ServiceError::invalid("target comment does not belong to this post")
                }
                RepoError::Deleted => ServiceError::invalid("cannot reply to a deleted comment"),
                RepoError::NotFound => ServiceError::NotFound(format!("post {} or the parent comment no longer exists", post.id)),
                other => other.into(),
            })?;
        tracing::info!(comment_id = comment.id, post_id = post.id, parent_id = ?comment.parent_id, "comment created");
        Ok(comment.id)
    }

    pub async fn update_comment(&self, comment_id: Id, content: String, user_id: Id) -> ServiceResult<Comment> {
        let comment = self.get_comment(comment_id).await?;
        if comment.deleted {
            return Err(ServiceError::invalid(EDIT_DELETED));
        }
        if !comment.is_written_by(user_id) {
            tracing::warn!(comment_id, user_id, "edit attempt by non-author");
            return Err(ServiceError::forbidden("only the author may edit this comment"));
        }
        require_content(&content)?;

        let saved = self
            .repo
            .update_comment_content(comment_id, &content)
            .await
            .map_err(|e| match e {
                RepoError::Deleted => ServiceError::invalid(EDIT_DELETED),
                RepoError::NotFound => ServiceError::NotFound(format!("comment {comment_id} not found")),
                other => other.into(),
            })?;
        tracing::info!(comment_id, "comment updated");
        Ok(saved)
    }

    /// Flag the comment deleted. Its content and replies stay in place.
    pub async fn delete_comment(&self, comment_id: Id, user_id: Id) -> ServiceResult<()> {
        let comment = self.get_comment(comment_id).await?;
        if comment.deleted {
            return Err(ServiceError::invalid(ALREADY_DELETED));
        }
        if !comment.is_written_by(user_id) {
            tracing::warn!(comment_id, user_id, "delete attempt by non-author");
            return Err(ServiceError::forbidden("only the author may delete this comment"));
        }

        self.repo.mark_comment_deleted(comment_id).await.map_err(|e| match e {
            RepoError::Deleted => ServiceError::invalid(ALREADY_DELETED),
            RepoError::NotFound => ServiceError::NotFound(format!("comment {comment_id} not found")),
            other => other.into(),
        })?;
        tracing::info!(comment_id, "comment soft-deleted");
        Ok(())
    }
}

fn require_content(content: &str) -> ServiceResult<()> {
    if content.trim().is_empty() {
        return Err(ServiceError::invalid("comment content may not be empty"));
    }
    Ok(())
}
