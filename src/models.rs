use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Role;

pub type Id = i64;

/// Board every post without a stored board reference belongs to.
pub const DEFAULT_BOARD_CODE: &str = "GENERAL";
pub const VENUE_BOARD_CODE: &str = "VENUE";

pub const TITLE_MAX_CHARS: usize = 200;

fn default_board_code() -> String {
    DEFAULT_BOARD_CODE.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BoardKind {
    #[default]
    General,
    /// Posts carry venue pricing details.
    Venue,
}

impl BoardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardKind::General => "general",
            BoardKind::Venue => "venue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(BoardKind::General),
            "venue" => Some(BoardKind::Venue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Board {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub kind: BoardKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewBoard {
    pub code: String,
    pub name: String,
    pub kind: BoardKind,
}

/// Stored account. Routes never serialize this directly; the credential hash
/// is owned by the external auth flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub credential_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub credential_hash: String,
    pub role: Role,
}

/// Extra fields for posts on venue boards. All optional: authors fill in
/// what they know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VenueDetails {
    pub location: Option<String>,
    pub meal_price: Option<i32>,
    pub guarantee_min: Option<i32>,
    pub rental_fee: Option<i32>,
    pub misc_fee: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PostDetails {
    #[default]
    General,
    Venue(VenueDetails),
}

impl PostDetails {
    pub fn venue(&self) -> Option<&VenueDetails> {
        match self {
            PostDetails::Venue(v) => Some(v),
            PostDetails::General => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Post {
    pub id: Id,
    #[serde(default = "default_board_code")]
    pub board_code: String,
    pub title: String,
    pub content: String,
    pub author_id: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub details: PostDetails,
}

impl Post {
    pub fn is_venue(&self) -> bool {
        matches!(self.details, PostDetails::Venue(_))
    }
}

/// Insert shape handed to the store; timestamps are assigned there.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub board_code: String,
    pub title: String,
    pub content: String,
    pub author_id: Id,
    pub details: PostDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    /// `None` for top-level comments.
    pub parent_id: Option<Id>,
    pub author_id: Id,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker. Content is kept; hiding it is up to the client.
    #[serde(default)]
    pub deleted: bool,
}

impl Comment {
    pub fn is_written_by(&self, user_id: Id) -> bool {
        self.author_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Id,
    pub parent_id: Option<Id>,
    pub author_id: Id,
    pub content: String,
}

/// A comment with its direct replies, built per read and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageRequest {
    /// Zero-based page index.
    #[serde(default)]
    pub page: u32,
    #[serde(default = "PageRequest::default_size")]
    pub size: u32,
}

impl PageRequest {
    pub const MAX_SIZE: u32 = 100;

    fn default_size() -> u32 {
        10
    }

    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Size clamped to `1..=MAX_SIZE`.
    pub fn limit(&self) -> u32 {
        self.size.clamp(1, Self::MAX_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.limit())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: Self::default_size() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(PostPage = Page<Post>)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

// ---- request payloads ------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub venue: Option<VenueDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewCommentPayload {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateCommentPayload {
    pub content: String,
}
