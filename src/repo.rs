use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    /// The comment is soft-deleted and refuses the change.
    #[error("comment is deleted")] Deleted,
    #[error("parent comment belongs to another post")] ParentMismatch,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<User>;
    /// `Conflict` when the username is taken.
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn count_users(&self) -> RepoResult<u64>;
}

#[async_trait]
pub trait BoardRepo: Send + Sync {
    async fn list_boards(&self) -> RepoResult<Vec<Board>>;
    async fn get_board(&self, code: &str) -> RepoResult<Board>;
    /// `Conflict` when the code is taken.
    async fn create_board(&self, new: NewBoard) -> RepoResult<Board>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Newest first. Posts stored without a board count as `GENERAL`.
    async fn list_posts(&self, board_code: &str, page: PageRequest) -> RepoResult<Page<Post>>;
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    /// Stamps `created_at == updated_at`. `NotFound` if board or author is missing.
    async fn create_post(&self, new: NewPost) -> RepoResult<Post>;
    /// Overwrites title, content, details and `updated_at`.
    async fn save_post(&self, post: &Post) -> RepoResult<Post>;
    /// Removes the post's reply comments, then its root comments, then the
    /// post itself, as one atomic unit.
    async fn delete_post(&self, id: Id) -> RepoResult<()>;
}

/// Comment writes re-check their preconditions in the same atomic step as the
/// write, so a concurrent soft delete can never be lost or bypassed.
#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Every comment of the post, oldest first, regardless of nesting.
    async fn list_comments_for_post(&self, post_id: Id) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    /// `NotFound` if the post, author or parent is missing, `ParentMismatch`
    /// if the parent sits on another post, `Deleted` if the parent is deleted.
    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment>;
    /// `Deleted` if the comment is soft-deleted.
    async fn update_comment_content(&self, id: Id, content: &str) -> RepoResult<Comment>;
    /// `Deleted` if the flag is already set.
    async fn mark_comment_deleted(&self, id: Id) -> RepoResult<Comment>;
}

pub trait Repo: UserRepo + BoardRepo + PostRepo + CommentRepo {}

impl<T> Repo for T where T: UserRepo + BoardRepo + PostRepo + CommentRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

    const SNAPSHOT_FILE: &str = "state.json";

    #[derive(Default, Clone, Serialize, Deserialize)]
    struct State {
        users: HashMap<Id, User>,
        boards: HashMap<String, Board>,
        posts: HashMap<Id, Post>,
        comments: HashMap<Id, Comment>,
        next_id: Id,
    }

    impl State {
        fn next_id(&mut self) -> Id {
            self.next_id += 1;
            self.next_id
        }

        /// Phase one removes comments with a parent, phase two the roots.
        fn purge_comments(&mut self, post_id: Id, with_parent: bool) -> usize {
            let before = self.comments.len();
            self.comments.retain(|_, c| !(c.post_id == post_id && c.parent_id.is_some() == with_parent));
            before - self.comments.len()
        }
    }

    /// Process-local store backed by a JSON snapshot. A mutation becomes
    /// visible only once its snapshot is on disk.
    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
    }

    impl InMemRepo {
        /// Load `<data_dir>/state.json`, or start empty when there is none.
        /// An unreadable snapshot is an error: it is never overwritten.
        pub fn open(data_dir: impl Into<PathBuf>) -> RepoResult<Self> {
            let snapshot_path = data_dir.into().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&snapshot_path)?;
            Ok(Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
            })
        }

        fn load_state_from(path: &Path) -> RepoResult<State> {
            match std::fs::read(path) {
                Ok(bytes) => {
                    let state = serde_json::from_slice::<State>(&bytes).map_err(|e| {
                        RepoError::Internal(format!("snapshot '{}' is corrupt: {e}", path.display()))
                    })?;
                    tracing::info!("loaded snapshot '{}'", path.display());
                    Ok(state)
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::info!("no snapshot at '{}'; starting empty", path.display());
                    Ok(State::default())
                }
                Err(e) => Err(RepoError::Internal(format!("failed to read snapshot '{}': {e}", path.display()))),
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        /// Apply `f` to a copy of the state and swap it in once the copy is
        /// on disk. A failed check or a failed write leaves nothing behind.
        fn mutate<T>(&self, f: impl FnOnce(&mut State) -> RepoResult<T>) -> RepoResult<T> {
            let mut guard = self.write()?;
            let mut next = guard.clone();
            let out = f(&mut next)?;
            self.persist(&next)?;
            *guard = next;
            Ok(out)
        }

        fn persist(&self, state: &State) -> RepoResult<()> {
            let bytes = serde_json::to_vec_pretty(state)
                .map_err(|e| RepoError::Internal(format!("failed to serialize snapshot: {e}")))?;
            let path = self.snapshot_path.as_path();
            let tmp = path.with_extension("json.tmp");
            let written = path
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|_| std::fs::write(&tmp, bytes))
                .and_then(|_| std::fs::rename(&tmp, path));
            written.map_err(|e| {
                tracing::error!("failed to write snapshot '{}': {e}", path.display());
                RepoError::Internal(format!("failed to write snapshot: {e}"))
            })
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            self.read()?.users.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn find_user_by_username(&self, username: &str) -> RepoResult<User> {
            let s = self.read()?;
            s.users.values().find(|u| u.username == username).cloned().ok_or(RepoError::NotFound)
        }

        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            self.mutate(|s| {
                if s.users.values().any(|u| u.username == new.username) {
                    return Err(RepoError::Conflict);
                }
                let id = s.next_id();
                let user = User {
                    id,
                    username: new.username,
                    credential_hash: new.credential_hash,
                    role: new.role,
                    created_at: Utc::now(),
                };
                s.users.insert(id, user.clone());
                Ok(user)
            })
        }

        async fn count_users(&self) -> RepoResult<u64> {
            Ok(self.read()?.users.len() as u64)
        }
    }

    #[async_trait]
    impl BoardRepo for InMemRepo {
        async fn list_boards(&self) -> RepoResult<Vec<Board>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.boards.values().cloned().collect();
            v.sort_by(|a, b| a.code.cmp(&b.code));
            Ok(v)
        }

        async fn get_board(&self, code: &str) -> RepoResult<Board> {
            self.read()?.boards.get(code).cloned().ok_or(RepoError::NotFound)
        }

        async fn create_board(&self, new: NewBoard) -> RepoResult<Board> {
            self.mutate(|s| {
                if s.boards.contains_key(&new.code) {
                    return Err(RepoError::Conflict);
                }
                let board = Board { code: new.code, name: new.name, kind: new.kind };
                s.boards.insert(board.code.clone(), board.clone());
                Ok(board)
            })
        }
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn list_posts(&self, board_code: &str, page: PageRequest) -> RepoResult<Page<Post>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.posts.values().filter(|p| p.board_code == board_code).cloned().collect();
            // latest first; ids break timestamp ties
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            let total = v.len() as u64;
            let items = v
                .into_iter()
                .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
                .take(page.limit() as usize)
                .collect();
            Ok(Page { items, page: page.page, size: page.limit(), total })
        }

        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            self.read()?.posts.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
            self.mutate(|s| {
                if !s.boards.contains_key(&new.board_code) || !s.users.contains_key(&new.author_id) {
                    return Err(RepoError::NotFound);
                }
                let now = Utc::now();
                let id = s.next_id();
                let post = Post {
                    id,
                    board_code: new.board_code,
                    title: new.title,
                    content: new.content,
                    author_id: new.author_id,
                    created_at: now,
                    updated_at: now,
                    details: new.details,
                };
                s.posts.insert(id, post.clone());
                Ok(post)
            })
        }

        async fn save_post(&self, post: &Post) -> RepoResult<Post> {
            self.mutate(|s| {
                let stored = s.posts.get_mut(&post.id).ok_or(RepoError::NotFound)?;
                stored.title = post.title.clone();
                stored.content = post.content.clone();
                stored.details = post.details.clone();
                stored.updated_at = post.updated_at;
                Ok(stored.clone())
            })
        }

        async fn delete_post(&self, id: Id) -> RepoResult<()> {
            let (replies, roots) = self.mutate(|s| {
                if !s.posts.contains_key(&id) {
                    return Err(RepoError::NotFound);
                }
                let replies = s.purge_comments(id, true);
                let roots = s.purge_comments(id, false);
                s.posts.remove(&id);
                Ok((replies, roots))
            })?;
            tracing::debug!(post_id = id, replies, roots, "purged post comments");
            Ok(())
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn list_comments_for_post(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.comments.values().filter(|c| c.post_id == post_id).cloned().collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(v)
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            self.read()?.comments.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            self.mutate(|s| {
                if !s.posts.contains_key(&new.post_id) || !s.users.contains_key(&new.author_id) {
                    return Err(RepoError::NotFound);
                }
                if let Some(parent_id) = new.parent_id {
                    let parent = s.comments.get(&parent_id).ok_or(RepoError::NotFound)?;
                    if parent.post_id != new.post_id {
                        return Err(RepoError::ParentMismatch);
                    }
                    if parent.deleted {
                        return Err(RepoError::Deleted);
                    }
                }
                let id = s.next_id();
                let comment = Comment {
                    id,
                    post_id: new.post_id,
                    parent_id: new.parent_id,
                    author_id: new.author_id,
                    content: new.content,
                    created_at: Utc::now(),
                    deleted: false,
                };
                s.comments.insert(id, comment.clone());
                Ok(comment)
            })
        }

        async fn update_comment_content(&self, id: Id, content: &str) -> RepoResult<Comment> {
            self.mutate(|s| {
                let stored = s.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
                if stored.deleted {
                    return Err(RepoError::Deleted);
                }
                stored.content = content.to_string();
                Ok(stored.clone())
            })
        }

        async fn mark_comment_deleted(&self, id: Id) -> RepoResult<Comment> {
            self.mutate(|s| {
                let stored = s.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
                if stored.deleted {
                    return Err(RepoError::Deleted);
                }
                stored.deleted = true;
                Ok(stored.clone())
            })
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use crate::auth::Role;
    use chrono::{DateTime, Utc};
    use sqlx::{Pool, Postgres};

    fn db_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
            // dangling board / author / post / parent reference
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepoError::NotFound,
            other => RepoError::Internal(other.to_string()),
        }
    }

    #[derive(sqlx::FromRow)]
    struct UserRow {
        id: Id,
        username: String,
        credential_hash: String,
        role: String,
        created_at: DateTime<Utc>,
    }

    impl UserRow {
        fn into_user(self) -> RepoResult<User> {
            let role = Role::parse(&self.role).ok_or_else(|| RepoError::Internal(format!("unknown role '{}'", self.role)))?;
            Ok(User {
                id: self.id,
                username: self.username,
                credential_hash: self.credential_hash,
                role,
                created_at: self.created_at,
            })
        }
    }

    #[derive(sqlx::FromRow)]
    struct BoardRow {
        code: String,
        name: String,
        kind: String,
    }

    impl From<BoardRow> for Board {
        fn from(r: BoardRow) -> Self {
            Board { code: r.code, name: r.name, kind: BoardKind::parse(&r.kind).unwrap_or_default() }
        }
    }

    #[derive(sqlx::FromRow)]
    struct PostRow {
        id: Id,
        board_code: String,
        title: String,
        content: String,
        author_id: Id,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        kind: String,
        location: Option<String>,
        meal_price: Option<i32>,
        guarantee_min: Option<i32>,
        rental_fee: Option<i32>,
        misc_fee: Option<i32>,
    }

    impl From<PostRow> for Post {
        fn from(r: PostRow) -> Self {
            let details = match BoardKind::parse(&r.kind) {
                Some(BoardKind::Venue) => PostDetails::Venue(VenueDetails {
                    location: r.location,
                    meal_price: r.meal_price,
                    guarantee_min: r.guarantee_min,
                    rental_fee: r.rental_fee,
                    misc_fee: r.misc_fee,
                }),
                _ => PostDetails::General,
            };
            Post {
                id: r.id,
                board_code: r.board_code,
                title: r.title,
                content: r.content,
                author_id: r.author_id,
                created_at: r.created_at,
                updated_at: r.updated_at,
                details,
            }
        }
    }

    // Legacy rows have a NULL board_code; they surface as GENERAL.
    const POST_COLUMNS: &str = "id, COALESCE(board_code, 'GENERAL') AS board_code, title, content, author_id, \
        created_at, updated_at, kind, location, meal_price, guarantee_min, rental_fee, misc_fee";

    const COMMENT_COLUMNS: &str = "id, post_id, parent_id, author_id, content, created_at, deleted";

    fn details_kind(details: &PostDetails) -> &'static str {
        match details {
            PostDetails::General => BoardKind::General.as_str(),
            PostDetails::Venue(_) => BoardKind::Venue.as_str(),
        }
    }

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub fn pool(&self) -> &Pool<Postgres> { &self.pool }

        /// Why a guarded comment update matched no row. The flag never
        /// reverts, so an existing row here is a deleted one.
        async fn explain_skipped_comment(&self, id: Id) -> RepoError {
            match sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM comments WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
            {
                Ok(true) => RepoError::Deleted,
                Ok(false) => RepoError::NotFound,
                Err(e) => db_err(e),
            }
        }

        /// Apply the bundled schema.
        pub async fn migrate(&self) -> RepoResult<()> {
            sqlx::migrate!("./migrations")
                .run(&self.pool)
                .await
                .map_err(|e| RepoError::Internal(e.to_string()))
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            sqlx::query_as::<_, UserRow>("SELECT id, username, credential_hash, role, created_at FROM users WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool).await.map_err(db_err)?
                .into_user()
        }

        async fn find_user_by_username(&self, username: &str) -> RepoResult<User> {
            sqlx::query_as::<_, UserRow>("SELECT id, username, credential_hash, role, created_at FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(&self.pool).await.map_err(db_err)?
                .into_user()
        }

        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            sqlx::query_as::<_, UserRow>(
                "INSERT INTO users (username, credential_hash, role) VALUES ($1, $2, $3) \
                 RETURNING id, username, credential_hash, role, created_at",
            )
            .bind(&new.username)
            .bind(&new.credential_hash)
            .bind(new.role.as_str())
            .fetch_one(&self.pool).await.map_err(db_err)?
            .into_user()
        }

        async fn count_users(&self) -> RepoResult<u64> {
            let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(n.max(0) as u64)
        }
    }

    #[async_trait]
    impl BoardRepo for PgRepo {
        async fn list_boards(&self) -> RepoResult<Vec<Board>> {
            let rows = sqlx::query_as::<_, BoardRow>("SELECT code, name, kind FROM boards ORDER BY code")
                .fetch_all(&self.pool).await.map_err(db_err)?;
            Ok(rows.into_iter().map(Board::from).collect())
        }

        async fn get_board(&self, code: &str) -> RepoResult<Board> {
            let row = sqlx::query_as::<_, BoardRow>("SELECT code, name, kind FROM boards WHERE code = $1")
                .bind(code)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn create_board(&self, new: NewBoard) -> RepoResult<Board> {
            let row = sqlx::query_as::<_, BoardRow>("INSERT INTO boards (code, name, kind) VALUES ($1, $2, $3) RETURNING code, name, kind")
                .bind(&new.code)
                .bind(&new.name)
                .bind(new.kind.as_str())
                .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }
    }

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn list_posts(&self, board_code: &str, page: PageRequest) -> RepoResult<Page<Post>> {
            let rows = sqlx::query_as::<_, PostRow>(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE COALESCE(board_code, 'GENERAL') = $1 \
                 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
            ))
            .bind(board_code)
            .bind(i64::from(page.limit()))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool).await.map_err(db_err)?;
            let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE COALESCE(board_code, 'GENERAL') = $1")
                .bind(board_code)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(Page {
                items: rows.into_iter().map(Post::from).collect(),
                page: page.page,
                size: page.limit(),
                total: total.max(0) as u64,
            })
        }

        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            let row = sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
            let now = Utc::now();
            let venue = new.details.venue().cloned().unwrap_or_default();
            let row = sqlx::query_as::<_, PostRow>(&format!(
                "INSERT INTO posts (board_code, title, content, author_id, created_at, updated_at, \
                 kind, location, meal_price, guarantee_min, rental_fee, misc_fee) \
                 VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9, $10, $11) RETURNING {POST_COLUMNS}"
            ))
            .bind(&new.board_code)
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.author_id)
            .bind(now)
            .bind(details_kind(&new.details))
            .bind(venue.location)
            .bind(venue.meal_price)
            .bind(venue.guarantee_min)
            .bind(venue.rental_fee)
            .bind(venue.misc_fee)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn save_post(&self, post: &Post) -> RepoResult<Post> {
            let venue = post.details.venue().cloned().unwrap_or_default();
            let row = sqlx::query_as::<_, PostRow>(&format!(
                "UPDATE posts SET title = $2, content = $3, updated_at = $4, kind = $5, location = $6, \
                 meal_price = $7, guarantee_min = $8, rental_fee = $9, misc_fee = $10 \
                 WHERE id = $1 RETURNING {POST_COLUMNS}"
            ))
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.updated_at)
            .bind(details_kind(&post.details))
            .bind(venue.location)
            .bind(venue.meal_price)
            .bind(venue.guarantee_min)
            .bind(venue.rental_fee)
            .bind(venue.misc_fee)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn delete_post(&self, id: Id) -> RepoResult<()> {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            // blocks replies being inserted under this post until the purge commits
            sqlx::query("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx).await.map_err(db_err)?
                .ok_or(RepoError::NotFound)?;
            // replies before roots so parent references never dangle mid-purge
            sqlx::query("DELETE FROM comments WHERE post_id = $1 AND parent_id IS NOT NULL")
                .bind(id)
                .execute(&mut *tx).await.map_err(db_err)?;
            sqlx::query("DELETE FROM comments WHERE post_id = $1 AND parent_id IS NULL")
                .bind(id)
                .execute(&mut *tx).await.map_err(db_err)?;
            let removed = sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(id)
                .execute(&mut *tx).await.map_err(db_err)?
                .rows_affected();
            if removed == 0 {
                // dropping tx rolls back
                return Err(RepoError::NotFound);
            }
            tx.commit().await.map_err(db_err)?;
            Ok(())
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn list_comments_for_post(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
            sqlx::query_as::<_, Comment>(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY created_at ASC, id ASC"
            ))
            .bind(post_id)
            .fetch_all(&self.pool).await.map_err(db_err)
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(db_err)
        }

        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            // shared lock: the post cannot be purged underneath the insert
            sqlx::query("SELECT id FROM posts WHERE id = $1 FOR SHARE")
                .bind(new.post_id)
                .fetch_optional(&mut *tx).await.map_err(db_err)?
                .ok_or(RepoError::NotFound)?;
            if let Some(parent_id) = new.parent_id {
                let (post_id, deleted) = sqlx::query_as::<_, (Id, bool)>(
                    "SELECT post_id, deleted FROM comments WHERE id = $1 FOR UPDATE",
                )
                .bind(parent_id)
                .fetch_optional(&mut *tx).await.map_err(db_err)?
                .ok_or(RepoError::NotFound)?;
                if post_id != new.post_id {
                    return Err(RepoError::ParentMismatch);
                }
                if deleted {
                    return Err(RepoError::Deleted);
                }
            }
            let comment = sqlx::query_as::<_, Comment>(&format!(
                "INSERT INTO comments (post_id, parent_id, author_id, content, created_at, deleted) \
                 VALUES ($1, $2, $3, $4, $5, FALSE) RETURNING {COMMENT_COLUMNS}"
            ))
            .bind(new.post_id)
            .bind(new.parent_id)
            .bind(new.author_id)
            .bind(&new.content)
            .bind(Utc::now())
            .fetch_one(&mut *tx).await.map_err(db_err)?;
            tx.commit().await.map_err(db_err)?;
            Ok(comment)
        }

        async fn update_comment_content(&self, id: Id, content: &str) -> RepoResult<Comment> {
            let updated = sqlx::query_as::<_, Comment>(&format!(
                "UPDATE comments SET content = $2 WHERE id = $1 AND deleted = FALSE RETURNING {COMMENT_COLUMNS}"
            ))
            .bind(id)
            .bind(content)
            .fetch_optional(&self.pool).await.map_err(db_err)?;
            match updated {
                Some(comment) => Ok(comment),
                None => Err(self.explain_skipped_comment(id).await),
            }
        }

        async fn mark_comment_deleted(&self, id: Id) -> RepoResult<Comment> {
            let updated = sqlx::query_as::<_, Comment>(&format!(
                "UPDATE comments SET deleted = TRUE WHERE id = $1 AND deleted = FALSE RETURNING {COMMENT_COLUMNS}"
            ))
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(db_err)?;
            match updated {
                Some(comment) => Ok(comment),
                None => Err(self.explain_skipped_comment(id).await),
            }
        }
    }
}
