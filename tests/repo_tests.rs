#![cfg(feature = "inmem-store")]

use tempfile::TempDir;
use wedding_board::{
    auth::Role,
    models::{BoardKind, NewBoard, NewComment, NewPost, NewUser, PageRequest, PostDetails, DEFAULT_BOARD_CODE},
    repo::{inmem::InMemRepo, RepoError},
    seed,
};
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use wedding_board::repo::{BoardRepo, CommentRepo, PostRepo, UserRepo};

/// Fresh repository over its own snapshot dir. Keep the `TempDir` alive for
/// the duration of the test.
fn repo() -> (InMemRepo, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (InMemRepo::open(dir.path()).unwrap(), dir)
}

async fn user(r: &InMemRepo, name: &str) -> i64 {
    r.create_user(NewUser { username: name.into(), credential_hash: "!".into(), role: Role::User })
        .await
        .unwrap()
        .id
}

async fn post(r: &InMemRepo, board: &str, author: i64, title: &str) -> i64 {
    r.create_post(NewPost {
        board_code: board.into(),
        title: title.into(),
        content: "body".into(),
        author_id: author,
        details: PostDetails::General,
    })
    .await
    .unwrap()
    .id
}

async fn comment(r: &InMemRepo, post_id: i64, parent_id: Option<i64>, author: i64) -> i64 {
    r.create_comment(NewComment { post_id, parent_id, author_id: author, content: "hi".into() })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn users_and_boards_conflict_on_duplicates() {
    let (r, _dir) = repo();
    assert_eq!(r.count_users().await.unwrap(), 0);

    let id = user(&r, "alice").await;
    assert_eq!(r.find_user_by_username("alice").await.unwrap().id, id);
    let err = r
        .create_user(NewUser { username: "alice".into(), credential_hash: "!".into(), role: Role::User })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict));

    r.create_board(NewBoard { code: "GENERAL".into(), name: "Free".into(), kind: BoardKind::General })
        .await
        .unwrap();
    let err = r
        .create_board(NewBoard { code: "GENERAL".into(), name: "Dup".into(), kind: BoardKind::General })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict));
    assert!(matches!(r.get_board("NOPE").await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn seeding_is_idempotent() {
    let (r, _dir) = repo();
    seed::seed(&r, true).await.unwrap();
    seed::seed(&r, true).await.unwrap();

    let boards = r.list_boards().await.unwrap();
    let codes: Vec<_> = boards.iter().map(|b| b.code.as_str()).collect();
    assert_eq!(codes, vec!["GENERAL", "VENUE"]);
    assert_eq!(r.get_board("VENUE").await.unwrap().kind, BoardKind::Venue);
    assert_eq!(r.count_users().await.unwrap(), 2);
    assert!(r.find_user_by_username("user1").await.is_ok());
}

#[tokio::test]
async fn demo_users_skip_populated_store() {
    let (r, _dir) = repo();
    user(&r, "someone").await;
    assert_eq!(seed::seed_demo_users(&r).await.unwrap(), 0);
    assert_eq!(r.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn create_post_requires_board_and_author() {
    let (r, _dir) = repo();
    seed::seed_boards(&r).await.unwrap();
    let author = user(&r, "alice").await;

    let missing_board = r
        .create_post(NewPost {
            board_code: "NOPE".into(),
            title: "t".into(),
            content: "c".into(),
            author_id: author,
            details: PostDetails::General,
        })
        .await;
    assert!(matches!(missing_board, Err(RepoError::NotFound)));

    let missing_author = r
        .create_post(NewPost {
            board_code: DEFAULT_BOARD_CODE.into(),
            title: "t".into(),
            content: "c".into(),
            author_id: 999,
            details: PostDetails::General,
        })
        .await;
    assert!(matches!(missing_author, Err(RepoError::NotFound)));

    let id = post(&r, DEFAULT_BOARD_CODE, author, "ok").await;
    let stored = r.get_post(id).await.unwrap();
    assert_eq!(stored.created_at, stored.updated_at);
}

#[tokio::test]
async fn list_posts_pages_newest_first() {
    let (r, _dir) = repo();
    seed::seed_boards(&r).await.unwrap();
    let author = user(&r, "alice").await;
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(post(&r, DEFAULT_BOARD_CODE, author, &format!("p{i}")).await);
    }
    post(&r, "VENUE", author, "elsewhere").await;

    let first = r.list_posts(DEFAULT_BOARD_CODE, PageRequest::new(0, 2)).await.unwrap();
    assert_eq!(first.total, 5);
    let got: Vec<_> = first.items.iter().map(|p| p.id).collect();
    assert_eq!(got, vec![ids[4], ids[3]]);

    let last = r.list_posts(DEFAULT_BOARD_CODE, PageRequest::new(2, 2)).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].id, ids[0]);

    let beyond = r.list_posts(DEFAULT_BOARD_CODE, PageRequest::new(9, 2)).await.unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 5);
}

#[tokio::test]
async fn delete_post_removes_whole_comment_forest() {
    let (r, _dir) = repo();
    seed::seed_boards(&r).await.unwrap();
    let author = user(&r, "alice").await;
    let doomed = post(&r, DEFAULT_BOARD_CODE, author, "doomed").await;
    let kept = post(&r, DEFAULT_BOARD_CODE, author, "kept").await;

    let root = comment(&r, doomed, None, author).await;
    let reply = comment(&r, doomed, Some(root), author).await;
    comment(&r, doomed, Some(reply), author).await;
    let other = comment(&r, kept, None, author).await;

    r.delete_post(doomed).await.unwrap();

    assert!(matches!(r.get_post(doomed).await, Err(RepoError::NotFound)));
    assert!(r.list_comments_for_post(doomed).await.unwrap().is_empty());
    assert!(matches!(r.get_comment(root).await, Err(RepoError::NotFound)));
    assert_eq!(r.get_comment(other).await.unwrap().post_id, kept);
    assert!(matches!(r.delete_post(doomed).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn content_update_refuses_deleted_comment() {
    let (r, _dir) = repo();
    seed::seed_boards(&r).await.unwrap();
    let author = user(&r, "alice").await;
    let p = post(&r, DEFAULT_BOARD_CODE, author, "t").await;
    let id = comment(&r, p, None, author).await;
    let created_at = r.get_comment(id).await.unwrap().created_at;

    let edited = r.update_comment_content(id, "edited").await.unwrap();
    assert_eq!(edited.content, "edited");
    assert_eq!(edited.created_at, created_at);
    assert!(!edited.deleted);

    r.mark_comment_deleted(id).await.unwrap();
    assert!(matches!(r.update_comment_content(id, "revived?").await, Err(RepoError::Deleted)));
    let stored = r.get_comment(id).await.unwrap();
    assert!(stored.deleted);
    assert_eq!(stored.content, "edited");
    assert!(matches!(r.update_comment_content(9_999, "x").await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn marking_deleted_happens_once() {
    let (r, _dir) = repo();
    seed::seed_boards(&r).await.unwrap();
    let author = user(&r, "alice").await;
    let p = post(&r, DEFAULT_BOARD_CODE, author, "t").await;
    let id = comment(&r, p, None, author).await;

    let flagged = r.mark_comment_deleted(id).await.unwrap();
    assert!(flagged.deleted);
    assert_eq!(flagged.content, "hi");
    assert!(matches!(r.mark_comment_deleted(id).await, Err(RepoError::Deleted)));
    assert!(matches!(r.mark_comment_deleted(9_999).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn create_comment_checks_parent_under_the_lock() {
    let (r, _dir) = repo();
    seed::seed_boards(&r).await.unwrap();
    let author = user(&r, "alice").await;
    let p = post(&r, DEFAULT_BOARD_CODE, author, "a").await;
    let other = post(&r, DEFAULT_BOARD_CODE, author, "b").await;
    let root = comment(&r, p, None, author).await;

    let foreign = r
        .create_comment(NewComment { post_id: other, parent_id: Some(root), author_id: author, content: "x".into() })
        .await;
    assert!(matches!(foreign, Err(RepoError::ParentMismatch)));

    r.mark_comment_deleted(root).await.unwrap();
    let under_deleted = r
        .create_comment(NewComment { post_id: p, parent_id: Some(root), author_id: author, content: "x".into() })
        .await;
    assert!(matches!(under_deleted, Err(RepoError::Deleted)));

    let missing = r
        .create_comment(NewComment { post_id: p, parent_id: Some(9_999), author_id: author, content: "x".into() })
        .await;
    assert!(matches!(missing, Err(RepoError::NotFound)));

    assert_eq!(r.list_comments_for_post(p).await.unwrap().len(), 1);
    assert!(r.list_comments_for_post(other).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_snapshot_write_is_reported_and_rolled_back() {
    let (r, dir) = repo();
    seed::seed_boards(&r).await.unwrap();
    // a directory squatting on the temp file makes the next write fail
    std::fs::create_dir(dir.path().join("state.json.tmp")).unwrap();

    let err = r
        .create_user(NewUser { username: "ghost".into(), credential_hash: "!".into(), role: Role::User })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Internal(_)));
    assert!(matches!(r.find_user_by_username("ghost").await, Err(RepoError::NotFound)));
    assert_eq!(r.count_users().await.unwrap(), 0);

    std::fs::remove_dir(dir.path().join("state.json.tmp")).unwrap();
    user(&r, "ghost").await;
    let reopened = InMemRepo::open(dir.path()).unwrap();
    assert!(reopened.find_user_by_username("ghost").await.is_ok());
}

#[tokio::test]
async fn corrupt_snapshot_is_refused_and_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{ not json").unwrap();

    assert!(matches!(InMemRepo::open(dir.path()), Err(RepoError::Internal(_))));
    assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
}

#[tokio::test]
async fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let post_id = {
        let r = InMemRepo::open(dir.path()).unwrap();
        seed::seed_boards(&r).await.unwrap();
        let author = user(&r, "alice").await;
        let p = post(&r, DEFAULT_BOARD_CODE, author, "persisted").await;
        comment(&r, p, None, author).await;
        p
    };

    let reopened = InMemRepo::open(dir.path()).unwrap();
    assert_eq!(reopened.get_post(post_id).await.unwrap().title, "persisted");
    assert_eq!(reopened.list_comments_for_post(post_id).await.unwrap().len(), 1);
    // ids keep counting from where the previous process stopped
    let next = user(&reopened, "bob").await;
    assert!(next > post_id);
}

#[tokio::test]
async fn legacy_snapshot_posts_land_on_general() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = serde_json::json!({
        "users": {},
        "boards": {},
        "posts": {
            "1": {
                "id": 1,
                "title": "old",
                "content": "from before boards existed",
                "author_id": 1,
                "created_at": "2023-05-01T10:00:00Z",
                "updated_at": "2023-05-01T10:00:00Z"
            }
        },
        "comments": {},
        "next_id": 1
    });
    std::fs::write(dir.path().join("state.json"), serde_json::to_vec(&snapshot).unwrap()).unwrap();

    let r = InMemRepo::open(dir.path()).unwrap();
    let page = r.list_posts(DEFAULT_BOARD_CODE, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].board_code, DEFAULT_BOARD_CODE);
}
