#![cfg(feature = "postgres-store")]

use sqlx::postgres::PgPoolOptions;
use wedding_board::{
    auth::Role,
    models::{NewComment, NewPost, NewUser, PageRequest, PostDetails, VenueDetails, DEFAULT_BOARD_CODE, VENUE_BOARD_CODE},
    repo::{pg::PgRepo, CommentRepo, PostRepo, RepoError, UserRepo},
    seed,
};

async fn fresh_user(r: &PgRepo, prefix: &str) -> i64 {
    let username = format!("{prefix}-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
    r.create_user(NewUser { username, credential_hash: "!".into(), role: Role::User }).await.unwrap().id
}

/// Skips (returns `None`) when no database is configured.
async fn repo() -> Option<PgRepo> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
    let repo = PgRepo::new(pool);
    repo.migrate().await.unwrap();
    seed::seed_boards(&repo).await.unwrap();
    Some(repo)
}

#[tokio::test]
#[serial_test::serial]
async fn pg_post_lifecycle_with_comments() {
    let Some(r) = repo().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let username = format!("pg-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
    let author = r
        .create_user(NewUser { username: username.clone(), credential_hash: "!".into(), role: Role::User })
        .await
        .unwrap();
    let dup = r.create_user(NewUser { username, credential_hash: "!".into(), role: Role::User }).await;
    assert!(matches!(dup, Err(RepoError::Conflict)));

    let venue = VenueDetails { location: Some("Busan".into()), meal_price: Some(50_000), ..Default::default() };
    let post = r
        .create_post(NewPost {
            board_code: VENUE_BOARD_CODE.into(),
            title: "Seaside hall".into(),
            content: "Ocean view".into(),
            author_id: author.id,
            details: PostDetails::Venue(venue.clone()),
        })
        .await
        .unwrap();
    assert_eq!(r.get_post(post.id).await.unwrap().details.venue(), Some(&venue));

    let root = r
        .create_comment(NewComment { post_id: post.id, parent_id: None, author_id: author.id, content: "root".into() })
        .await
        .unwrap();
    r.create_comment(NewComment { post_id: post.id, parent_id: Some(root.id), author_id: author.id, content: "reply".into() })
        .await
        .unwrap();
    assert_eq!(r.list_comments_for_post(post.id).await.unwrap().len(), 2);

    r.delete_post(post.id).await.unwrap();
    assert!(matches!(r.get_post(post.id).await, Err(RepoError::NotFound)));
    assert!(r.list_comments_for_post(post.id).await.unwrap().is_empty());
    assert!(matches!(r.delete_post(post.id).await, Err(RepoError::NotFound)));
}

#[tokio::test]
#[serial_test::serial]
async fn pg_post_without_board_reads_as_general() {
    let Some(r) = repo().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let author = fresh_user(&r, "legacy").await;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO posts (board_code, title, content, author_id) VALUES (NULL, 'old post', 'before boards', $1) RETURNING id",
    )
    .bind(author)
    .fetch_one(r.pool())
    .await
    .unwrap();

    let post = r.get_post(id).await.unwrap();
    assert_eq!(post.board_code, DEFAULT_BOARD_CODE);
    assert_eq!(post.details, PostDetails::General);

    let page = r.list_posts(DEFAULT_BOARD_CODE, PageRequest::default()).await.unwrap();
    let listed = page.items.iter().find(|p| p.id == id).expect("legacy post listed under GENERAL");
    assert_eq!(listed.board_code, DEFAULT_BOARD_CODE);
    assert!(page.total >= 1);

    r.delete_post(id).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn pg_comment_writes_respect_the_deleted_flag() {
    let Some(r) = repo().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let author = fresh_user(&r, "guard").await;
    let new_post = |title: &str| NewPost {
        board_code: DEFAULT_BOARD_CODE.into(),
        title: title.into(),
        content: "c".into(),
        author_id: author,
        details: PostDetails::General,
    };
    let post = r.create_post(new_post("a")).await.unwrap();
    let other = r.create_post(new_post("b")).await.unwrap();
    let root = r
        .create_comment(NewComment { post_id: post.id, parent_id: None, author_id: author, content: "root".into() })
        .await
        .unwrap();

    let foreign = r
        .create_comment(NewComment { post_id: other.id, parent_id: Some(root.id), author_id: author, content: "x".into() })
        .await;
    assert!(matches!(foreign, Err(RepoError::ParentMismatch)));

    assert_eq!(r.update_comment_content(root.id, "edited").await.unwrap().content, "edited");
    assert!(r.mark_comment_deleted(root.id).await.unwrap().deleted);
    assert!(matches!(r.mark_comment_deleted(root.id).await, Err(RepoError::Deleted)));
    assert!(matches!(r.update_comment_content(root.id, "back").await, Err(RepoError::Deleted)));
    assert!(matches!(r.update_comment_content(i64::MAX, "x").await, Err(RepoError::NotFound)));

    let reply = r
        .create_comment(NewComment { post_id: post.id, parent_id: Some(root.id), author_id: author, content: "x".into() })
        .await;
    assert!(matches!(reply, Err(RepoError::Deleted)));
    assert_eq!(r.list_comments_for_post(post.id).await.unwrap().len(), 1);

    r.delete_post(post.id).await.unwrap();
    r.delete_post(other.id).await.unwrap();
}
