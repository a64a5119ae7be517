#![cfg(feature = "inmem-store")]

use std::sync::Arc;

use tempfile::TempDir;
use wedding_board::{
    auth::Role,
    error::ServiceError,
    models::{NewUser, PageRequest, PostDetails, VenueDetails, DEFAULT_BOARD_CODE, TITLE_MAX_CHARS, VENUE_BOARD_CODE},
    posts::{CreatePostInput, PostService, UpdatePostInput},
    repo::{inmem::InMemRepo, UserRepo},
    seed,
};

async fn setup() -> (PostService, i64, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let repo = InMemRepo::open(dir.path()).unwrap();
    seed::seed_boards(&repo).await.unwrap();
    let author = repo
        .create_user(NewUser { username: "bride".into(), credential_hash: "!".into(), role: Role::User })
        .await
        .unwrap()
        .id;
    (PostService::new(Arc::new(repo)), author, dir)
}

fn input(board: &str, author: i64, venue: Option<VenueDetails>) -> CreatePostInput {
    CreatePostInput {
        board_code: board.into(),
        title: "Grand Hall review".into(),
        content: "Food was great".into(),
        author_id: author,
        venue,
    }
}

#[tokio::test]
async fn venue_board_posts_carry_details() {
    let (svc, author, _dir) = setup().await;
    let venue = VenueDetails {
        location: Some("Gangnam".into()),
        meal_price: Some(65_000),
        guarantee_min: Some(200),
        rental_fee: Some(3_000_000),
        misc_fee: None,
    };
    let id = svc.create_post(input(VENUE_BOARD_CODE, author, Some(venue.clone()))).await.unwrap();
    let post = svc.get_post(id).await.unwrap();
    assert_eq!(post.board_code, VENUE_BOARD_CODE);
    assert_eq!(post.details.venue(), Some(&venue));
    assert_eq!(post.created_at, post.updated_at);

    // omitted details still mark the post as a venue post
    let bare = svc.create_post(input(VENUE_BOARD_CODE, author, None)).await.unwrap();
    assert_eq!(svc.get_post(bare).await.unwrap().details, PostDetails::Venue(VenueDetails::default()));
}

#[tokio::test]
async fn general_board_rejects_venue_details() {
    let (svc, author, _dir) = setup().await;
    let err = svc
        .create_post(input(DEFAULT_BOARD_CODE, author, Some(VenueDetails::default())))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert_eq!(svc.list_posts(DEFAULT_BOARD_CODE, PageRequest::default()).await.unwrap().total, 0);
}

#[tokio::test]
async fn create_post_validates_input() {
    let (svc, author, _dir) = setup().await;

    let mut blank = input(DEFAULT_BOARD_CODE, author, None);
    blank.title = " ".into();
    assert!(matches!(svc.create_post(blank).await, Err(ServiceError::InvalidArgument(_))));

    let mut long = input(DEFAULT_BOARD_CODE, author, None);
    long.title = "x".repeat(TITLE_MAX_CHARS + 1);
    assert!(matches!(svc.create_post(long).await, Err(ServiceError::InvalidArgument(_))));

    let mut empty_body = input(DEFAULT_BOARD_CODE, author, None);
    empty_body.content = String::new();
    assert!(matches!(svc.create_post(empty_body).await, Err(ServiceError::InvalidArgument(_))));

    assert!(matches!(svc.create_post(input("NOPE", author, None)).await, Err(ServiceError::NotFound(_))));
    assert!(matches!(svc.create_post(input(DEFAULT_BOARD_CODE, 4242, None)).await, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn update_post_replaces_fields_and_moves_updated_at_forward() {
    let (svc, author, _dir) = setup().await;
    let id = svc.create_post(input(DEFAULT_BOARD_CODE, author, None)).await.unwrap();
    let before = svc.get_post(id).await.unwrap();

    let updated = svc
        .update_post(id, UpdatePostInput { title: "Edited".into(), content: "New body".into(), venue: None })
        .await
        .unwrap();
    assert_eq!(updated.title, "Edited");
    assert_eq!(updated.content, "New body");
    assert_eq!(updated.created_at, before.created_at);
    assert!(updated.updated_at >= before.updated_at);

    let err = svc
        .update_post(id, UpdatePostInput { title: "t".into(), content: "c".into(), venue: Some(VenueDetails::default()) })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));

    let missing = svc.update_post(9_999, UpdatePostInput { title: "t".into(), content: "c".into(), venue: None }).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    // lookup comes before validation
    let blank = svc.update_post(9_999, UpdatePostInput { title: " ".into(), content: "c".into(), venue: None }).await;
    assert!(matches!(blank, Err(ServiceError::NotFound(_))));
    let mut orphan = input("NOPE", author, None);
    orphan.title = String::new();
    assert!(matches!(svc.create_post(orphan).await, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn delete_post_twice_is_not_found() {
    let (svc, author, _dir) = setup().await;
    let id = svc.create_post(input(DEFAULT_BOARD_CODE, author, None)).await.unwrap();
    svc.delete_post(id).await.unwrap();
    assert!(matches!(svc.delete_post(id).await, Err(ServiceError::NotFound(_))));
}
