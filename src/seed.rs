//! Startup data: the two fixed boards and, on request, demo accounts.

use crate::auth::Role;
use crate::models::{BoardKind, NewBoard, NewUser, DEFAULT_BOARD_CODE, VENUE_BOARD_CODE};
use crate::repo::{Repo, RepoError, RepoResult};

pub const DEMO_USERNAMES: [&str; 2] = ["user1", "user2"];

// Login is out of scope; this hash never verifies.
const LOCKED_CREDENTIAL: &str = "!";

/// Creates any missing default board. Safe to run on every start.
pub async fn seed_boards(repo: &dyn Repo) -> RepoResult<()> {
    let defaults = [
        (DEFAULT_BOARD_CODE, "Free board", BoardKind::General),
        (VENUE_BOARD_CODE, "Wedding venues", BoardKind::Venue),
    ];
    for (code, name, kind) in defaults {
        match repo.get_board(code).await {
            Ok(_) => continue,
            Err(RepoError::NotFound) => {}
            Err(e) => return Err(e),
        }
        match repo.create_board(NewBoard { code: code.to_string(), name: name.to_string(), kind }).await {
            Ok(board) => tracing::info!(code = %board.code, "seeded board"),
            // another instance got there first
            Err(RepoError::Conflict) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Only touches an empty user table. Returns how many users were created.
pub async fn seed_demo_users(repo: &dyn Repo) -> RepoResult<usize> {
    if repo.count_users().await? > 0 {
        return Ok(0);
    }
    let mut created = 0;
    for username in DEMO_USERNAMES {
        match repo
            .create_user(NewUser {
                username: username.to_string(),
                credential_hash: LOCKED_CREDENTIAL.to_string(),
                role: Role::User,
            })
            .await
        {
            Ok(user) => {
                tracing::info!(user_id = user.id, username, "seeded demo user");
                created += 1;
            }
            Err(RepoError::Conflict) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

pub async fn seed(repo: &dyn Repo, demo_users: bool) -> RepoResult<()> {
    seed_boards(repo).await?;
    if demo_users {
        seed_demo_users(repo).await?;
    }
    Ok(())
}
