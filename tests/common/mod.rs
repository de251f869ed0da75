//! Shared fixtures for database-backed tests. These tests expect a
//! reachable Postgres at DATABASE_URL and are ignored by default.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

pub async fn setup_db() -> Pool<Postgres> {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must point at a test database for ignored tests");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect to test database");
    chat_service::db::MIGRATOR
        .run(&pool)
        .await
        .expect("migrations failed");
    pool
}

/// Insert a user with a unique user_name and return its id.
pub async fn create_user(db: &Pool<Postgres>, name: &str, visibility: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, user_name, visibility) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(name)
        .bind(format!("{name}-{id}"))
        .bind(visibility)
        .execute(db)
        .await
        .expect("user insert failed");
    id
}

pub async fn accept_follow(db: &Pool<Postgres>, follower_id: Uuid, user_id: Uuid) {
    sqlx::query(
        "INSERT INTO user_followers (user_id, follower_id, status) VALUES ($1, $2, 'accepted')",
    )
    .bind(user_id)
    .bind(follower_id)
    .execute(db)
    .await
    .expect("follow insert failed");
}

pub async fn chat_counters(db: &Pool<Postgres>, chat_id: Uuid) -> (i64, Option<Uuid>) {
    let row: (i64, Option<Uuid>) =
        sqlx::query_as("SELECT message_count, last_message_id FROM chats WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(db)
            .await
            .expect("chat fetch failed");
    row
}
