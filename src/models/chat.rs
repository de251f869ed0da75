use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub chat_id: Uuid,
    pub chat_name: String,
    pub participants_count: i32,
    pub message_count: i64,
    /// Weak reference to the most recently created live message. Goes NULL
    /// (not stale) when that message is deleted; the next send repairs it.
    pub last_message_id: Option<Uuid>,
    /// Normalized "{min}:{max}" user-id pair for two-party chats. The
    /// unique index on this column is what makes concurrent
    /// find-or-create converge on a single row.
    pub direct_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatParticipant {
    pub chat_participant_id: Uuid,
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub is_admin: bool,
    pub last_seen_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
