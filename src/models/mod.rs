pub mod chat;
pub mod message;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use chat::{Chat, ChatParticipant};
pub use message::{Message, ReadReceipt};

/// The projection of a user the chat core hydrates into previews and
/// broadcasts. The canonical user record lives with the user service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub user_name: String,
    pub picture: Option<String>,
}
