use crate::error::{AppError, AppResult};
use crate::services::chat_store::{ChatStore, ReadOutcome};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

/// Records that a user has seen a message and surfaces the fully-read
/// transition for downstream consumers.
///
/// Sender-read policy: the sender's own read is not implicit. A message
/// reaches `is_read` only once every participant, sender included, has a
/// receipt on file.
pub struct ReadReceiptService;

impl ReadReceiptService {
    pub async fn mark_read(
        db: &Pool<Postgres>,
        message_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<ReadOutcome> {
        let message = ChatStore::get_message(db, message_id).await?;
        if !ChatStore::is_participant(db, message.chat_id, user_id).await? {
            return Err(AppError::Forbidden);
        }

        let (_receipt, outcome) = ChatStore::record_read(db, message_id, user_id).await?;

        if outcome.fully_read {
            // Trigger point for notification fan-out; emission only here.
            tracing::info!(
                message_id = %message_id,
                chat_id = %outcome.chat_id,
                "message fully read by all participants"
            );
        }

        Ok(outcome)
    }
}
