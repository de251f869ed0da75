use crate::error::{AppError, AppResult};
use crate::models::{Chat, Message, ReadReceipt};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

/// Outcome of recording a read receipt. `fully_read` is true only on the
/// transition where the receipt completed the participant set, the
/// trigger point downstream consumers (notification fan-out) hook into.
#[derive(Debug, Clone, Copy)]
pub struct ReadOutcome {
    pub chat_id: Uuid,
    pub read_count: i32,
    pub fully_read: bool,
}

/// Persistence and invariant-preserving mutation of chats, messages and
/// read receipts. The chat's derived counters (`message_count`,
/// `last_message_id`) and the message's (`read_count`, `is_read`) are
/// written here and nowhere else, always inside a single transaction with
/// the row insert or delete that caused them. Increments are done in SQL
/// (`SET x = x + 1`) so concurrent writers serialize on the row instead
/// of racing a read-then-write.
pub struct ChatStore;

impl ChatStore {
    /// Insert a message and advance the owning chat's counters in one
    /// transaction. Fails with `NotFound` if the chat or the reply target
    /// does not exist.
    pub async fn create_message(
        db: &Pool<Postgres>,
        chat_id: Uuid,
        sender_id: Uuid,
        text: &str,
        reply_to: Option<Uuid>,
    ) -> AppResult<Message> {
        let mut tx = db.begin().await?;

        let chat_exists = sqlx::query("SELECT 1 FROM chats WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&mut *tx)
            .await?;
        if chat_exists.is_none() {
            return Err(AppError::NotFound);
        }

        if let Some(reply_id) = reply_to {
            let parent = sqlx::query("SELECT chat_id FROM messages WHERE message_id = $1")
                .bind(reply_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound)?;
            let parent_chat: Uuid = parent.get("chat_id");
            if parent_chat != chat_id {
                return Err(AppError::BadRequest(
                    "reply target belongs to a different chat".into(),
                ));
            }
        }

        let message_id = Uuid::new_v4();
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (message_id, chat_id, sender_id, text, reply_to_message_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING message_id, chat_id, sender_id, text, reply_to_message_id,
                      read_count, is_read, created_at, updated_at
            "#,
        )
        .bind(message_id)
        .bind(chat_id)
        .bind(sender_id)
        .bind(text)
        .bind(reply_to)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE chats
            SET message_count = message_count + 1,
                last_message_id = $2,
                updated_at = now()
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id)
        .bind(message_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Record that `user_id` has seen `message_id`. A second receipt for
    /// the same pair fails with `AlreadyRead` (explicit conflict policy;
    /// the unique index plus `ON CONFLICT DO NOTHING` makes a double
    /// increment impossible either way). On the first receipt the
    /// message's `read_count` advances, and `is_read` flips in the same
    /// transaction once every participant has acknowledged.
    pub async fn record_read(
        db: &Pool<Postgres>,
        message_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<(ReadReceipt, ReadOutcome)> {
        let mut tx = db.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT m.chat_id, c.participants_count
            FROM messages m
            JOIN chats c ON c.chat_id = m.chat_id
            WHERE m.message_id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;
        let chat_id: Uuid = row.get("chat_id");
        let participants_count: i32 = row.get("participants_count");

        let receipt = sqlx::query_as::<_, ReadReceipt>(
            r#"
            INSERT INTO read_receipts (read_receipt_id, message_id, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id, user_id) DO NOTHING
            RETURNING read_receipt_id, message_id, user_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::AlreadyRead)?;

        let read_count: i32 = sqlx::query_scalar(
            r#"
            UPDATE messages
            SET read_count = read_count + 1, updated_at = now()
            WHERE message_id = $1
            RETURNING read_count
            "#,
        )
        .bind(message_id)
        .fetch_one(&mut *tx)
        .await?;

        let fully_read = read_count >= participants_count;
        if fully_read {
            sqlx::query("UPDATE messages SET is_read = TRUE WHERE message_id = $1")
                .bind(message_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok((
            receipt,
            ReadOutcome {
                chat_id,
                read_count,
                fully_read,
            },
        ))
    }

    /// Delete a message and decrement the owning chat's `message_count`
    /// in one transaction. `last_message_id` is not recomputed here: the
    /// foreign key sets it NULL when the deleted row was the most recent,
    /// and the next send repairs it (accepted eventual-consistency gap).
    pub async fn delete_message(db: &Pool<Postgres>, message_id: Uuid) -> AppResult<()> {
        let mut tx = db.begin().await?;

        let row = sqlx::query("SELECT chat_id FROM messages WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound)?;
        let chat_id: Uuid = row.get("chat_id");

        sqlx::query("DELETE FROM messages WHERE message_id = $1")
            .bind(message_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE chats
            SET message_count = GREATEST(message_count - 1, 0), updated_at = now()
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_chat(db: &Pool<Postgres>, chat_id: Uuid) -> AppResult<Chat> {
        sqlx::query_as::<_, Chat>(
            r#"
            SELECT chat_id, chat_name, participants_count, message_count,
                   last_message_id, direct_key, created_at, updated_at
            FROM chats
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)
    }

    pub async fn get_message(db: &Pool<Postgres>, message_id: Uuid) -> AppResult<Message> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT message_id, chat_id, sender_id, text, reply_to_message_id,
                   read_count, is_read, created_at, updated_at
            FROM messages
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)
    }

    pub async fn is_participant(
        db: &Pool<Postgres>,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<bool> {
        let rec = sqlx::query(
            "SELECT 1 FROM chat_participants WHERE chat_id = $1 AND user_id = $2 LIMIT 1",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(rec.is_some())
    }
}
