use crate::error::{AppError, AppResult};
use crate::models::UserSummary;
use crate::services::chat_store::ChatStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

/// A persisted message with sender and reply hydration, as broadcast to
/// rooms and returned from history. `message_id` doubles as the client
/// dedup key under at-least-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratedMessage {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub text: String,
    pub sender: UserSummary,
    /// Absent both when the message is not a reply and when the parent
    /// was deleted (tombstone).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyPreview>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPreview {
    pub message_id: Uuid,
    pub text: String,
    pub sender: UserSummary,
    pub created_at: DateTime<Utc>,
}

/// One history entry. Read-state fields are only exposed for the
/// caller's own messages; `read_by_me` is suppressed for those instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    #[serde(flatten)]
    pub message: HydratedMessage,
    pub read_count: i32,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_by_me: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub messages: Vec<HistoryMessage>,
    pub page: i64,
    pub limit: i64,
    pub count: i64,
    pub total_pages: i64,
}

const MAX_PAGE_SIZE: i64 = 100;

/// Translate a 1-based page request into an SQL window.
fn page_window(page: i64, limit: i64) -> AppResult<(i64, i64)> {
    if page < 1 {
        return Err(AppError::BadRequest("page must be >= 1".into()));
    }
    if limit < 1 {
        return Err(AppError::BadRequest("limit must be >= 1".into()));
    }
    let limit = limit.min(MAX_PAGE_SIZE);
    Ok(((page - 1) * limit, limit))
}

/// Validates and persists new messages, and serves paged history.
pub struct MessageService;

impl MessageService {
    /// Validate and persist a message. Returns the hydrated row re-read
    /// after commit, so a broadcast built from it only ever reflects
    /// committed state.
    pub async fn send(
        db: &Pool<Postgres>,
        chat_id: Uuid,
        sender_id: Uuid,
        text: &str,
        reply_to: Option<Uuid>,
    ) -> AppResult<HydratedMessage> {
        if text.trim().is_empty() {
            return Err(AppError::BadRequest("message text cannot be empty".into()));
        }
        if !ChatStore::is_participant(db, chat_id, sender_id).await? {
            return Err(AppError::Forbidden);
        }

        let message = ChatStore::create_message(db, chat_id, sender_id, text, reply_to).await?;
        Self::hydrate(db, message.message_id).await
    }

    /// Re-read a message with sender and reply-preview hydration.
    pub async fn hydrate(db: &Pool<Postgres>, message_id: Uuid) -> AppResult<HydratedMessage> {
        let row = sqlx::query(
            r#"
            SELECT m.message_id, m.chat_id, m.text, m.created_at, m.updated_at,
                   u.id AS sender_id, u.name AS sender_name,
                   u.user_name AS sender_user_name, u.picture AS sender_picture,
                   r.message_id AS reply_id, r.text AS reply_text, r.created_at AS reply_created_at,
                   ru.id AS reply_sender_id, ru.name AS reply_sender_name,
                   ru.user_name AS reply_sender_user_name, ru.picture AS reply_sender_picture
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            LEFT JOIN messages r ON r.message_id = m.reply_to_message_id
            LEFT JOIN users ru ON ru.id = r.sender_id
            WHERE m.message_id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(Self::hydrated_from_row(&row))
    }

    fn hydrated_from_row(row: &sqlx::postgres::PgRow) -> HydratedMessage {
        let reply_id: Option<Uuid> = row.try_get("reply_id").ok().flatten();
        let reply_to = reply_id.map(|id| ReplyPreview {
            message_id: id,
            text: row.get("reply_text"),
            created_at: row.get("reply_created_at"),
            sender: UserSummary {
                id: row.get("reply_sender_id"),
                name: row.get("reply_sender_name"),
                user_name: row.get("reply_sender_user_name"),
                picture: row.try_get("reply_sender_picture").ok().flatten(),
            },
        });

        HydratedMessage {
            message_id: row.get("message_id"),
            chat_id: row.get("chat_id"),
            text: row.get("text"),
            sender: UserSummary {
                id: row.get("sender_id"),
                name: row.get("sender_name"),
                user_name: row.get("sender_user_name"),
                picture: row.try_get("sender_picture").ok().flatten(),
            },
            reply_to,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Paged history for a chat, oldest-to-newest within the page. The
    /// caller must be a participant. Read-state sanitization: counters
    /// are zeroed on other users' messages, and the `read_by_me` flag is
    /// suppressed on the caller's own.
    pub async fn message_history(
        db: &Pool<Postgres>,
        chat_id: Uuid,
        self_id: Uuid,
        page: i64,
        limit: i64,
    ) -> AppResult<HistoryPage> {
        let (offset, limit) = page_window(page, limit)?;

        // NotFound for a missing chat before the participation check
        ChatStore::get_chat(db, chat_id).await?;
        if !ChatStore::is_participant(db, chat_id, self_id).await? {
            return Err(AppError::Forbidden);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(db)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT m.message_id, m.chat_id, m.text, m.created_at, m.updated_at,
                   m.read_count, m.is_read, m.sender_id AS raw_sender_id,
                   u.id AS sender_id, u.name AS sender_name,
                   u.user_name AS sender_user_name, u.picture AS sender_picture,
                   r.message_id AS reply_id, r.text AS reply_text, r.created_at AS reply_created_at,
                   ru.id AS reply_sender_id, ru.name AS reply_sender_name,
                   ru.user_name AS reply_sender_user_name, ru.picture AS reply_sender_picture,
                   EXISTS (
                     SELECT 1 FROM read_receipts rr
                     WHERE rr.message_id = m.message_id AND rr.user_id = $2
                   ) AS read_by_me
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            LEFT JOIN messages r ON r.message_id = m.reply_to_message_id
            LEFT JOIN users ru ON ru.id = r.sender_id
            WHERE m.chat_id = $1
            ORDER BY m.created_at ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(chat_id)
        .bind(self_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

        let messages = rows
            .into_iter()
            .map(|row| {
                let sender_id: Uuid = row.get("raw_sender_id");
                let own = sender_id == self_id;
                let read_count: i32 = row.get("read_count");
                let is_read: bool = row.get("is_read");
                let read_by_me: bool = row.get("read_by_me");
                HistoryMessage {
                    message: Self::hydrated_from_row(&row),
                    read_count: if own { read_count } else { 0 },
                    is_read: if own { is_read } else { false },
                    read_by_me: if own { None } else { Some(read_by_me) },
                }
            })
            .collect();

        let total_pages = if count == 0 { 0 } else { (count + limit - 1) / limit };
        Ok(HistoryPage {
            messages,
            page,
            limit,
            count,
            total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_translates_pages_to_offsets() {
        assert_eq!(page_window(1, 10).unwrap(), (0, 10));
        assert_eq!(page_window(3, 10).unwrap(), (20, 10));
    }

    #[test]
    fn page_window_clamps_oversized_limit() {
        let (offset, limit) = page_window(2, 500).unwrap();
        assert_eq!(limit, MAX_PAGE_SIZE);
        assert_eq!(offset, MAX_PAGE_SIZE);
    }

    #[test]
    fn page_window_rejects_invalid_input() {
        assert!(page_window(0, 10).is_err());
        assert!(page_window(1, 0).is_err());
        assert!(page_window(-1, 10).is_err());
    }
}
