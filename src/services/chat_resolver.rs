use crate::error::{AppError, AppResult};
use crate::models::{Chat, UserSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;

/// One entry of a user's chat list: the chat, the *other* participants,
/// and a hydrated preview of the most recent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPreview {
    pub chat_id: Uuid,
    pub chat_name: String,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<LastMessagePreview>,
    pub message_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessagePreview {
    pub message_id: Uuid,
    pub text: String,
    pub sender: UserSummary,
    pub created_at: DateTime<Utc>,
}

/// Normalized dedup key for a two-party chat: the unordered pair rendered
/// as "{min}:{max}", so both orderings resolve to the same unique value.
pub fn direct_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

/// Finds or creates the unique two-party chat for a pair of users, and
/// lists/searches a user's chats ordered by recency.
pub struct ChatResolver;

impl ChatResolver {
    /// Resolve the direct chat between the requester and `target_id`,
    /// creating it (plus both participant rows) when absent. Concurrent
    /// callers converge on one row via the unique `direct_key` index: the
    /// losing insert blocks until the winner commits, observes the
    /// conflict, and re-reads the winner's row.
    pub async fn find_or_create_direct_chat(
        db: &Pool<Postgres>,
        self_id: Uuid,
        target_id: Uuid,
    ) -> AppResult<Chat> {
        if self_id == target_id {
            return Err(AppError::BadRequest(
                "cannot start a chat with yourself".into(),
            ));
        }

        let self_user = sqlx::query("SELECT name FROM users WHERE id = $1")
            .bind(self_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::Unauthorized)?;
        let self_name: String = self_user.get("name");

        let target = sqlx::query("SELECT name, visibility FROM users WHERE id = $1")
            .bind(target_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)?;
        let target_name: String = target.get("name");
        let visibility: String = target.get("visibility");

        if visibility == "private" {
            Self::require_accepted_follow(db, self_id, target_id).await?;
        }

        let key = direct_key(self_id, target_id);
        let mut tx = db.begin().await?;

        if let Some(existing) = Self::fetch_by_direct_key(&mut tx, &key).await? {
            tx.commit().await?;
            return Ok(existing);
        }

        let chat_name = format!("{self_id}-{target_id}-{self_name}-{target_name}");
        let inserted = sqlx::query_as::<_, Chat>(
            r#"
            INSERT INTO chats (chat_id, chat_name, participants_count, direct_key)
            VALUES ($1, $2, 2, $3)
            ON CONFLICT (direct_key) DO NOTHING
            RETURNING chat_id, chat_name, participants_count, message_count,
                      last_message_id, direct_key, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&chat_name)
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        let chat = match inserted {
            Some(chat) => {
                sqlx::query(
                    r#"
                    INSERT INTO chat_participants (chat_participant_id, chat_id, user_id)
                    VALUES ($1, $3, $4), ($2, $3, $5)
                    ON CONFLICT (chat_id, user_id) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(Uuid::new_v4())
                .bind(chat.chat_id)
                .bind(self_id)
                .bind(target_id)
                .execute(&mut *tx)
                .await?;
                chat
            }
            // Lost the race: the conflicting transaction has committed by
            // now, so the winner's row is visible.
            None => Self::fetch_by_direct_key(&mut tx, &key)
                .await?
                .ok_or(AppError::Internal)?,
        };

        tx.commit().await?;
        Ok(chat)
    }

    async fn fetch_by_direct_key(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        key: &str,
    ) -> Result<Option<Chat>, sqlx::Error> {
        sqlx::query_as::<_, Chat>(
            r#"
            SELECT chat_id, chat_name, participants_count, message_count,
                   last_message_id, direct_key, created_at, updated_at
            FROM chats
            WHERE direct_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Private profiles can only be messaged over an accepted follow
    /// connection from the requester.
    async fn require_accepted_follow(
        db: &Pool<Postgres>,
        follower_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<()> {
        let connection = sqlx::query(
            "SELECT status FROM user_followers WHERE follower_id = $1 AND user_id = $2",
        )
        .bind(follower_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        match connection {
            Some(row) => {
                let status: String = row.get("status");
                if status == "accepted" {
                    Ok(())
                } else {
                    Err(AppError::Forbidden)
                }
            }
            None => Err(AppError::Forbidden),
        }
    }

    /// Chats the user participates in, most recently active first, each
    /// with the other participants and a last-message preview. The search
    /// term filters by chat name or any participant's name/handle
    /// (case-insensitive substring).
    pub async fn list_chats(
        db: &Pool<Postgres>,
        user_id: Uuid,
        search_term: Option<&str>,
    ) -> AppResult<Vec<ChatPreview>> {
        let pattern = search_term
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));

        let chat_rows = match &pattern {
            Some(pat) => {
                sqlx::query(
                    r#"
                    SELECT c.chat_id, c.chat_name, c.message_count, c.last_message_id, c.updated_at
                    FROM chats c
                    JOIN chat_participants cp ON cp.chat_id = c.chat_id
                    WHERE cp.user_id = $1
                      AND c.chat_id IN (
                        SELECT DISTINCT c2.chat_id
                        FROM chats c2
                        JOIN chat_participants p2 ON p2.chat_id = c2.chat_id
                        JOIN users u ON u.id = p2.user_id
                        WHERE c2.chat_name ILIKE $2
                           OR u.name ILIKE $2
                           OR u.user_name ILIKE $2
                      )
                    ORDER BY c.updated_at DESC
                    LIMIT 100
                    "#,
                )
                .bind(user_id)
                .bind(pat)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT c.chat_id, c.chat_name, c.message_count, c.last_message_id, c.updated_at
                    FROM chats c
                    JOIN chat_participants cp ON cp.chat_id = c.chat_id
                    WHERE cp.user_id = $1
                    ORDER BY c.updated_at DESC
                    LIMIT 100
                    "#,
                )
                .bind(user_id)
                .fetch_all(db)
                .await?
            }
        };

        if chat_rows.is_empty() {
            return Ok(vec![]);
        }

        let chat_ids: Vec<Uuid> = chat_rows.iter().map(|r| r.get("chat_id")).collect();
        let last_ids: Vec<Uuid> = chat_rows
            .iter()
            .filter_map(|r| r.try_get::<Option<Uuid>, _>("last_message_id").ok().flatten())
            .collect();

        // Other participants, grouped per chat
        let participant_rows = sqlx::query(
            r#"
            SELECT cp.chat_id, u.id, u.name, u.user_name, u.picture
            FROM chat_participants cp
            JOIN users u ON u.id = cp.user_id
            WHERE cp.chat_id = ANY($1) AND cp.user_id <> $2
            "#,
        )
        .bind(&chat_ids)
        .bind(user_id)
        .fetch_all(db)
        .await?;

        let mut participants_map: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        for row in participant_rows {
            let chat_id: Uuid = row.get("chat_id");
            participants_map.entry(chat_id).or_default().push(UserSummary {
                id: row.get("id"),
                name: row.get("name"),
                user_name: row.get("user_name"),
                picture: row.try_get("picture").ok(),
            });
        }

        // Last-message previews with sender hydration
        let mut previews_map: HashMap<Uuid, LastMessagePreview> = HashMap::new();
        if !last_ids.is_empty() {
            let preview_rows = sqlx::query(
                r#"
                SELECT m.message_id, m.text, m.created_at,
                       u.id, u.name, u.user_name, u.picture
                FROM messages m
                JOIN users u ON u.id = m.sender_id
                WHERE m.message_id = ANY($1)
                "#,
            )
            .bind(&last_ids)
            .fetch_all(db)
            .await?;

            for row in preview_rows {
                let message_id: Uuid = row.get("message_id");
                previews_map.insert(
                    message_id,
                    LastMessagePreview {
                        message_id,
                        text: row.get("text"),
                        created_at: row.get("created_at"),
                        sender: UserSummary {
                            id: row.get("id"),
                            name: row.get("name"),
                            user_name: row.get("user_name"),
                            picture: row.try_get("picture").ok(),
                        },
                    },
                );
            }
        }

        let previews = chat_rows
            .into_iter()
            .map(|row| {
                let chat_id: Uuid = row.get("chat_id");
                let last_message_id: Option<Uuid> = row.try_get("last_message_id").ok().flatten();
                ChatPreview {
                    chat_id,
                    chat_name: row.get("chat_name"),
                    participants: participants_map.remove(&chat_id).unwrap_or_default(),
                    last_message: last_message_id.and_then(|id| previews_map.remove(&id)),
                    message_count: row.get("message_count"),
                    updated_at: row.get("updated_at"),
                }
            })
            .collect();

        Ok(previews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(direct_key(a, b), direct_key(b, a));
    }

    #[test]
    fn direct_key_orders_min_first() {
        let a = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let b = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();
        assert_eq!(direct_key(b, a), format!("{a}:{b}"));
    }
}
