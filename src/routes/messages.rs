use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::services::message_service::{HistoryPage, MessageService};
use crate::state::AppState;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

#[derive(Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /api/v1/chats/messages/:chat_id?page=&limit=
///
/// Paginated history, oldest first. Read-state fields on other users'
/// messages are withheld.
pub async fn chat_messages(
    State(state): State<AppState>,
    Extension(AuthUser(self_id)): Extension<AuthUser>,
    Path(chat_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<HistoryPage>> {
    let page =
        MessageService::message_history(&state.db, chat_id, self_id, params.page, params.limit)
            .await?;
    Ok(Json(page))
}
