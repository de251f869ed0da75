use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::services::chat_resolver::{ChatPreview, ChatResolver};
use crate::state::AppState;

#[derive(Serialize)]
pub struct StartChatResponse {
    pub chat_id: Uuid,
}

/// GET /api/v1/chats/user/start/:user_id
///
/// Find or create the direct chat between the caller and the target
/// user. Idempotent: repeated calls return the same chat id.
pub async fn start_direct_chat(
    State(state): State<AppState>,
    Extension(AuthUser(self_id)): Extension<AuthUser>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<StartChatResponse>> {
    let chat = ChatResolver::find_or_create_direct_chat(&state.db, self_id, target_id).await?;
    Ok(Json(StartChatResponse {
        chat_id: chat.chat_id,
    }))
}

#[derive(Deserialize)]
pub struct ListChatsParams {
    pub search_term: Option<String>,
}

/// GET /api/v1/chats/user?search_term=
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(AuthUser(self_id)): Extension<AuthUser>,
    Query(params): Query<ListChatsParams>,
) -> AppResult<Json<Vec<ChatPreview>>> {
    let chats = ChatResolver::list_chats(&state.db, self_id, params.search_term.as_deref()).await?;
    Ok(Json(chats))
}
