use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::middleware::{self, auth::auth_middleware};
use crate::state::AppState;
use crate::websocket::handlers::ws_handler;

pub mod chats;
pub mod messages;

async fn health() -> &'static str {
    "OK"
}

/// Assemble the full application router.
///
/// The chat and message routes sit behind the auth middleware. The
/// websocket route does not: browser clients cannot attach headers to an
/// upgrade request, so the handler verifies the credential itself before
/// completing the handshake.
pub fn build_router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/chats/user/start/:user_id", get(chats::start_direct_chat))
        .route("/chats/user", get(chats::list_chats))
        .route("/chats/messages/:chat_id", get(messages::chat_messages))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .nest("/api/v1", authed)
        .route("/api/v1/ws", get(ws_handler))
        .route("/health", get(health));

    let mut router = api.with_state(state.clone());

    if let Some(origin) = state.config.frontend_origin.as_deref() {
        if let Ok(origin) = origin.parse::<HeaderValue>() {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods([Method::GET, Method::POST])
                    .allow_credentials(true)
                    .allow_headers([
                        axum::http::header::AUTHORIZATION,
                        axum::http::header::CONTENT_TYPE,
                    ]),
            );
        } else {
            tracing::warn!("FRONTEND_ORIGIN is not a valid header value, CORS disabled");
        }
    }

    middleware::with_defaults(router)
}
