//! Route handlers. Fragment routes answer with HTML for htmx to swap in;
//! problems the user can fix are shown inline instead of as error statuses.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use tubecore::AppError;

use super::render::{self, Notice};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct AddForm {
    #[serde(default)]
    pub item: String,
}

#[derive(Debug, Deserialize)]
pub struct ParametersForm {
    #[serde(default)]
    pub parameters: String,
}

/// Renders the subscription list, optionally topped with a notice.
fn list_fragment(state: &AppState, notice: Option<Notice>) -> Response {
    match state.service.list_with_stats() {
        Ok(views) => Html(render::subscription_list(&views, notice.as_ref())).into_response(),
        Err(e) => {
            log::error!("Failed to list subscriptions: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render::notice(&Notice::Error("Could not load subscriptions".into()))),
            )
                .into_response()
        }
    }
}

/// GET / - the full page.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render::page(&state.service.parameters()))
}

/// GET /subscriptions (and the /items alias) - the list fragment.
pub async fn subscriptions(State(state): State<AppState>) -> Response {
    list_fragment(&state, None)
}

/// POST /add - subscribes to `item`; enrichment continues in the background.
pub async fn add(State(state): State<AppState>, Form(form): Form<AddForm>) -> Response {
    let url = form.item.trim();
    if url.is_empty() {
        return list_fragment(&state, None);
    }

    log::info!("Adding subscription {}", url);
    let notice = match state.service.add_and_enrich(url).await {
        Ok(_) => None,
        Err(AppError::Duplicate(url)) => Some(Notice::Warning(format!("Already subscribed to {}", url))),
        Err(AppError::InvalidUrl(_)) => Some(Notice::Error(format!(
            "Not a video, channel or playlist URL yt-dlp understands: {}",
            url
        ))),
        Err(e) => {
            log::error!("Failed to add {}: {}", url, e);
            Some(Notice::Error(format!("Could not add {}: {}", url, e)))
        }
    };
    list_fragment(&state, notice)
}

/// DELETE /remove/{*url}
pub async fn remove(State(state): State<AppState>, Path(url): Path<String>) -> Response {
    let notice = match state.service.remove(&url) {
        Ok(true) => None,
        Ok(false) => Some(Notice::Warning(format!("No subscription for {}", url))),
        Err(e) => {
            log::error!("Failed to remove {}: {}", url, e);
            Some(Notice::Error(format!("Could not remove {}", url)))
        }
    };
    list_fragment(&state, notice)
}

/// POST /update/{*url} - queues an immediate download.
pub async fn update(State(state): State<AppState>, Path(url): Path<String>) -> Response {
    match state.service.update_now(&url) {
        Ok(()) => list_fragment(
            &state,
            Some(Notice::Info(format!("Update queued for {}", url))),
        ),
        Err(AppError::NotFound(_)) => (StatusCode::NOT_FOUND, "Subscription not found").into_response(),
        Err(e) => {
            log::error!("Failed to queue update for {}: {}", url, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// POST /set-parameters - 204 on success, nothing for htmx to swap.
pub async fn set_parameters(State(state): State<AppState>, Form(form): Form<ParametersForm>) -> Response {
    match state.service.set_parameters(&form.parameters) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ AppError::InvalidParameters(_)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            log::error!("Failed to save parameters: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /videos/{channel_id} - the reconciled video list of a channel.
pub async fn videos(State(state): State<AppState>, Path(channel_id): Path<String>) -> Response {
    if channel_id == "unknown" || channel_id.is_empty() {
        return Html(render::video_list(&[])).into_response();
    }

    match state.service.videos_for_channel(&channel_id) {
        Ok(records) => Html(render::video_list(&records)).into_response(),
        Err(e) => {
            log::error!("Failed to scan videos for {}: {}", channel_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render::notice(&Notice::Error("Could not load videos".into()))),
            )
                .into_response()
        }
    }
}

/// GET /health - simple health check.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
