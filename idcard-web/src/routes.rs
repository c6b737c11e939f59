use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use idcard_backend::CardController;
use idcard_backend::module::export::{EXPORT_FAILED_MESSAGE, ExportArtifact, ExportError, ExportStatus};
use serde::Serialize;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::page;

const SVG_CONTENT_TYPE: &str = "image/svg+xml; charset=utf-8";

#[derive(Debug, Serialize)]
struct MemberSummary<'a> {
    index: usize,
    display_name: &'a str,
    cohort: &'a str,
    region: &'a str,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    selected: Option<usize>,
    exports_enabled: bool,
    export: ExportStatus,
}

/// Maps export failures to HTTP responses. Users only get a generic
/// message; the cause has already been logged by the exporter.
struct ExportFailure(ExportError);

impl IntoResponse for ExportFailure {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            ExportError::Busy => (StatusCode::CONFLICT, "An export is already in progress.".to_string()),
            ExportError::NothingSelected | ExportError::EmptyDirectory => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, EXPORT_FAILED_MESSAGE.to_string()),
        };
        (status, message).into_response()
    }
}

pub fn router(controller: Arc<CardController>, photo_dir: &std::path::Path, photo_url_prefix: &str) -> Router {
    let prefix = format!("/{}", photo_url_prefix.trim_matches('/'));

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/members", get(members))
        .route("/api/status", get(status))
        .route("/select/{index}", post(select))
        .route("/card/selected", get(selected_card))
        .route("/card/{index}", get(member_card))
        .route("/export/current", post(export_current))
        .route("/export/all", post(export_all));

    let app = if prefix == "/" {
        app.fallback_service(ServeDir::new(photo_dir))
    } else {
        app.nest_service(&prefix, ServeDir::new(photo_dir))
    };

    app.layer(TraceLayer::new_for_http()).with_state(controller)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn index(State(controller): State<Arc<CardController>>) -> Html<String> {
    Html(page::render_index(&controller))
}

async fn members(State(controller): State<Arc<CardController>>) -> Response {
    let selected = controller.selected_index();
    let members: Vec<MemberSummary> = controller
        .members()
        .iter()
        .enumerate()
        .map(|(index, m)| MemberSummary {
            index,
            display_name: &m.display_name,
            cohort: &m.cohort,
            region: &m.region,
            selected: selected == Some(index),
        })
        .collect();
    Json(members).into_response()
}

async fn status(State(controller): State<Arc<CardController>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        selected: controller.selected_index(),
        exports_enabled: controller.exports_enabled(),
        export: controller.export_status(),
    })
}

async fn select(State(controller): State<Arc<CardController>>, Path(index): Path<usize>) -> Response {
    if controller.select(index) {
        tracing::debug!("Selected member {}", index);
        Redirect::to("/").into_response()
    } else {
        (StatusCode::NOT_FOUND, "No such member").into_response()
    }
}

async fn selected_card(State(controller): State<Arc<CardController>>) -> Response {
    match controller.render_selected() {
        Some(view) => ([(header::CONTENT_TYPE, SVG_CONTENT_TYPE)], view.svg).into_response(),
        None => (StatusCode::NOT_FOUND, "No member selected").into_response(),
    }
}

async fn member_card(State(controller): State<Arc<CardController>>, Path(index): Path<usize>) -> Response {
    match controller.render_member(index) {
        Some(view) => ([(header::CONTENT_TYPE, SVG_CONTENT_TYPE)], view.svg).into_response(),
        None => (StatusCode::NOT_FOUND, "No such member").into_response(),
    }
}

async fn export_current(State(controller): State<Arc<CardController>>) -> Result<Response, ExportFailure> {
    let artifact = controller.export_selected().await.map_err(ExportFailure)?;
    Ok(attachment(artifact))
}

async fn export_all(State(controller): State<Arc<CardController>>) -> Result<Response, ExportFailure> {
    let artifact = controller.export_all().await.map_err(ExportFailure)?;
    Ok(attachment(artifact))
}

/// Download response; non-ASCII names go through `filename*`.
fn attachment(artifact: ExportArtifact) -> Response {
    let fallback: String = artifact
        .file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(&artifact.file_name)
    );

    (
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}
