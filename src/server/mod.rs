use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::{GoogleOAuth, SessionStore};
use crate::google_drive::DriveService;

pub use error::ApiError;
pub use extract::AuthUser;

mod auth_routes;
mod drive_routes;
mod error;
mod extract;

/// Uploads are buffered before they are forwarded to Drive.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub drive: Arc<dyn DriveService>,
    pub sessions: SessionStore,
    /// `None` when no Google client credentials were configured
    pub oauth: Option<GoogleOAuth>,
}

impl AppState {
    pub fn new(
        drive: Arc<dyn DriveService>,
        sessions: SessionStore,
        oauth: Option<GoogleOAuth>,
    ) -> Self {
        AppState {
            drive,
            sessions,
            oauth,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let auth = Router::new()
        .route("/google", get(auth_routes::google_login))
        .route("/google/callback", get(auth_routes::google_callback))
        .route("/user", get(auth_routes::current_user))
        .route("/logout", get(auth_routes::logout));

    let drive = Router::new()
        .route("/files", get(drive_routes::list_files))
        .route(
            "/files/:file_id",
            get(drive_routes::get_file).delete(drive_routes::delete_file),
        )
        .route("/files/:file_id/content", get(drive_routes::file_content))
        .route("/files/:file_id/download", get(drive_routes::download_file))
        .route("/files/:file_id/move", patch(drive_routes::move_file))
        .route("/download/:file_id", get(drive_routes::download_file))
        .route(
            "/upload",
            post(drive_routes::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/folders", post(drive_routes::create_folder))
        .route("/folders/:folder_id/files", get(drive_routes::list_folder))
        .route("/search", get(drive_routes::search))
        .route("/share", post(drive_routes::share_file))
        .route(
            "/permissions/:file_id",
            get(drive_routes::list_permissions).post(drive_routes::share_file_by_path),
        )
        .route(
            "/permissions/:file_id/:permission_id",
            delete(drive_routes::remove_permission),
        )
        .route("/storage", get(drive_routes::storage));

    Router::new()
        .nest("/api/auth", auth)
        .nest("/api/drive", drive)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
