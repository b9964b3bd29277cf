use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::google_drive::{
    DriveEntry, DriveId, FileContent, NewUpload, Permission, Role, ShareRequest, StorageReport,
};
use crate::server::extract::JsonBody;
use crate::server::{ApiError, AppState, AuthUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderBody {
    name: Option<String>,
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveBody {
    target_folder_id: Option<String>,
    remove_from_parents: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareBody {
    file_id: Option<String>,
    email_address: Option<String>,
    role: Option<String>,
    send_notification: Option<bool>,
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// Treats empty strings like absent values.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `GET /api/drive/files[?folderId=]`
#[instrument(skip(state, user))]
pub async fn list_files(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DriveEntry>>, ApiError> {
    let folder = non_blank(query.folder_id)
        .map(DriveId::from)
        .unwrap_or_else(DriveId::root);
    Ok(Json(state.drive.list_folder(&user, &folder).await?))
}

/// `GET /api/drive/folders/:folder_id/files`
#[instrument(skip(state, user))]
pub async fn list_folder(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(folder_id): Path<String>,
) -> Result<Json<Vec<DriveEntry>>, ApiError> {
    let folder = DriveId::from(folder_id);
    Ok(Json(state.drive.list_folder(&user, &folder).await?))
}

/// `GET /api/drive/files/:file_id`
#[instrument(skip(state, user))]
pub async fn get_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<DriveEntry>, ApiError> {
    let entry = state
        .drive
        .get_entry(&user, &DriveId::from(file_id))
        .await
        .map_err(ApiError::from_lookup)?;
    Ok(Json(entry))
}

/// `GET /api/drive/files/:file_id/content`
#[instrument(skip(state, user))]
pub async fn file_content(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let content = state
        .drive
        .download(&user, &DriveId::from(file_id))
        .await
        .map_err(ApiError::from_lookup)?;
    Ok(stream_content(content, "inline"))
}

/// `GET /api/drive/files/:file_id/download` and `GET /api/drive/download/:file_id`
#[instrument(skip(state, user))]
pub async fn download_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let content = state
        .drive
        .download(&user, &DriveId::from(file_id))
        .await
        .map_err(ApiError::from_lookup)?;
    Ok(stream_content(content, "attachment"))
}

fn stream_content(content: FileContent, disposition: &str) -> Response {
    let mime_type = HeaderValue::from_str(&content.entry.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = format!(
        "{}; filename=\"{}\"",
        disposition,
        header_safe_file_name(&content.entry.name)
    );
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(content.body),
    )
        .into_response()
}

fn header_safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// `POST /api/drive/upload` (multipart: `file`, optional `parentFolderId`)
#[instrument(skip_all)]
pub async fn upload_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<DriveEntry>, ApiError> {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut parent: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("untitled").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                file = Some((name, content_type, data));
            }
            Some("parentFolderId") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                parent = non_blank(Some(value));
            }
            other => debug!("upload_file: ignoring field {:?}", other),
        }
    }

    let (name, content_type, data) =
        file.ok_or_else(|| ApiError::bad_request("No files were uploaded"))?;
    let mime_type = content_type
        .and_then(|c| c.parse::<mime::Mime>().ok())
        .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream());
    debug!("upload_file: {} ({}, {} bytes)", name, mime_type, data.len());
    let upload = NewUpload {
        name,
        mime_type,
        parent: parent.map(DriveId::from),
        data,
    };
    Ok(Json(state.drive.upload(&user, upload).await?))
}

/// `DELETE /api/drive/files/:file_id`
#[instrument(skip(state, user))]
pub async fn delete_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.drive.delete(&user, &DriveId::from(file_id)).await?;
    Ok(success())
}

/// `POST /api/drive/folders` with `{name, parentId?}`
#[instrument(skip(state, user))]
pub async fn create_folder(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<CreateFolderBody>,
) -> Result<Json<DriveEntry>, ApiError> {
    let name = non_blank(body.name).ok_or_else(|| ApiError::bad_request("Folder name is required"))?;
    let parent = non_blank(body.parent_id).map(DriveId::from);
    let folder = state
        .drive
        .create_folder(&user, name.trim(), parent.as_ref())
        .await?;
    Ok(Json(folder))
}

/// `PATCH /api/drive/files/:file_id/move` with `{targetFolderId, removeFromParents}`
#[instrument(skip(state, user))]
pub async fn move_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
    JsonBody(body): JsonBody<MoveBody>,
) -> Result<Json<DriveEntry>, ApiError> {
    let target = non_blank(body.target_folder_id)
        .map(DriveId::from)
        .ok_or_else(|| ApiError::bad_request("Target folder ID is required"))?;
    let moved = state
        .drive
        .move_entry(
            &user,
            &DriveId::from(file_id),
            &target,
            body.remove_from_parents.unwrap_or(true),
        )
        .await?;
    Ok(Json(moved))
}

/// `GET /api/drive/search?q=`
#[instrument(skip(state, user))]
pub async fn search(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<DriveEntry>>, ApiError> {
    let q = non_blank(query.q).ok_or_else(|| ApiError::bad_request("Search query is required"))?;
    Ok(Json(state.drive.search(&user, q.trim()).await?))
}

/// `POST /api/drive/share` with `{fileId, emailAddress, role?, sendNotification?}`
#[instrument(skip(state, user))]
pub async fn share_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(mut body): JsonBody<ShareBody>,
) -> Result<Json<Permission>, ApiError> {
    let file_id =
        non_blank(body.file_id.take()).ok_or_else(|| ApiError::bad_request("File ID is required"))?;
    share(&state, &user, file_id, body).await
}

/// `POST /api/drive/permissions/:file_id`, the same grant with the id in the path.
#[instrument(skip(state, user))]
pub async fn share_file_by_path(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
    JsonBody(body): JsonBody<ShareBody>,
) -> Result<Json<Permission>, ApiError> {
    share(&state, &user, file_id, body).await
}

async fn share(
    state: &AppState,
    user: &crate::auth::GoogleUser,
    file_id: String,
    body: ShareBody,
) -> Result<Json<Permission>, ApiError> {
    let email_address = non_blank(body.email_address)
        .ok_or_else(|| ApiError::bad_request("Email address is required"))?;
    let role = match non_blank(body.role) {
        Some(role) => role
            .parse::<Role>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => Role::default(),
    };
    let request = ShareRequest {
        file_id: DriveId::from(file_id),
        email_address: email_address.trim().to_string(),
        role,
        send_notification: body.send_notification.unwrap_or(true),
    };
    Ok(Json(state.drive.share(user, &request).await?))
}

/// `GET /api/drive/permissions/:file_id`
#[instrument(skip(state, user))]
pub async fn list_permissions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    Ok(Json(
        state
            .drive
            .permissions(&user, &DriveId::from(file_id))
            .await?,
    ))
}

/// `DELETE /api/drive/permissions/:file_id/:permission_id`
#[instrument(skip(state, user))]
pub async fn remove_permission(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((file_id, permission_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .drive
        .remove_permission(&user, &DriveId::from(file_id), &permission_id)
        .await?;
    Ok(success())
}

/// `GET /api/drive/storage`
#[instrument(skip(state, user))]
pub async fn storage(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<StorageReport>, ApiError> {
    let quota = state.drive.storage_quota(&user).await?;
    Ok(Json(quota.into()))
}
