mod common;

use std::sync::Arc;

use url::Url;

use common::{mock_drive, signed_in};
use drive_manager::client::{ActionHandler, DataClient, FileAction, FileManager, HttpSource, Modal};
use drive_manager::google_drive::{DriveId, MemoryDrive, Role, ShareRequest};
use drive_manager::server::router;

struct Running {
    drive: Arc<MemoryDrive>,
    client: DataClient,
    base: Url,
}

/// Serves the router on an ephemeral port and signs a client in.
async fn start() -> Running {
    let drive = mock_drive().await;
    let (state, session) = signed_in(drive.clone()).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    let base = Url::parse(&format!("http://{}", addr)).unwrap();
    let source = HttpSource::new(base.clone(), Some(&session)).unwrap();
    Running {
        drive,
        client: DataClient::new(Arc::new(source)),
        base,
    }
}

#[tokio::test]
async fn scenario_a_root_listing_excludes_nested_files() {
    let app = start().await;
    let listing = app.client.files(None).files().await;
    assert!(!listing.is_error, "{:?}", listing.error);
    let entries = listing.data.unwrap();
    assert!(entries.iter().any(|e| e.id.as_str() == "folder-1"));
    assert!(entries.iter().all(|e| e.id.as_str() != "document-1"));
    assert!(entries.iter().all(|e| e.has_parent(&DriveId::root())));
}

#[tokio::test]
async fn scenario_b_search_is_a_case_insensitive_substring_match() {
    let app = start().await;
    let found = app.client.search().search("document").await.data.unwrap();
    let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Test Document.docx"]);
}

#[tokio::test]
async fn scenario_c_sharing_adds_exactly_one_permission() {
    let app = start().await;
    let sharing = app.client.sharing();
    let file = DriveId::from("document-1");
    let before = sharing.permissions(&file).await.data.unwrap();

    let request = ShareRequest {
        file_id: file.clone(),
        email_address: "newuser@example.com".to_string(),
        role: Role::Reader,
        send_notification: true,
    };
    let granted = sharing.share(&request).await.unwrap();
    assert_eq!(granted.email_address.as_deref(), Some("newuser@example.com"));
    assert_eq!(granted.role, "reader");

    let after = sharing.permissions(&file).await.data.unwrap();
    assert_eq!(after.len(), before.len() + 1);
    let new: Vec<_> = after.iter().filter(|p| !before.contains(p)).collect();
    assert_eq!(new, vec![&granted]);
}

#[tokio::test]
async fn scenario_d_move_detaches_from_the_old_parent() {
    let app = start().await;
    let mut manager = FileManager::for_client(app.client.clone());
    let files = app.client.files(Some(DriveId::from("folder-1")));
    let listing = files.files().await.data.unwrap();
    let document = listing
        .iter()
        .find(|e| e.id.as_str() == "document-1")
        .unwrap()
        .clone();

    manager.on_action(FileAction::Move, &document);
    assert_eq!(manager.modal(), Some(Modal::Move));
    let moved = manager
        .confirm_move(&files, &DriveId::from("folder-2"), true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.parents, vec![DriveId::from("folder-2")]);
    assert_eq!(manager.modal(), None);

    let stored = app.drive.entry(&DriveId::from("document-1")).await.unwrap();
    assert!(!stored.has_parent(&DriveId::from("folder-1")));
    assert!(stored.has_parent(&DriveId::from("folder-2")));

    let old_folder = files.files().await.data.unwrap();
    assert!(old_folder.iter().all(|e| e.id.as_str() != "document-1"));

    manager.on_action(FileAction::Download, &moved);
    let download = manager.take_downloads().remove(0);
    assert_eq!(
        download.url,
        app.base.join("/api/drive/files/document-1/download").unwrap().as_str()
    );
    let body = reqwest::get(download.url.as_str()).await.unwrap();
    assert_eq!(body.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn breadcrumbs_over_http() {
    let app = start().await;
    let crumbs = app
        .client
        .breadcrumbs()
        .resolve(Some(&DriveId::from("folder-grandchild")))
        .await;
    let names: Vec<&str> = crumbs.trail.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Parent Folder", "Child Folder", "Grandchild Folder"]);
    assert!(crumbs.notice.is_none());
}

#[tokio::test]
async fn client_sees_server_status_and_message() {
    let app = start().await;
    let missing = app.client.files(None).file(&DriveId::from("nope")).await;
    assert!(missing.is_error);
    assert_eq!(missing.error.as_deref(), Some("File not found: nope (404)"));

    let storage = app.client.storage().storage().await.data.unwrap();
    assert_eq!(storage.formatted_limit, "15 GB");
}

#[tokio::test]
async fn logout_ends_the_session_for_the_client() {
    let app = start().await;
    let auth = app.client.auth();
    assert_eq!(auth.user().await.data.unwrap().name, "Test User");
    auth.logout().await.unwrap();
    assert!(app.client.cache().keys().await.is_empty());
    let after = app.client.files(None).files().await;
    assert!(after.is_error);
    assert_eq!(after.error.as_deref(), Some("Unauthorized (401)"));
}
