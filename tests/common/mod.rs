#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use drive_manager::auth::{GoogleUser, SessionStore};
use drive_manager::google_drive::{DriveEntry, MemoryDrive, Permission, StorageQuota};
use drive_manager::server::AppState;

pub const GB: u64 = 1024 * 1024 * 1024;

pub fn test_user() -> GoogleUser {
    GoogleUser::new(
        "test-user-id-123",
        "test.user@example.com",
        "Test User",
        "mock-access-token",
        chrono::Duration::hours(1),
    )
}

/// The folder tree the route and scenario tests share.
pub async fn mock_drive() -> Arc<MemoryDrive> {
    let drive = MemoryDrive::with_entries(vec![
        DriveEntry::folder("folder-1", "Test Folder 1").with_parent("root"),
        DriveEntry::folder("folder-2", "Test Folder 2").with_parent("root"),
        DriveEntry::new("document-1", "Test Document.docx", "text/plain")
            .with_size(12345)
            .with_parent("folder-1"),
        DriveEntry::new("image-1", "Test Image.jpg", "image/jpeg")
            .with_size(54321)
            .with_parent("folder-1"),
        DriveEntry::new("pdf-1", "Test PDF.pdf", "application/pdf")
            .with_size(98765)
            .with_parent("folder-2"),
        DriveEntry::folder("folder-parent", "Parent Folder").with_parent("root"),
        DriveEntry::folder("folder-child", "Child Folder").with_parent("folder-parent"),
        DriveEntry::folder("folder-grandchild", "Grandchild Folder").with_parent("folder-child"),
    ]);
    drive.set_content("document-1", "This is a test file content").await;
    drive
        .set_permissions(
            "document-1",
            vec![
                Permission {
                    id: "permission-1".to_string(),
                    grantee_type: "user".to_string(),
                    email_address: Some("user1@example.com".to_string()),
                    role: "reader".to_string(),
                },
                Permission {
                    id: "permission-2".to_string(),
                    grantee_type: "user".to_string(),
                    email_address: Some("user2@example.com".to_string()),
                    role: "writer".to_string(),
                },
            ],
        )
        .await;
    drive
        .set_quota(StorageQuota {
            usage: GB,
            limit: Some(15 * GB),
            usage_in_drive: GB / 2,
            usage_in_trash: GB / 10,
        })
        .await;
    Arc::new(drive)
}

/// App state around `drive` and the signed cookie value of a live session.
pub async fn signed_in(drive: Arc<MemoryDrive>) -> (AppState, String) {
    let sessions = SessionStore::new("test-secret", Duration::from_secs(3600));
    let session = sessions.create(test_user()).await;
    (AppState::new(drive, sessions, None), session)
}
