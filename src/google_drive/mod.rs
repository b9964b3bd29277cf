pub use drive::GoogleDrive;
pub use drive_id::{DriveId, ROOT_ALIAS};
pub use entry::{DriveEntry, EntryKind, FOLDER_MIME_TYPE};
pub use memory::MemoryDrive;
pub use permission::{Permission, Role, ShareRequest};
pub use service::{ByteStream, DriveError, DriveResult, DriveService, FileContent, NewUpload};
pub use storage::{format_size, StorageQuota, StorageReport};

mod drive;
mod drive_id;
mod entry;
pub mod helpers;
mod memory;
mod permission;
mod service;
mod storage;
