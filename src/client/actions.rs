use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::client::hooks::{FilesHook, SharingHook};
use crate::client::source::{download_path, ClientResult};
use crate::client::DataClient;
use crate::google_drive::{DriveEntry, DriveId, EntryKind, Permission, Role, ShareRequest};

/// Everything a file row or card can ask the coordinator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileAction {
    Preview,
    OpenFolder,
    Delete,
    Move,
    Share,
    Download,
}

impl FileAction {
    pub const ALL: [FileAction; 6] = [
        FileAction::Preview,
        FileAction::OpenFolder,
        FileAction::Delete,
        FileAction::Move,
        FileAction::Share,
        FileAction::Download,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Preview => "preview",
            FileAction::OpenFolder => "open-folder",
            FileAction::Delete => "delete",
            FileAction::Move => "move",
            FileAction::Share => "share",
            FileAction::Download => "download",
        }
    }

    /// Folders open, everything else previews.
    pub fn for_double_click(entry: &DriveEntry) -> FileAction {
        match entry.kind {
            EntryKind::Folder => FileAction::OpenFolder,
            EntryKind::File => FileAction::Preview,
        }
    }
}

impl Display for FileAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown file action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for FileAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// The one callback leaf components are handed.
pub trait ActionHandler {
    fn on_action(&mut self, action: FileAction, entry: &DriveEntry);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    Preview,
    Delete,
    Move,
    Share,
    CreateFolder,
    Upload,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub file_name: String,
}

/// Owns what the file browser shows: current folder, selection, open modal,
/// view mode and pending downloads.
#[derive(Debug, Default)]
pub struct FileManager {
    /// builds download links; without one they are same-origin paths
    client: Option<DataClient>,
    current_folder: Option<DriveId>,
    selected: Option<DriveEntry>,
    modal: Option<Modal>,
    view_mode: ViewMode,
    downloads: VecDeque<DownloadRequest>,
}

impl FileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_client(client: DataClient) -> Self {
        FileManager {
            client: Some(client),
            ..Default::default()
        }
    }

    pub fn current_folder(&self) -> Option<&DriveId> {
        self.current_folder.as_ref()
    }

    pub fn selected(&self) -> Option<&DriveEntry> {
        self.selected.as_ref()
    }

    pub fn modal(&self) -> Option<Modal> {
        self.modal
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
    }

    /// `None` (or the root alias) goes to the top folder.
    pub fn navigate_to(&mut self, folder: Option<DriveId>) {
        debug!("navigate to {:?}", folder);
        self.current_folder = folder.filter(|f| !f.is_root());
        self.selected = None;
        self.modal = None;
    }

    pub fn navigate_home(&mut self) {
        self.navigate_to(None);
    }

    /// Opens a modal that is not tied to an entry.
    pub fn open_modal(&mut self, modal: Modal) {
        self.modal = Some(modal);
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
        self.selected = None;
    }

    /// Hands the queued downloads to whoever starts them.
    pub fn take_downloads(&mut self) -> Vec<DownloadRequest> {
        self.downloads.drain(..).collect()
    }

    fn select(&mut self, entry: &DriveEntry, modal: Modal) {
        self.selected = Some(entry.clone());
        self.modal = Some(modal);
    }

    /// Deletes the selected entry and closes the modal on success.
    pub async fn confirm_delete(&mut self, files: &FilesHook) -> ClientResult<()> {
        let Some(entry) = self.selected.clone() else {
            return Ok(());
        };
        files.delete_file(&entry).await?;
        self.close_modal();
        Ok(())
    }

    pub async fn confirm_move(
        &mut self,
        files: &FilesHook,
        target: &DriveId,
        remove_from_parents: bool,
    ) -> ClientResult<Option<DriveEntry>> {
        let Some(entry) = self.selected.clone() else {
            return Ok(None);
        };
        let moved = files.move_file(&entry, target, remove_from_parents).await?;
        self.close_modal();
        Ok(Some(moved))
    }

    /// Shares the selected entry; the modal stays open so more people can be added.
    pub async fn confirm_share(
        &mut self,
        sharing: &SharingHook,
        email_address: &str,
        role: Role,
        send_notification: bool,
    ) -> ClientResult<Option<Permission>> {
        let Some(entry) = self.selected.as_ref() else {
            return Ok(None);
        };
        let request = ShareRequest {
            file_id: entry.id.clone(),
            email_address: email_address.to_string(),
            role,
            send_notification,
        };
        Ok(Some(sharing.share(&request).await?))
    }
}

impl ActionHandler for FileManager {
    fn on_action(&mut self, action: FileAction, entry: &DriveEntry) {
        trace!("{} on {}", action, entry.id);
        match action {
            FileAction::Preview => {
                if !entry.is_folder() {
                    self.select(entry, Modal::Preview);
                }
            }
            FileAction::OpenFolder => {
                if entry.is_folder() {
                    self.navigate_to(Some(entry.id.clone()));
                }
            }
            FileAction::Delete => self.select(entry, Modal::Delete),
            FileAction::Move => self.select(entry, Modal::Move),
            FileAction::Share => self.select(entry, Modal::Share),
            FileAction::Download => self.downloads.push_back(DownloadRequest {
                url: match &self.client {
                    Some(client) => client.source().download_url(&entry.id),
                    None => download_path(&entry.id),
                },
                file_name: entry.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google_drive::FOLDER_MIME_TYPE;

    fn folder() -> DriveEntry {
        DriveEntry::folder("folder-1", "Test Folder 1").with_parent("root")
    }

    fn document() -> DriveEntry {
        DriveEntry::new("document-1", "Test Document.docx", "text/plain").with_parent("folder-1")
    }

    #[test]
    fn names_round_trip_and_unknown_names_are_rejected() {
        for action in FileAction::ALL {
            assert_eq!(action.as_str().parse::<FileAction>().unwrap(), action);
        }
        assert_eq!(
            serde_json::to_string(&FileAction::OpenFolder).unwrap(),
            "\"open-folder\""
        );
        assert!("rename".parse::<FileAction>().is_err());
    }

    #[test]
    fn double_click_opens_folders_and_previews_files() {
        assert_eq!(FileAction::for_double_click(&folder()), FileAction::OpenFolder);
        assert_eq!(FileAction::for_double_click(&document()), FileAction::Preview);
        let almost = DriveEntry::new("x", "x", format!("{}.shortcut", FOLDER_MIME_TYPE));
        assert_eq!(FileAction::for_double_click(&almost), FileAction::Preview);
    }

    #[test]
    fn open_folder_navigates_only_into_folders() {
        let mut manager = FileManager::new();
        manager.on_action(FileAction::OpenFolder, &document());
        assert_eq!(manager.current_folder(), None);
        manager.on_action(FileAction::OpenFolder, &folder());
        assert_eq!(manager.current_folder(), Some(&DriveId::from("folder-1")));
        manager.navigate_home();
        assert_eq!(manager.current_folder(), None);
    }

    #[test]
    fn preview_of_a_folder_does_nothing() {
        let mut manager = FileManager::new();
        manager.on_action(FileAction::Preview, &folder());
        assert_eq!(manager.modal(), None);
        manager.on_action(FileAction::Preview, &document());
        assert_eq!(manager.modal(), Some(Modal::Preview));
        assert_eq!(manager.selected().map(|e| e.id.as_str()), Some("document-1"));
    }

    #[test]
    fn modal_actions_select_the_entry() {
        let mut manager = FileManager::new();
        for (action, modal) in [
            (FileAction::Delete, Modal::Delete),
            (FileAction::Move, Modal::Move),
            (FileAction::Share, Modal::Share),
        ] {
            manager.on_action(action, &document());
            assert_eq!(manager.modal(), Some(modal));
            manager.close_modal();
            assert!(manager.selected().is_none());
        }
    }

    #[test]
    fn download_queues_a_request() {
        let mut manager = FileManager::new();
        manager.on_action(FileAction::Download, &document());
        assert_eq!(
            manager.take_downloads(),
            vec![DownloadRequest {
                url: "/api/drive/files/document-1/download".to_string(),
                file_name: "Test Document.docx".to_string(),
            }]
        );
        assert!(manager.take_downloads().is_empty());
    }

    #[test]
    fn download_links_come_from_the_client_source() {
        let base = url::Url::parse("http://localhost:5000/").unwrap();
        let source = crate::client::HttpSource::new(base, None).unwrap();
        let client = DataClient::new(std::sync::Arc::new(source));
        let mut manager = FileManager::for_client(client);
        manager.on_action(FileAction::Download, &document());
        let downloads = manager.take_downloads();
        assert_eq!(
            downloads[0].url,
            "http://localhost:5000/api/drive/files/document-1/download"
        );
    }

    #[test]
    fn standalone_modals_and_view_mode() {
        let mut manager = FileManager::new();
        assert_eq!(manager.view_mode(), ViewMode::Grid);
        manager.set_view_mode(ViewMode::List);
        assert_eq!(manager.view_mode(), ViewMode::List);

        manager.open_modal(Modal::Upload);
        assert_eq!(manager.modal(), Some(Modal::Upload));
        assert!(manager.selected().is_none());
        manager.navigate_to(Some(DriveId::from("folder-1")));
        assert_eq!(manager.modal(), None);
        assert_eq!(manager.view_mode(), ViewMode::List);
    }
}
