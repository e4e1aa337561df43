//! In-memory UI state. Owned by whoever drives the client; nothing here is
//! persisted or derived from server data.

use crate::db::models::MediaType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Feed,
    Following,
    Bookmarks,
    Communities,
    Projects,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub url: String,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    selected_post: Option<String>,
    uploaded_files: Vec<UploadedFile>,
    search_query: String,
    active_tab: Tab,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_post(&self) -> Option<&str> {
        self.selected_post.as_deref()
    }

    pub fn select_post(&mut self, post_id: impl Into<String>) {
        self.selected_post = Some(post_id.into());
    }

    pub fn clear_selected_post(&mut self) {
        self.selected_post = None;
    }

    pub fn uploaded_files(&self) -> &[UploadedFile] {
        &self.uploaded_files
    }

    pub fn add_uploaded_file(&mut self, file: UploadedFile) {
        self.uploaded_files.push(file);
    }

    /// Drop a pending upload by url. Returns whether anything was removed.
    pub fn remove_uploaded_file(&mut self, url: &str) -> bool {
        let before = self.uploaded_files.len();
        self.uploaded_files.retain(|f| f.url != url);
        self.uploaded_files.len() != before
    }

    pub fn clear_uploaded_files(&mut self) {
        self.uploaded_files.clear();
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn set_active_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
