use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::AlertSlot;
use super::file_attributes::AttributeSnapshot;
use super::fs_summary::SummaryFilter;
use super::navigation::PagePath;
use crate::backend::model::AttributeMode;

/// Default number of entries listed by the file browser.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Sessions idle for longer than this are dropped.
const SESSION_IDLE_HOURS: i64 = 8;

/// Metadata server of the shared file system being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct MdsInfo {
    pub fs_name: String,
    pub host: String,
    pub architecture: String,
    pub mounted: bool,
}

/// Per-browser console state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    /// Managed server all pages talk to.
    pub server: String,
    pub fs_name: Option<String>,
    pub mount_point: Option<String>,
    /// Last SAM file system used by the file browser, per server.
    pub last_used_fs: HashMap<String, String>,
    pub mds: Option<MdsInfo>,
    /// Member host whose mount options are edited, `None` for the server.
    pub mount_options_host: Option<String>,

    pub current_dir: Option<String>,
    pub max_entries: usize,
    pub base_path_menu_clicked: bool,
    pub file_filter: Option<String>,

    pub summary_filter: SummaryFilter,
    pub recovery_point_dir: Option<String>,

    pub file_page_mode: AttributeMode,
    pub file_snapshot: Option<AttributeSnapshot>,

    pub path: PagePath,
    pub alert: AlertSlot,
    pub last_seen: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(id: Uuid, server: &str) -> Self {
        Self {
            id,
            server: server.to_string(),
            fs_name: None,
            mount_point: None,
            last_used_fs: HashMap::new(),
            mds: None,
            mount_options_host: None,
            current_dir: None,
            max_entries: DEFAULT_MAX_ENTRIES,
            base_path_menu_clicked: false,
            file_filter: None,
            summary_filter: SummaryFilter::All,
            recovery_point_dir: None,
            file_page_mode: AttributeMode::Archive,
            file_snapshot: None,
            path: PagePath::default(),
            alert: AlertSlot::default(),
            last_seen: Utc::now(),
        }
    }

    /// Make `name` the selected file system. Switching to another file system
    /// drops every cache scoped to the previous one.
    pub fn select_fs(&mut self, name: &str) {
        if self.fs_name.as_deref() == Some(name) {
            return;
        }
        self.fs_name = Some(name.to_string());
        self.mount_point = None;
        self.mds = None;
        self.mount_options_host = None;
        self.recovery_point_dir = None;
    }

    /// Switch the managed server, clearing everything tied to the old one.
    pub fn select_server(&mut self, server: &str) {
        if self.server == server {
            return;
        }
        self.server = server.to_string();
        self.fs_name = None;
        self.mount_point = None;
        self.mds = None;
        self.mount_options_host = None;
        self.current_dir = None;
        self.recovery_point_dir = None;
        self.file_snapshot = None;
        self.path.clear();
    }
}

/// Sessions keyed by the `session` cookie.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<SessionContext>>>>,
    default_server: String,
}

impl SessionStore {
    pub fn new(default_server: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_server: default_server.into(),
        }
    }

    /// Return the session for `id`, creating a new one when the id is
    /// missing or unknown. The boolean is true for new sessions.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Arc<Mutex<SessionContext>>, bool) {
        if let Some(id) = id
            && let Some(session) = self.sessions.read().await.get(&id)
        {
            return (session.clone(), false);
        }

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(SessionContext::new(id, &self.default_server)));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, session.clone());
        drop(sessions);

        self.purge_idle().await;
        tracing::debug!("Created session {}", id);
        (session, true)
    }

    pub async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn purge_idle(&self) {
        let cutoff = Utc::now() - Duration::hours(SESSION_IDLE_HOURS);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        // Sessions in use are locked and therefore not idle.
        sessions.retain(|_, s| match s.try_lock() {
            Ok(ctx) => ctx.last_seen >= cutoff,
            Err(_) => true,
        });
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::debug!("Purged {} idle sessions", purged);
        }
    }
}
