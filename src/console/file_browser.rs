//! File browser over the directories of the SAM file systems.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::messages::resource_string;
use super::session::SessionContext;
use super::{Console, Page, format_bytes};
use crate::backend::model::{AttributeMode, FileEntry};
use crate::error::codes;

/// Strip trailing slashes. The root directory and empty input both become
/// `/`.
pub fn remove_trailing_slashes(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parent_of(dir: &str) -> Option<String> {
    if dir == "/" {
        return None;
    }
    match dir.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(i) => Some(dir[..i].to_string()),
        None => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileRow {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size_text: String,
    pub modified: String,
    pub online_text: String,
    pub copies: u32,
}

impl FileRow {
    fn new(entry: &FileEntry) -> Self {
        Self {
            name: entry.name().to_string(),
            path: entry.path.clone(),
            is_dir: entry.is_dir,
            size_text: if entry.is_dir {
                String::new()
            } else {
                format_bytes(entry.size)
            },
            modified: entry.modified.format("%Y-%m-%d %H:%M").to_string(),
            online_text: if entry.is_dir {
                String::new()
            } else if entry.online {
                resource_string("file.online", &[])
            } else {
                resource_string("file.offline", &[])
            },
            copies: entry.copies,
        }
    }

    pub fn details_url(&self) -> String {
        Page::FileDetails(self.path.clone()).url()
    }
}

/// Entry of the base path menu: the mount point of a SAM file system.
#[derive(Debug, Clone, Serialize)]
pub struct BasePath {
    pub fs_name: String,
    pub mount_point: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileBrowserView {
    pub server: String,
    pub current_dir: String,
    pub parent_dir: Option<String>,
    pub rows: Vec<FileRow>,
    pub total: usize,
    pub truncated_text: String,
    pub max_entries: usize,
    pub filter: String,
    pub base_paths: Vec<BasePath>,
}

/// Directory shown when the session has none: the mount point of the file
/// system last browsed on this server, else `/`.
async fn default_dir(console: &Console, session: &SessionContext) -> String {
    let Some(fs_name) = session.last_used_fs.get(&session.server) else {
        return "/".to_string();
    };
    match console.backend().get_file_system(&session.server, fs_name).await {
        Ok(Some(fs)) => fs.mount_point,
        _ => "/".to_string(),
    }
}

pub async fn display(console: &Console, session: &mut SessionContext) -> FileBrowserView {
    let server = session.server.clone();
    let dir = match &session.current_dir {
        Some(dir) => dir.clone(),
        None => {
            let dir = default_dir(console, session).await;
            session.current_dir = Some(dir.clone());
            dir
        }
    };

    let mut view = FileBrowserView {
        server: server.clone(),
        current_dir: dir.clone(),
        parent_dir: parent_of(&dir),
        rows: Vec::new(),
        total: 0,
        truncated_text: String::new(),
        max_entries: session.max_entries,
        filter: session.file_filter.clone().unwrap_or_default(),
        base_paths: Vec::new(),
    };

    match console.backend().list_file_systems(&server).await {
        Ok(list) => {
            view.base_paths = list
                .into_iter()
                .filter(|fs| fs.state.is_mounted())
                .map(|fs| BasePath {
                    selected: session.base_path_menu_clicked
                        && session.last_used_fs.get(&server) == Some(&fs.name),
                    fs_name: fs.name,
                    mount_point: fs.mount_point,
                })
                .collect()
        }
        Err(e) => debug!("No file systems for the base path menu: {}", e),
    }

    match console
        .backend()
        .list_directory(&server, &dir, session.max_entries, session.file_filter.as_deref())
        .await
    {
        Ok(listing) => {
            if listing.truncated() {
                view.truncated_text = resource_string(
                    "file.browser.truncated",
                    &[&listing.entries.len().to_string(), &listing.total.to_string()],
                );
            }
            view.total = listing.total;
            view.rows = listing.entries.iter().map(FileRow::new).collect();
        }
        Err(e) => session.alert.set_backend_error(
            &resource_string("file.browser.error", &[&dir]),
            &e,
            &server,
        ),
    }
    view
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FileBrowserAction {
    ChangeDir {
        dir: String,
    },
    Up,
    /// Jump to the mount point of a file system from the base path menu.
    SelectBase {
        fs: String,
    },
    SetMaxEntries {
        max_entries: String,
    },
    Filter {
        #[serde(default)]
        filter: String,
    },
    Details {
        path: String,
    },
}

pub async fn submit(
    console: &Console,
    session: &mut SessionContext,
    action: FileBrowserAction,
) -> Page {
    debug!("File browser action {:?}", action);
    let server = session.server.clone();
    match action {
        FileBrowserAction::ChangeDir { dir } => {
            session.current_dir = Some(remove_trailing_slashes(&dir));
            session.base_path_menu_clicked = false;
        }
        FileBrowserAction::Up => {
            let current = session.current_dir.clone().unwrap_or_else(|| "/".into());
            session.current_dir = Some(parent_of(&current).unwrap_or(current));
            session.base_path_menu_clicked = false;
        }
        FileBrowserAction::SelectBase { fs } => match console.require_fs(&server, &fs).await {
            Ok(found) => {
                session.last_used_fs.insert(server, fs);
                session.current_dir = Some(found.mount_point);
                session.base_path_menu_clicked = true;
            }
            Err(e) => session.alert.set_backend_error(
                &resource_string("file.browser.error", &[&fs]),
                &e,
                &server,
            ),
        },
        FileBrowserAction::SetMaxEntries { max_entries } => {
            match max_entries.trim().parse::<usize>() {
                Ok(n) if n > 0 => session.max_entries = n,
                _ => session.alert.set_error(
                    &resource_string("file.browser.max_entries", &[]),
                    codes::INVALID_ENTRIES,
                    Some(&resource_string("error.-3333", &[])),
                    &server,
                ),
            }
        }
        FileBrowserAction::Filter { filter } => {
            let filter = filter.trim();
            session.file_filter = (!filter.is_empty()).then(|| filter.to_string());
        }
        FileBrowserAction::Details { path } => {
            session.file_page_mode = AttributeMode::Archive;
            session.file_snapshot = None;
            return Page::FileDetails(path);
        }
    }
    Page::FileBrowser
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::tests::SERVER;
    use crate::console::AlertKind;
    use crate::console::tests::{demo_console, demo_session};

    #[test]
    fn test_remove_trailing_slashes() {
        assert_eq!(remove_trailing_slashes("/a/b///"), "/a/b");
        assert_eq!(remove_trailing_slashes("/"), "/");
        assert_eq!(remove_trailing_slashes("///"), "/");
        assert_eq!(remove_trailing_slashes(""), "/");
        assert_eq!(remove_trailing_slashes(" /sam1 "), "/sam1");
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/"), None);
        assert_eq!(parent_of("/sam1").as_deref(), Some("/"));
        assert_eq!(parent_of("/sam1/images").as_deref(), Some("/sam1"));
    }

    #[tokio::test]
    async fn test_default_dir_uses_last_fs() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        session.last_used_fs.insert(SERVER.into(), "samfs1".into());

        let view = display(&console, &mut session).await;
        assert_eq!(view.current_dir, "/sam1");
        assert_eq!(view.parent_dir.as_deref(), Some("/"));
        assert!(view.rows[0].is_dir);
        assert!(view.rows.iter().any(|r| r.name == "readme.txt"));
    }

    #[tokio::test]
    async fn test_default_dir_falls_back_to_root() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        display(&console, &mut session).await;
        assert_eq!(session.current_dir.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_invalid_max_entries_keeps_old_value() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        session.max_entries = 50;

        submit(
            &console,
            &mut session,
            FileBrowserAction::SetMaxEntries {
                max_entries: "lots".into(),
            },
        )
        .await;
        assert_eq!(session.max_entries, 50);
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.code, Some(codes::INVALID_ENTRIES));
        assert_eq!(alert.detail, vec![resource_string("error.-3333", &[])]);

        submit(
            &console,
            &mut session,
            FileBrowserAction::SetMaxEntries {
                max_entries: "1".into(),
            },
        )
        .await;
        assert_eq!(session.max_entries, 1);
        session.current_dir = Some("/sam1".into());
        let view = display(&console, &mut session).await;
        assert_eq!(view.rows.len(), 1);
        assert!(!view.truncated_text.is_empty());
    }

    #[tokio::test]
    async fn test_navigation_actions() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();

        submit(
            &console,
            &mut session,
            FileBrowserAction::SelectBase {
                fs: "samfs1".into(),
            },
        )
        .await;
        assert!(session.base_path_menu_clicked);
        assert_eq!(session.current_dir.as_deref(), Some("/sam1"));

        submit(
            &console,
            &mut session,
            FileBrowserAction::ChangeDir {
                dir: "/sam1/images//".into(),
            },
        )
        .await;
        assert_eq!(session.current_dir.as_deref(), Some("/sam1/images"));
        assert!(!session.base_path_menu_clicked);

        submit(&console, &mut session, FileBrowserAction::Up).await;
        assert_eq!(session.current_dir.as_deref(), Some("/sam1"));

        submit(
            &console,
            &mut session,
            FileBrowserAction::Filter {
                filter: "scan".into(),
            },
        )
        .await;
        session.current_dir = Some("/sam1/images".into());
        let view = display(&console, &mut session).await;
        assert_eq!(view.rows.len(), 2);

        let page = submit(
            &console,
            &mut session,
            FileBrowserAction::Details {
                path: "/sam1/readme.txt".into(),
            },
        )
        .await;
        assert_eq!(page, Page::FileDetails("/sam1/readme.txt".into()));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        session.current_dir = Some("/nowhere".into());
        let view = display(&console, &mut session).await;
        assert!(view.rows.is_empty());
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Error);
    }
}
