//! File details page and the archive, release and stage attribute editor.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::messages::resource_string;
use super::session::SessionContext;
use super::{Console, Page, developer_bug, format_bytes};
use crate::backend::model::{AttributeMode, ChangeAttributesRequest, FileEntry, attr};
use crate::error::{SamFsError, codes};

/// Smallest partial release size, in kilobytes.
pub const MIN_PARTIAL_KB: u32 = 8;

/// Max partial size used when the file system does not set one.
pub const DEFAULT_MAX_PARTIAL_KB: u32 = 16;

/// Partial release size accepted by the file system, bounds inclusive.
pub fn is_valid_partial_size(size: i64, max_partial_kb: u32) -> bool {
    !(size < i64::from(MIN_PARTIAL_KB) || size > i64::from(max_partial_kb))
}

fn parse_mode(text: &str) -> Option<AttributeMode> {
    match text {
        "archive" => Some(AttributeMode::Archive),
        "release" => Some(AttributeMode::Release),
        "stage" => Some(AttributeMode::Stage),
        _ => None,
    }
}

fn mode_str(mode: AttributeMode) -> &'static str {
    match mode {
        AttributeMode::Archive => "archive",
        AttributeMode::Release => "release",
        AttributeMode::Stage => "stage",
    }
}

/// Attributes of the displayed file, kept in the session between the display
/// and the submit of the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSnapshot {
    pub path: String,
    pub is_dir: bool,
    pub archive: i32,
    pub release: i32,
    pub stage: i32,
    pub partial_size_kb: Option<u32>,
    pub max_partial_kb: u32,
}

impl AttributeSnapshot {
    pub fn option(&self, mode: AttributeMode) -> i32 {
        match mode {
            AttributeMode::Archive => self.archive,
            AttributeMode::Release => self.release,
            AttributeMode::Stage => self.stage,
        }
    }
}

/// Max partial size of the SAM file system holding `path`.
async fn max_partial_for(console: &Console, server: &str, path: &str) -> u32 {
    let file_systems = match console.backend().list_file_systems(server).await {
        Ok(list) => list,
        Err(e) => {
            debug!("No file systems to look up max partial: {}", e);
            return DEFAULT_MAX_PARTIAL_KB;
        }
    };
    file_systems
        .into_iter()
        .filter(|fs| {
            !fs.mount_point.is_empty()
                && (path == fs.mount_point
                    || path.starts_with(&format!("{}/", fs.mount_point.trim_end_matches('/'))))
        })
        .max_by_key(|fs| fs.mount_point.len())
        .and_then(|fs| fs.mount_properties.max_partial_kb)
        .unwrap_or(DEFAULT_MAX_PARTIAL_KB)
}

async fn load(
    console: &Console,
    server: &str,
    path: &str,
) -> Result<(FileEntry, AttributeSnapshot), SamFsError> {
    let entry = console
        .backend()
        .file_details(server, path)
        .await?
        .ok_or_else(SamFsError::not_found)?;
    let snapshot = AttributeSnapshot {
        path: entry.path.clone(),
        is_dir: entry.is_dir,
        archive: entry.attributes.archive,
        release: entry.attributes.release,
        stage: entry.attributes.stage,
        partial_size_kb: entry.attributes.partial_size_kb,
        max_partial_kb: max_partial_for(console, server, path).await,
    };
    Ok((entry, snapshot))
}

#[derive(Debug, Clone, Serialize)]
pub struct RadioOption {
    pub value: String,
    pub label: String,
    pub checked: bool,
}

fn radio(value: impl ToString, key: &str, checked: bool) -> RadioOption {
    RadioOption {
        value: value.to_string(),
        label: resource_string(key, &[]),
        checked,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeTab {
    pub value: &'static str,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDetailsView {
    pub path: String,
    pub name: String,
    pub found: bool,
    pub is_dir: bool,
    pub size_text: String,
    pub modified: String,
    pub online_text: String,
    pub copies: u32,
    pub tabs: Vec<ModeTab>,
    pub mode: &'static str,
    pub existing_option: String,
    pub options: Vec<RadioOption>,
    /// Second level choices of the release and stage modes.
    pub sub_options: Vec<RadioOption>,
    pub partial_checked: bool,
    pub partial_size: String,
    pub partial_help: String,
}

fn tabs(current: AttributeMode) -> Vec<ModeTab> {
    [AttributeMode::Archive, AttributeMode::Release, AttributeMode::Stage]
        .into_iter()
        .map(|mode| ModeTab {
            value: mode_str(mode),
            label: resource_string(&format!("file.mode.{}", mode_str(mode)), &[]),
            selected: mode == current,
        })
        .collect()
}

impl FileDetailsView {
    fn empty(path: &str, mode: AttributeMode) -> Self {
        Self {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            found: false,
            is_dir: false,
            size_text: String::new(),
            modified: String::new(),
            online_text: String::new(),
            copies: 0,
            tabs: tabs(mode),
            mode: mode_str(mode),
            existing_option: String::new(),
            options: Vec::new(),
            sub_options: Vec::new(),
            partial_checked: false,
            partial_size: String::new(),
            partial_help: String::new(),
        }
    }

    fn new(entry: &FileEntry, snap: &AttributeSnapshot, mode: AttributeMode) -> Self {
        let mut view = Self::empty(&entry.path, mode);
        view.name = entry.name().to_string();
        view.found = true;
        view.is_dir = entry.is_dir;
        view.size_text = if entry.is_dir {
            String::new()
        } else {
            format_bytes(entry.size)
        };
        view.modified = entry.modified.format("%Y-%m-%d %H:%M").to_string();
        view.online_text = resource_string(
            if entry.online {
                "file.online"
            } else {
                "file.offline"
            },
            &[],
        );
        view.copies = entry.copies;

        let current = snap.option(mode);
        view.existing_option = current.to_string();
        match mode {
            AttributeMode::Archive => {
                view.options = vec![
                    radio(
                        attr::ARCHIVE_DEFAULT,
                        "file.option.archive.default",
                        current != attr::ARCHIVE_NEVER,
                    ),
                    radio(
                        attr::ARCHIVE_NEVER,
                        "file.option.archive.never",
                        current == attr::ARCHIVE_NEVER,
                    ),
                ];
            }
            AttributeMode::Release => {
                let base = current & !attr::RELEASE_PARTIAL;
                let never = base == attr::RELEASE_NEVER;
                view.options = vec![
                    radio("release", "file.option.release", !never),
                    radio("never", "file.option.release.never", never),
                ];
                view.sub_options = vec![
                    radio(
                        attr::RELEASE_DEFAULT,
                        "file.option.release.default",
                        base != attr::RELEASE_ALWAYS,
                    ),
                    radio(
                        attr::RELEASE_ALWAYS,
                        "file.option.release.always",
                        base == attr::RELEASE_ALWAYS,
                    ),
                ];
                view.partial_checked = current & attr::RELEASE_PARTIAL != 0;
                view.partial_size = snap
                    .partial_size_kb
                    .map(|kb| kb.to_string())
                    .unwrap_or_default();
                view.partial_help = resource_string(
                    "file.partial.help",
                    &[&MIN_PARTIAL_KB.to_string(), &snap.max_partial_kb.to_string()],
                );
            }
            AttributeMode::Stage => {
                let never = current == attr::STAGE_NEVER;
                view.options = vec![
                    radio("stage", "file.option.stage", !never),
                    radio("never", "file.option.stage.never", never),
                ];
                view.sub_options = vec![
                    radio(
                        attr::STAGE_DEFAULT,
                        "file.option.stage.default",
                        current != attr::STAGE_ASSOCIATIVE,
                    ),
                    radio(
                        attr::STAGE_ASSOCIATIVE,
                        "file.option.stage.associative",
                        current == attr::STAGE_ASSOCIATIVE,
                    ),
                ];
            }
        }
        view
    }
}

pub async fn display(console: &Console, session: &mut SessionContext, path: &str) -> FileDetailsView {
    let server = session.server.clone();
    let mode = session.file_page_mode;
    match load(console, &server, path).await {
        Ok((entry, snapshot)) => {
            let view = FileDetailsView::new(&entry, &snapshot, mode);
            session.file_snapshot = Some(snapshot);
            view
        }
        Err(e) => {
            session.file_snapshot = None;
            session.alert.set_backend_error(
                &resource_string("file.details.error", &[path]),
                &e,
                &server,
            );
            FileDetailsView::empty(path, mode)
        }
    }
}

/// Posted editor fields. `option` and `sub_option` carry the radio values,
/// `existing_option` the attribute value the page was rendered with.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttributesForm {
    pub existing_option: String,
    pub option: String,
    pub sub_option: String,
    pub partial: Option<String>,
    pub partial_size: String,
    pub recursive: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FileAttributesAction {
    ChangeMode { mode: String },
    Save(AttributesForm),
    Back,
}

fn mode_messages(mode: AttributeMode) -> (&'static str, &'static str) {
    match mode {
        AttributeMode::Archive => ("file.archive.done", "file.archive.error"),
        AttributeMode::Release => ("file.release.done", "file.release.error"),
        AttributeMode::Stage => ("file.stage.done", "file.stage.error"),
    }
}

pub async fn submit(
    console: &Console,
    session: &mut SessionContext,
    path: &str,
    action: FileAttributesAction,
) -> Page {
    let current = Page::FileDetails(path.to_string());
    let form = match action {
        FileAttributesAction::ChangeMode { mode } => {
            match parse_mode(&mode) {
                Some(mode) => session.file_page_mode = mode,
                None => developer_bug(
                    session,
                    &resource_string("file.details.error", &[path]),
                    "attribute mode",
                    &mode,
                ),
            }
            return current;
        }
        FileAttributesAction::Back => return Page::FileBrowser,
        FileAttributesAction::Save(form) => form,
    };

    let mode = session.file_page_mode;
    let (done_key, error_key) = mode_messages(mode);
    let summary = resource_string(error_key, &[path]);
    let server = session.server.clone();

    let snapshot = match session.file_snapshot.clone().filter(|s| s.path == path) {
        Some(snapshot) => snapshot,
        None => match load(console, &server, path).await {
            Ok((_, snapshot)) => snapshot,
            Err(e) => {
                session.alert.set_backend_error(&summary, &e, &server);
                return current;
            }
        },
    };

    let Ok(existing_option) = form.existing_option.trim().parse::<i32>() else {
        developer_bug(session, &summary, "existing option", &form.existing_option);
        return current;
    };

    let mut partial_size_kb = None;
    let new_option = match mode {
        AttributeMode::Archive => match form.option.parse::<i32>() {
            Ok(v) => v,
            Err(_) => {
                developer_bug(session, &summary, "archive option", &form.option);
                return current;
            }
        },
        AttributeMode::Release | AttributeMode::Stage if form.option == "never" => {
            if mode == AttributeMode::Release {
                attr::RELEASE_NEVER
            } else {
                attr::STAGE_NEVER
            }
        }
        AttributeMode::Release | AttributeMode::Stage => match form.sub_option.parse::<i32>() {
            Ok(v) => v,
            Err(_) => {
                developer_bug(session, &summary, "sub option", &form.sub_option);
                return current;
            }
        },
    };

    let new_option = if mode == AttributeMode::Release && form.partial.is_some() {
        let size = form.partial_size.trim().parse::<i64>().unwrap_or(-1);
        if !is_valid_partial_size(size, snapshot.max_partial_kb) {
            session.alert.set_error(
                &summary,
                codes::INVALID_INPUT,
                Some(&resource_string(
                    "file.partial.invalid",
                    &[&MIN_PARTIAL_KB.to_string(), &snapshot.max_partial_kb.to_string()],
                )),
                &server,
            );
            return current;
        }
        partial_size_kb = u32::try_from(size).ok();
        new_option | attr::RELEASE_PARTIAL
    } else {
        new_option
    };

    let request = ChangeAttributesRequest {
        mode,
        path: path.to_string(),
        new_option,
        existing_option,
        recursive: snapshot.is_dir && form.recursive.is_some(),
        partial_size_kb,
    };
    info!(
        "Changing {} attributes of {} to {}",
        mode_str(mode),
        path,
        new_option
    );

    match console.backend().change_file_attributes(&server, &request).await {
        Ok(()) => {
            session.alert.set_info(
                &resource_string("success.summary", &[]),
                &resource_string(done_key, &[path]),
            );
            session.file_snapshot = None;
        }
        Err(e) if matches!(e.code(), codes::RELEASE_FILES_FAILED | codes::ARCHIVE_FILES_FAILED) => {
            debug!("Suppressing detail of {}", e);
            session.alert.set_error(&summary, e.code(), None, &server);
        }
        Err(e) => session.alert.set_backend_error(&summary, &e, &server),
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SamQfsBackend;
    use crate::backend::local::tests::SERVER;
    use crate::console::AlertKind;
    use crate::console::tests::{demo_console, demo_session};

    const README: &str = "/sam1/readme.txt";

    fn save(option: &str, sub_option: &str) -> FileAttributesAction {
        FileAttributesAction::Save(AttributesForm {
            existing_option: "0".into(),
            option: option.into(),
            sub_option: sub_option.into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_partial_size_bounds() {
        assert!(!is_valid_partial_size(7, 16));
        assert!(is_valid_partial_size(8, 16));
        assert!(is_valid_partial_size(16, 16));
        assert!(!is_valid_partial_size(17, 16));
        assert!(!is_valid_partial_size(-1, 16));
    }

    #[tokio::test]
    async fn test_display_caches_snapshot() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        session.file_page_mode = AttributeMode::Release;

        let view = display(&console, &mut session, README).await;
        assert!(view.found);
        assert_eq!(view.mode, "release");
        assert_eq!(view.existing_option, "0");
        assert!(view.options[0].checked);
        assert!(view.sub_options[0].checked);

        let snap = session.file_snapshot.clone().unwrap();
        assert_eq!(snap.path, README);
        assert_eq!(snap.max_partial_kb, 16);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "/sam1/nothing").await;
        assert!(!view.found);
        assert!(session.file_snapshot.is_none());
        assert_eq!(session.alert.take().unwrap().code, Some(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_archive_never() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        display(&console, &mut session, README).await;

        let page = submit(&console, &mut session, README, save("1", "")).await;
        assert_eq!(page, Page::FileDetails(README.into()));
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
        let entry = backend.file_details(SERVER, README).await.unwrap().unwrap();
        assert_eq!(entry.attributes.archive, attr::ARCHIVE_NEVER);
    }

    #[tokio::test]
    async fn test_archive_failure_hides_backend_detail() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let path = "/sam1/images/scan-0001.jpg";
        display(&console, &mut session, path).await;

        submit(&console, &mut session, path, save("1", "")).await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.code, Some(codes::ARCHIVE_FILES_FAILED));
        assert!(alert.detail.is_empty());
    }

    #[tokio::test]
    async fn test_developer_bug_on_existing_option() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        submit(
            &console,
            &mut session,
            README,
            FileAttributesAction::Save(AttributesForm {
                existing_option: "abc".into(),
                option: "1".into(),
                ..Default::default()
            }),
        )
        .await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.code, Some(codes::INVALID_INPUT));
        assert_eq!(
            alert.detail,
            vec![resource_string(
                "error.developer_bug",
                &["existing option", "abc"]
            )]
        );
    }

    #[tokio::test]
    async fn test_partial_release() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        session.file_page_mode = AttributeMode::Release;
        let path = "/sam1/images/scan-0002.jpg";
        display(&console, &mut session, path).await;

        let form = |size: &str| {
            FileAttributesAction::Save(AttributesForm {
                existing_option: "0".into(),
                option: "release".into(),
                sub_option: attr::RELEASE_DEFAULT.to_string(),
                partial: Some("on".into()),
                partial_size: size.into(),
                recursive: None,
            })
        };

        submit(&console, &mut session, path, form("32")).await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.code, Some(codes::INVALID_INPUT));

        submit(&console, &mut session, path, form("16")).await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
        let entry = backend.file_details(SERVER, path).await.unwrap().unwrap();
        assert_eq!(entry.attributes.release, attr::RELEASE_PARTIAL);
        assert_eq!(entry.attributes.partial_size_kb, Some(16));
    }

    #[tokio::test]
    async fn test_stage_never_and_mode_switch() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();

        submit(
            &console,
            &mut session,
            README,
            FileAttributesAction::ChangeMode {
                mode: "stage".into(),
            },
        )
        .await;
        assert_eq!(session.file_page_mode, AttributeMode::Stage);

        submit(&console, &mut session, README, save("never", "")).await;
        let entry = backend.file_details(SERVER, README).await.unwrap().unwrap();
        assert_eq!(entry.attributes.stage, attr::STAGE_NEVER);

        submit(
            &console,
            &mut session,
            README,
            FileAttributesAction::ChangeMode {
                mode: "delete".into(),
            },
        )
        .await;
        assert_eq!(session.file_page_mode, AttributeMode::Stage);
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Warning);
    }
}
