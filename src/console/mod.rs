//! Page controllers of the console.
//!
//! Every page has a display function that re-reads backend state into a
//! view model and a submit function that runs one typed action, records an
//! alert in the session and returns the page to forward to.

pub mod add_member;
pub mod archive_policies;
pub mod file_attributes;
pub mod file_browser;
pub mod fs_details;
pub mod fs_summary;
pub mod messages;
pub mod mount_options;
pub mod navigation;
pub mod recovery_points;
pub mod session;
pub mod shared_fs;

use std::sync::Arc;

use serde::Serialize;

use crate::backend::SamQfsBackend;
use crate::backend::model::FileSystem;
use crate::error::{SamFsError, codes};
use crate::retry::{ExponentialBackoff, PollOutcome, poll_until};
use messages::resource_string;
use session::SessionContext;

/// Shared dependencies of the page controllers.
pub struct Console {
    backend: Arc<dyn SamQfsBackend>,
    backoff: ExponentialBackoff,
}

impl Console {
    pub fn new(backend: Arc<dyn SamQfsBackend>, backoff: ExponentialBackoff) -> Self {
        Self { backend, backoff }
    }

    pub fn backend(&self) -> &dyn SamQfsBackend {
        self.backend.as_ref()
    }

    /// Wait until `name` is (or is no longer) visible on `host`.
    pub async fn wait_for_fs(&self, host: &str, name: &str, present: bool) -> PollOutcome {
        poll_until(
            || async move {
                match self.backend.get_file_system(host, name).await {
                    Ok(fs) => Ok(fs.is_some() == present),
                    Err(e) if !present && e.code() == codes::NOT_FOUND => Ok(true),
                    Err(e) => Err(e),
                }
            },
            &self.backoff,
        )
        .await
    }

    /// Look up the file system a page operates on, `-1000` when it is gone.
    pub async fn require_fs(&self, server: &str, name: &str) -> Result<FileSystem, SamFsError> {
        self.backend
            .get_file_system(server, name)
            .await?
            .ok_or_else(SamFsError::not_found)
    }
}

/// Pages of the console. Each value carries what the page needs to be
/// addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Page {
    FsSummary,
    FsDetails(String),
    MountOptions(String),
    SharedFs(String),
    AddMember(String),
    FileBrowser,
    FileDetails(String),
    ArchivePolicies(String),
    RecoverySchedule(String),
    RecoveryPoints(String),
}

impl Page {
    pub fn url(&self) -> String {
        let enc = |s: &str| urlencoding::encode(s).into_owned();
        match self {
            Page::FsSummary => "/fs".to_string(),
            Page::FsDetails(fs) => format!("/fs/{}", enc(fs)),
            Page::MountOptions(fs) => format!("/fs/{}/mount-options", enc(fs)),
            Page::SharedFs(fs) => format!("/fs/{}/shared", enc(fs)),
            Page::AddMember(fs) => format!("/fs/{}/shared/add", enc(fs)),
            Page::FileBrowser => "/files".to_string(),
            Page::FileDetails(path) => format!("/files/details?path={}", enc(path)),
            Page::ArchivePolicies(fs) => format!("/fs/{}/policies", enc(fs)),
            Page::RecoverySchedule(fs) => format!("/fs/{}/schedule", enc(fs)),
            Page::RecoveryPoints(fs) => format!("/fs/{}/recovery-points", enc(fs)),
        }
    }

    pub fn title(&self) -> String {
        match self {
            Page::FsSummary => resource_string("page.fs_summary", &[]),
            Page::FsDetails(fs) => resource_string("page.fs_details", &[fs]),
            Page::MountOptions(fs) => resource_string("page.mount_options", &[fs]),
            Page::SharedFs(fs) => resource_string("page.shared_fs", &[fs]),
            Page::AddMember(fs) => resource_string("page.add_member", &[fs]),
            Page::FileBrowser => resource_string("page.file_browser", &[]),
            Page::FileDetails(path) => resource_string("page.file_details", &[path]),
            Page::ArchivePolicies(fs) => resource_string("page.archive_policies", &[fs]),
            Page::RecoverySchedule(fs) => resource_string("page.recovery_schedule", &[fs]),
            Page::RecoveryPoints(fs) => resource_string("page.recovery_points", &[fs]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Info,
    Warning,
    Error,
}

impl AlertKind {
    pub fn css_class(self) -> &'static str {
        match self {
            AlertKind::Info => "alert-info",
            AlertKind::Warning => "alert-warning",
            AlertKind::Error => "alert-error",
        }
    }
}

/// Message shown at the top of the next rendered page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub summary: String,
    pub detail: Vec<String>,
    pub code: Option<i32>,
}

impl Alert {
    fn mentions(&self, text: &str) -> bool {
        text.is_empty() || self.detail.iter().any(|line| line.contains(text))
    }
}

/// Pending alert of a session. Alerts raised by consecutive operations stack
/// instead of replacing each other.
#[derive(Debug, Clone, Default)]
pub struct AlertSlot {
    current: Option<Alert>,
}

impl AlertSlot {
    #[cfg(test)]
    pub fn peek(&self) -> Option<&Alert> {
        self.current.as_ref()
    }

    pub fn take(&mut self) -> Option<Alert> {
        self.current.take()
    }

    /// Report a failure. An earlier success turns the combined alert into a
    /// warning; an earlier failure keeps both details.
    pub fn set_error(&mut self, summary: &str, code: i32, detail: Option<&str>, server: &str) {
        let text = error_text(code, detail, server);
        let alert = match self.current.take() {
            Some(mut prev) if prev.kind != AlertKind::Error && !prev.detail.is_empty() => {
                prev.kind = AlertKind::Warning;
                prev.summary = resource_string("alert.partial", &[]);
                if !prev.mentions(&text) {
                    prev.detail.push(text);
                }
                prev.code = Some(code);
                prev
            }
            Some(mut prev) if prev.kind == AlertKind::Error && code != codes::SERVER_DOWN => {
                prev.summary = summary.to_string();
                if !prev.mentions(&text) {
                    prev.detail.insert(0, text);
                }
                prev.code = Some(code);
                prev
            }
            _ => Alert {
                kind: AlertKind::Error,
                summary: summary.to_string(),
                detail: non_empty(text),
                code: Some(code),
            },
        };
        self.current = Some(alert);
    }

    /// Report a success. Over an earlier failure the result is a warning.
    pub fn set_info(&mut self, summary: &str, detail: &str) {
        let alert = match self.current.take() {
            Some(mut prev) if prev.kind == AlertKind::Error => {
                prev.kind = AlertKind::Warning;
                prev.summary = resource_string("alert.partial", &[]);
                if !prev.mentions(detail) {
                    prev.detail.insert(0, detail.to_string());
                }
                prev
            }
            _ => Alert {
                kind: AlertKind::Info,
                summary: summary.to_string(),
                detail: non_empty(detail.to_string()),
                code: None,
            },
        };
        self.current = Some(alert);
    }

    /// Report a warning. Details of an earlier alert are kept.
    pub fn set_warning(&mut self, summary: &str, detail: &str) {
        let alert = match self.current.take() {
            Some(mut prev) if prev.kind != AlertKind::Error && !prev.detail.is_empty() => {
                prev.kind = AlertKind::Warning;
                prev.summary = summary.to_string();
                if !prev.mentions(detail) {
                    prev.detail.push(detail.to_string());
                }
                prev
            }
            Some(mut prev) if prev.kind == AlertKind::Error => {
                prev.kind = AlertKind::Warning;
                prev.summary = summary.to_string();
                if !prev.mentions(detail) {
                    prev.detail.insert(0, detail.to_string());
                }
                prev
            }
            _ => Alert {
                kind: AlertKind::Warning,
                summary: summary.to_string(),
                detail: non_empty(detail.to_string()),
                code: None,
            },
        };
        self.current = Some(alert);
    }

    /// Error alert for a backend failure, using the multi-host layout when
    /// several hosts are involved.
    pub fn set_backend_error(&mut self, summary: &str, err: &SamFsError, server: &str) {
        let detail = match err {
            SamFsError::MultiHost { .. } => Some(format_multi_host(err)),
            _ => err.detail(),
        };
        self.set_error(summary, err.code(), detail.as_deref(), server);
    }
}

/// Human readable size, binary units.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    const TIB: u64 = GIB * 1024;

    if bytes >= TIB {
        format!("{:.2} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_kb(kb: u64) -> String {
    format_bytes(kb.saturating_mul(1024))
}

/// Log a form value the page itself produced but that failed to parse, and
/// report it to the user.
pub fn developer_bug(session: &mut SessionContext, summary: &str, what: &str, value: &str) {
    tracing::error!("Unexpected {} '{}' submitted", what, value);
    let server = session.server.clone();
    session.alert.set_error(
        summary,
        codes::INVALID_INPUT,
        Some(&resource_string("error.developer_bug", &[what, value])),
        &server,
    );
}

fn non_empty(text: String) -> Vec<String> {
    if text.is_empty() { Vec::new() } else { vec![text] }
}

/// Detail line of an error alert.
///
/// Backend supplied messages are shown as is. Console sentinels in
/// `-3000..=-1000` carry no message and are looked up in the catalog.
/// Timeouts and network failures always use the catalog text.
pub fn error_text(code: i32, detail: Option<&str>, server: &str) -> String {
    match code {
        codes::CALL_TIMEOUT => return resource_string("error.-2801", &[server]),
        codes::NETWORK_DOWN => return resource_string("error.-2802", &[server]),
        _ => {}
    }
    if let Some(detail) = detail {
        return detail.to_string();
    }
    if (-3000..=-1000).contains(&code) {
        return resource_string(&format!("error.{}", code), &[server]);
    }
    String::new()
}

/// Detail of a multi-host failure: the overall message, then one
/// `host: message` line per failed host.
pub fn format_multi_host(err: &SamFsError) -> String {
    match err {
        SamFsError::MultiHost {
            message, failures, ..
        } => {
            let mut lines = vec![message.clone()];
            lines.extend(failures.iter().map(|f| {
                let text = f
                    .error
                    .detail()
                    .unwrap_or_else(|| error_text(f.error.code(), None, &f.host));
                format!("{}: {}", f.host, text)
            }));
            lines.join("\n")
        }
        other => other.to_string(),
    }
}

/// Info alert on success, error alert on failure. Returns whether the call
/// succeeded.
pub fn report(
    session: &mut SessionContext,
    result: Result<(), SamFsError>,
    done: &str,
    error_summary: &str,
) -> bool {
    match result {
        Ok(()) => {
            session
                .alert
                .set_info(&resource_string("success.summary", &[]), done);
            true
        }
        Err(e) => {
            let server = session.server.clone();
            session.alert.set_backend_error(error_summary, &e, &server);
            false
        }
    }
}

/// Where a file system delete leaves the user.
///
/// Partial successes (`MultiMsg`, `Warnings`, `MultiHost`) mean the file
/// system is gone, so the user goes back to the summary. Any other failure
/// keeps the user on `current`.
pub fn handle_delete_result(
    session: &mut SessionContext,
    result: Result<(), SamFsError>,
    fs_name: &str,
    current: Page,
) -> Page {
    let server = session.server.clone();
    match result {
        Ok(()) => {
            session.alert.set_info(
                &resource_string("success.summary", &[]),
                &resource_string("fs.delete.done", &[fs_name]),
            );
            Page::FsSummary
        }
        Err(e @ SamFsError::MultiHost { .. }) => {
            session
                .alert
                .set_backend_error(&resource_string("fs.delete.error", &[]), &e, &server);
            Page::FsSummary
        }
        Err(SamFsError::MultiMsg { code, messages }) => {
            session.alert.set_error(
                &resource_string("archiver.config.error", &[]),
                code,
                Some(&messages.join("\n")),
                &server,
            );
            Page::FsSummary
        }
        Err(SamFsError::Warnings { messages, .. }) => {
            session.alert.set_warning(
                &resource_string("archiver.config.warning", &[]),
                &messages.join("\n"),
            );
            Page::FsSummary
        }
        Err(e) => {
            session
                .alert
                .set_backend_error(&resource_string("fs.delete.error", &[]), &e, &server);
            current
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::backend::local::tests::{SERVER, demo_backend};
    use crate::error::HostFailure;
    use std::time::Duration;
    use uuid::Uuid;

    /// Console over the demo inventory with a fast poll.
    pub async fn demo_console() -> (Console, Arc<LocalBackend>) {
        let backend = demo_backend().await;
        let backoff = ExponentialBackoff::new(3).with_initial_delay(Duration::from_millis(1));
        (Console::new(backend.clone(), backoff), backend)
    }

    pub fn demo_session() -> SessionContext {
        SessionContext::new(Uuid::new_v4(), SERVER)
    }

    #[test]
    fn test_format_kb() {
        assert_eq!(format_kb(0), "0 B");
        assert_eq!(format_kb(1024), "1.00 MiB");
        assert_eq!(format_kb(20_971_520), "20.00 GiB");
    }

    #[test]
    fn test_error_on_info_becomes_warning() {
        let mut slot = AlertSlot::default();
        slot.set_info("Success", "mounted samfs1");
        slot.set_error("Failed", 5, Some("disk offline"), "srv");
        let alert = slot.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Warning);
        assert_eq!(alert.detail, vec!["mounted samfs1", "disk offline"]);
    }

    #[test]
    fn test_info_on_error_becomes_warning() {
        let mut slot = AlertSlot::default();
        slot.set_error("Failed", 5, Some("disk offline"), "srv");
        slot.set_info("Success", "mounted samfs1");
        let alert = slot.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Warning);
        assert_eq!(alert.detail, vec!["mounted samfs1", "disk offline"]);
    }

    #[test]
    fn test_warning_on_info_keeps_success_detail() {
        let mut slot = AlertSlot::default();
        slot.set_info("Success", "client2 was added");
        slot.set_warning("Host added", "client2 does not report sharefs1 yet");
        let alert = slot.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Warning);
        assert_eq!(alert.summary, "Host added");
        assert_eq!(
            alert.detail,
            vec!["client2 was added", "client2 does not report sharefs1 yet"]
        );
    }

    #[test]
    fn test_repeated_detail_not_duplicated() {
        let mut slot = AlertSlot::default();
        slot.set_error("Failed", 5, Some("disk offline"), "srv");
        slot.set_error("Failed again", 5, Some("disk offline"), "srv");
        let alert = slot.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.summary, "Failed again");
        assert_eq!(alert.detail.len(), 1);
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_sentinel_detail_from_catalog() {
        let text = error_text(codes::NOT_FOUND, None, "srv");
        assert_eq!(text, resource_string("error.-1000", &[]));
        assert!(!text.starts_with("error."));

        let down = error_text(codes::SERVER_DOWN, None, "srv");
        assert!(down.contains("srv"));

        assert_eq!(error_text(42, None, "srv"), "");
        assert_eq!(error_text(42, Some("boom"), "srv"), "boom");
    }

    #[test]
    fn test_timeout_overrides_backend_detail() {
        let text = error_text(codes::CALL_TIMEOUT, Some("rpc timed out"), "srv");
        assert_eq!(text, resource_string("error.-2801", &["srv"]));
    }

    #[test]
    fn test_format_multi_host() {
        let err = SamFsError::MultiHost {
            code: 1,
            message: "partial failure".into(),
            failures: vec![
                HostFailure {
                    host: "client1".into(),
                    error: SamFsError::with_message(2, "busy"),
                },
                HostFailure {
                    host: "client2".into(),
                    error: SamFsError::code_only(codes::SERVER_DOWN),
                },
            ],
        };
        let text = format_multi_host(&err);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "partial failure");
        assert_eq!(lines[1], "client1: busy");
        assert!(lines[2].starts_with("client2: "));
        assert!(lines[2].contains("client2"));
    }

    #[test]
    fn test_page_urls_are_encoded() {
        assert_eq!(Page::FsDetails("sam fs".into()).url(), "/fs/sam%20fs");
        assert_eq!(
            Page::FileDetails("/sam1/a b".into()).url(),
            "/files/details?path=%2Fsam1%2Fa%20b"
        );
    }
}
