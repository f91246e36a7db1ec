//! Add a host to a shared file system.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::messages::resource_string;
use super::session::SessionContext;
use super::shared_fs::mds_info;
use super::{Console, Page, report};
use crate::backend::model::AddMemberRequest;
use crate::error::codes;
use crate::retry::PollOutcome;

/// Value of the secondary address menu when no address is picked.
pub const NO_SECONDARY_IP: &str = "---";

/// IP addresses of a new member, primary first.
pub fn create_ip_array(primary: &str, secondary: &str) -> Vec<String> {
    if secondary == NO_SECONDARY_IP {
        vec![primary.to_string()]
    } else {
        vec![primary.to_string(), secondary.to_string()]
    }
}

/// Candidate host. `marked` flags an architecture different from the
/// metadata server's.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostEntry {
    pub host: String,
    pub marked: bool,
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddMemberView {
    pub fs_name: String,
    pub mds_mounted: bool,
    pub hosts: Vec<HostEntry>,
    /// `hosts` for the page script.
    pub hosts_json: String,
    /// Messages used by the client side validation.
    pub messages_json: String,
    pub mount_point: String,
}

fn validation_messages() -> String {
    let messages: Vec<String> = [
        "member.validate.host",
        "member.validate.mount_point",
        "member.validate.ip",
        "member.validate.marked",
    ]
    .iter()
    .map(|key| resource_string(key, &[]))
    .collect();
    serde_json::to_string(&messages).unwrap_or_else(|_| "[]".to_string())
}

pub async fn display(console: &Console, session: &mut SessionContext, fs_name: &str) -> AddMemberView {
    session.select_fs(fs_name);
    let server = session.server.clone();
    let mut view = AddMemberView {
        fs_name: fs_name.to_string(),
        mds_mounted: false,
        hosts: Vec::new(),
        hosts_json: "[]".to_string(),
        messages_json: validation_messages(),
        mount_point: String::new(),
    };

    let mds = match mds_info(console, session, fs_name).await {
        Ok(mds) => mds,
        Err(e) => {
            session.alert.set_backend_error(
                &resource_string("member.load.error", &[fs_name]),
                &e,
                &server,
            );
            return view;
        }
    };
    view.mds_mounted = mds.mounted;
    if let Ok(fs) = console.require_fs(&server, fs_name).await {
        view.mount_point = fs.mount_point;
    }

    let hosts = match console.backend().hosts_not_used_by(&server, fs_name).await {
        Ok(hosts) => hosts,
        Err(e) => {
            session.alert.set_backend_error(
                &resource_string("member.load.error", &[fs_name]),
                &e,
                &server,
            );
            return view;
        }
    };

    let architecture = mds.architecture.as_str();
    view.hosts = join_all(hosts.into_iter().map(|host| async move {
        let marked = match console.backend().server_info(&host).await {
            Ok(info) => info.architecture != architecture,
            Err(e) => {
                debug!("No server info for {}: {}", host, e);
                false
            }
        };
        let ips = match console.backend().ip_addresses(&host).await {
            Ok(ips) => ips,
            Err(e) => {
                warn!("No IP addresses for {}: {}", host, e);
                Vec::new()
            }
        };
        HostEntry { host, marked, ips }
    }))
    .await;
    view.hosts_json = serde_json::to_string(&view.hosts).unwrap_or_else(|_| "[]".to_string());
    view
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddMemberForm {
    pub host: String,
    pub mount_point: String,
    pub primary_ip: String,
    pub secondary_ip: String,
    pub read_only: Option<String>,
    pub mount_at_boot: Option<String>,
    pub mount_after_add: Option<String>,
    pub potential_server: Option<String>,
    pub background: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AddMemberAction {
    Add(AddMemberForm),
    Cancel,
}

pub async fn submit(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    action: AddMemberAction,
) -> Page {
    let form = match action {
        AddMemberAction::Add(form) => form,
        AddMemberAction::Cancel => return Page::SharedFs(fs_name.to_string()),
    };
    session.select_fs(fs_name);
    let current = Page::AddMember(fs_name.to_string());
    let server = session.server.clone();
    let host = form.host.trim().to_string();
    let summary = resource_string("member.add.error", &[&host, fs_name]);

    let missing = if host.is_empty() {
        Some("member.validate.host")
    } else if !form.mount_point.trim().starts_with('/') {
        Some("member.validate.mount_point")
    } else if form.primary_ip.trim().is_empty() {
        Some("member.validate.ip")
    } else {
        None
    };
    if let Some(key) = missing {
        session.alert.set_error(
            &summary,
            codes::INVALID_INPUT,
            Some(&resource_string(key, &[])),
            &server,
        );
        return current;
    }

    let mds = match mds_info(console, session, fs_name).await {
        Ok(mds) => mds,
        Err(e) => {
            session.alert.set_backend_error(&summary, &e, &server);
            return current;
        }
    };
    let mount_after_add = form.mount_after_add.is_some() && mds.mounted;
    if form.mount_after_add.is_some() && !mds.mounted {
        debug!("Not mounting {} on {}: metadata server unmounted", fs_name, host);
    }

    let request = AddMemberRequest {
        fs_name: fs_name.to_string(),
        server: server.clone(),
        mount_point: form.mount_point.trim().to_string(),
        host: host.clone(),
        ip_addresses: create_ip_array(form.primary_ip.trim(), form.secondary_ip.trim()),
        read_only: form.read_only.is_some(),
        mount_at_boot: form.mount_at_boot.is_some(),
        mount_after_add,
        potential_server: form.potential_server.is_some(),
        background: form.background.is_some(),
    };
    info!("Adding {} to {} ({:?})", host, fs_name, request.ip_addresses);

    let result = console.backend().add_host_to_shared_fs(&request).await;
    if !report(
        session,
        result,
        &resource_string("member.add.done", &[&host, fs_name]),
        &summary,
    ) {
        return current;
    }

    match console.wait_for_fs(&host, fs_name, true).await {
        PollOutcome::Ready => {}
        PollOutcome::TimedOut => {
            warn!("{} has not reported {} yet", host, fs_name);
            session.alert.set_warning(
                &resource_string("member.add.pending.summary", &[]),
                &resource_string("member.add.pending", &[&host, fs_name]),
            );
        }
        PollOutcome::Failed(e) => warn!("Polling for {} on {} failed: {}", fs_name, host, e),
    }
    Page::SharedFs(fs_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SamQfsBackend;
    use crate::backend::local::Fault;
    use crate::backend::local::tests::SERVER;
    use crate::console::AlertKind;
    use crate::console::tests::{demo_console, demo_session};
    use crate::error::SamFsError;

    fn form(host: &str) -> AddMemberForm {
        AddMemberForm {
            host: host.into(),
            mount_point: "/sharefs1".into(),
            primary_ip: "10.0.0.22".into(),
            secondary_ip: NO_SECONDARY_IP.into(),
            mount_after_add: Some("on".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_ip_array() {
        assert_eq!(create_ip_array("10.0.0.1", "---"), vec!["10.0.0.1"]);
        assert_eq!(
            create_ip_array("10.0.0.1", "10.0.0.2"),
            vec!["10.0.0.1", "10.0.0.2"]
        );
    }

    #[tokio::test]
    async fn test_candidates_marked_by_architecture() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "sharefs1").await;
        assert_eq!(view.hosts.len(), 1);
        assert_eq!(view.hosts[0].host, "client2");
        assert!(view.hosts[0].marked);
        assert!(view.hosts_json.contains("\"marked\":true"));
        assert!(view.messages_json.starts_with('['));
    }

    #[tokio::test]
    async fn test_add_member_mounts_when_mds_mounted() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        let page = submit(
            &console,
            &mut session,
            "sharefs1",
            AddMemberAction::Add(form("client2")),
        )
        .await;
        assert_eq!(page, Page::SharedFs("sharefs1".into()));
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
        let fs = backend.get_file_system("client2", "sharefs1").await.unwrap().unwrap();
        assert!(fs.state.is_mounted());
    }

    #[tokio::test]
    async fn test_mount_after_add_ignored_when_mds_unmounted() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.unmount("client1", "sharefs1").await.unwrap();
        backend.unmount(SERVER, "sharefs1").await.unwrap();

        submit(
            &console,
            &mut session,
            "sharefs1",
            AddMemberAction::Add(form("client2")),
        )
        .await;
        let fs = backend.get_file_system("client2", "sharefs1").await.unwrap().unwrap();
        assert!(!fs.state.is_mounted());
    }

    #[tokio::test]
    async fn test_member_not_visible_is_a_warning() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.inject("add_host_to_shared_fs", Fault::Ignore);

        let page = submit(
            &console,
            &mut session,
            "sharefs1",
            AddMemberAction::Add(form("client2")),
        )
        .await;
        assert_eq!(page, Page::SharedFs("sharefs1".into()));
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Warning);
        assert_eq!(
            alert.detail,
            vec![
                resource_string("member.add.done", &["client2", "sharefs1"]),
                resource_string("member.add.pending", &["client2", "sharefs1"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_host_ends_poll_without_warning() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.inject("add_host_to_shared_fs", Fault::Ignore);

        let page = submit(
            &console,
            &mut session,
            "sharefs1",
            AddMemberAction::Add(form("retired-host")),
        )
        .await;
        assert_eq!(page, Page::SharedFs("sharefs1".into()));
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
    }

    #[tokio::test]
    async fn test_backend_failure_stays() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.inject(
            "add_host_to_shared_fs",
            Fault::Fail(SamFsError::with_message(5, "host unreachable")),
        );
        let page = submit(
            &console,
            &mut session,
            "sharefs1",
            AddMemberAction::Add(form("client2")),
        )
        .await;
        assert_eq!(page, Page::AddMember("sharefs1".into()));
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.detail, vec!["host unreachable"]);
    }

    #[tokio::test]
    async fn test_missing_ip_rejected() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let mut f = form("client2");
        f.primary_ip = " ".into();
        submit(&console, &mut session, "sharefs1", AddMemberAction::Add(f)).await;
        assert_eq!(session.alert.take().unwrap().code, Some(codes::INVALID_INPUT));
    }
}
