//! Members of a shared file system.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::messages::resource_string;
use super::session::{MdsInfo, SessionContext};
use super::{Console, Page, fs_summary, report};
use crate::backend::model::{MemberType, SharedMember};
use crate::error::{SamFsError, codes};

/// Row actions of the member table.
pub mod member_menu {
    pub const EDIT_MOUNT_OPTIONS: u8 = 1;
    pub const MOUNT: u8 = 2;
    pub const UNMOUNT: u8 = 3;
}

/// Metadata server of `fs_name`, cached in the session while the same file
/// system stays selected.
pub async fn mds_info(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
) -> Result<MdsInfo, SamFsError> {
    if let Some(mds) = &session.mds
        && mds.fs_name == fs_name
    {
        return Ok(mds.clone());
    }
    let fs = console.require_fs(&session.server, fs_name).await?;
    let host = if fs.metadata_server.is_empty() {
        session.server.clone()
    } else {
        fs.metadata_server.clone()
    };
    let mds_fs = if host == fs.host {
        fs
    } else {
        console.require_fs(&host, fs_name).await?
    };
    let server = console.backend().server_info(&host).await?;
    let info = MdsInfo {
        fs_name: fs_name.to_string(),
        host,
        architecture: server.architecture,
        mounted: mds_fs.state.is_mounted(),
    };
    debug!("Cached metadata server {:?}", info);
    session.mds = Some(info.clone());
    Ok(info)
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberRow {
    pub host: String,
    pub type_label: String,
    pub mount_point: String,
    pub state_text: String,
    pub ip_addresses: String,
    pub read_only: bool,
    /// Enabled row actions, comma-joined.
    pub enabled_actions: String,
    pub can_remove: bool,
}

/// Row actions valid for one member.
pub fn member_actions(member: &SharedMember) -> Vec<u8> {
    let mut actions = vec![member_menu::EDIT_MOUNT_OPTIONS];
    if member.state.is_mounted() {
        actions.push(member_menu::UNMOUNT);
    } else {
        actions.push(member_menu::MOUNT);
    }
    actions
}

impl MemberRow {
    fn new(member: &SharedMember) -> Self {
        Self {
            host: member.host.clone(),
            type_label: member.member_type.label().to_string(),
            mount_point: member.mount_point.clone(),
            state_text: fs_summary::state_text(member.state),
            ip_addresses: member.ip_addresses.join(", "),
            read_only: member.read_only,
            enabled_actions: member_actions(member)
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(","),
            can_remove: member.member_type != MemberType::Mds && !member.state.is_mounted(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedFsView {
    pub fs_name: String,
    pub found: bool,
    pub mds_host: String,
    pub mds_mounted: bool,
    pub rows: Vec<MemberRow>,
    pub can_delete: bool,
}

pub async fn display(console: &Console, session: &mut SessionContext, fs_name: &str) -> SharedFsView {
    session.select_fs(fs_name);
    let server = session.server.clone();
    let mut view = SharedFsView {
        fs_name: fs_name.to_string(),
        found: false,
        mds_host: String::new(),
        mds_mounted: false,
        rows: Vec::new(),
        can_delete: false,
    };

    match mds_info(console, session, fs_name).await {
        Ok(mds) => {
            view.found = true;
            view.mds_host = mds.host;
            view.mds_mounted = mds.mounted;
            view.can_delete = !mds.mounted;
        }
        Err(e) => {
            session.alert.set_backend_error(
                &resource_string("shared.load.error", &[fs_name]),
                &e,
                &server,
            );
            return view;
        }
    }

    match console.backend().shared_members(&server, fs_name).await {
        Ok(members) => view.rows = members.iter().map(MemberRow::new).collect(),
        Err(e) => session.alert.set_backend_error(
            &resource_string("shared.load.error", &[fs_name]),
            &e,
            &server,
        ),
    }
    view
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SharedFsAction {
    MemberAction { host: String, option: String },
    RemoveMember { host: String },
    DeleteFs,
    AddMember,
}

pub async fn submit(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    action: SharedFsAction,
) -> Page {
    debug!("Shared file system action {:?} on {}", action, fs_name);
    session.select_fs(fs_name);
    let current = Page::SharedFs(fs_name.to_string());
    let server = session.server.clone();

    match action {
        SharedFsAction::MemberAction { host, option } => {
            member_action(console, session, fs_name, &host, &option).await
        }
        SharedFsAction::RemoveMember { host } => {
            let result = console
                .backend()
                .remove_host_from_shared_fs(&server, fs_name, &host)
                .await;
            report(
                session,
                result,
                &resource_string("shared.remove.done", &[&host, fs_name]),
                &resource_string("shared.remove.error", &[&host]),
            );
            current
        }
        SharedFsAction::DeleteFs => fs_summary::delete_fs(console, session, fs_name, current).await,
        SharedFsAction::AddMember => Page::AddMember(fs_name.to_string()),
    }
}

async fn member_action(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    host: &str,
    option: &str,
) -> Page {
    let current = Page::SharedFs(fs_name.to_string());
    let server = session.server.clone();
    match option.trim().parse::<u8>() {
        Ok(member_menu::EDIT_MOUNT_OPTIONS) => {
            session.mount_options_host = Some(host.to_string());
            Page::MountOptions(fs_name.to_string())
        }
        Ok(member_menu::MOUNT) => {
            info!("Mounting {} on member {}", fs_name, host);
            let result = fs_summary::mount_fs(console, host, fs_name).await;
            report(
                session,
                result,
                &resource_string("fs.mount.done", &[fs_name]),
                &resource_string("fs.mount.error", &[fs_name]),
            );
            current
        }
        Ok(member_menu::UNMOUNT) => {
            info!("Unmounting {} on member {}", fs_name, host);
            let result = console.backend().unmount(host, fs_name).await;
            if result.is_ok() && session.mds.as_ref().is_some_and(|m| m.host == host) {
                session.mds = None;
            }
            report(
                session,
                result,
                &resource_string("fs.unmount.done", &[fs_name]),
                &resource_string("fs.unmount.error", &[fs_name]),
            );
            current
        }
        _ => {
            session.alert.set_error(
                &resource_string("shared.action.error", &[host]),
                codes::NOT_FOUND,
                None,
                &server,
            );
            current
        }
    }
}
