//! Property sheet of one SAM file system.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::fs_summary::{
    MenuContext, UsageBar, archive_enabled, delete_fs, describe, enabled_options, menu, mount_fs,
    share_key, state_text,
};
use super::messages::resource_string;
use super::session::SessionContext;
use super::{Console, Page, developer_bug, format_kb, report};
use crate::backend::model::{FileSystem, SetupKind};
use crate::error::{SamFsError, codes};

/// Actions offered on the details page, following the summary menu rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetailOptions {
    pub edit_mount_options: bool,
    pub check_fs: bool,
    pub mount: bool,
    pub unmount: bool,
    pub grow: bool,
    pub shrink: bool,
    pub delete: bool,
    pub archive_activities: bool,
    pub schedule_dump: bool,
}

impl DetailOptions {
    pub fn new(fs: &FileSystem, ctx: &MenuContext) -> Self {
        let enabled = enabled_options(fs, ctx);
        let has = |option| enabled.contains(&option);
        Self {
            edit_mount_options: has(menu::EDIT_MOUNT_OPTIONS),
            check_fs: has(menu::CHECK_FS),
            mount: has(menu::MOUNT),
            unmount: has(menu::UNMOUNT),
            grow: has(menu::GROW),
            shrink: has(menu::SHRINK),
            delete: has(menu::DELETE),
            archive_activities: has(menu::ARCHIVE_ACTIVITIES),
            schedule_dump: has(menu::SCHEDULE_DUMP),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FsDetailsView {
    pub fs_name: String,
    pub found: bool,
    pub type_text: String,
    pub state_text: String,
    pub capacity_text: String,
    pub free_text: String,
    pub usage: i32,
    pub bar: UsageBar,
    pub hwm_text: String,
    pub lwm_text: String,
    pub mount_point: String,
    pub share_text: String,
    pub metadata_server: String,
    pub ha_text: String,
    pub shared: bool,
    pub options: DetailOptions,
}

impl FsDetailsView {
    fn missing(fs_name: &str) -> Self {
        Self {
            fs_name: fs_name.to_string(),
            found: false,
            type_text: String::new(),
            state_text: String::new(),
            capacity_text: String::new(),
            free_text: String::new(),
            usage: -1,
            bar: UsageBar::Blank,
            hwm_text: String::new(),
            lwm_text: String::new(),
            mount_point: String::new(),
            share_text: String::new(),
            metadata_server: String::new(),
            ha_text: String::new(),
            shared: false,
            options: DetailOptions::default(),
        }
    }

    fn new(fs: &FileSystem, ctx: &MenuContext) -> Self {
        let mounted = fs.state.is_mounted();
        let archive = archive_enabled(fs, ctx.setup);
        let consumed = fs.consumed_percentage();
        let props = &fs.mount_properties;
        let watermark = |value: Option<u32>| match value {
            Some(v) if archive => format!("{}%", v),
            _ => String::new(),
        };

        Self {
            fs_name: fs.name.clone(),
            found: true,
            type_text: describe(fs),
            state_text: state_text(fs.state),
            capacity_text: format_kb(fs.capacity_kb),
            free_text: format_kb(fs.available_kb),
            usage: if mounted { consumed } else { -1 },
            bar: UsageBar::new(mounted, consumed, archive, props.hwm),
            hwm_text: watermark(props.hwm),
            lwm_text: watermark(props.lwm),
            mount_point: fs.mount_point.clone(),
            share_text: resource_string(&format!("fs.role.{}", share_key(fs.share_status)), &[]),
            metadata_server: fs.metadata_server.clone(),
            ha_text: resource_string(if fs.ha { "common.yes" } else { "common.no" }, &[]),
            shared: fs.share_status.is_shared(),
            options: DetailOptions::new(fs, ctx),
        }
    }
}

async fn menu_context(console: &Console, server: &str) -> MenuContext {
    match console.backend().server_info(server).await {
        Ok(info) => MenuContext::new(info.setup, &info.api_version),
        Err(e) => {
            debug!("Server info of {} unavailable: {}", server, e);
            MenuContext::new(SetupKind::Sam, "")
        }
    }
}

pub async fn display(console: &Console, session: &mut SessionContext, fs_name: &str) -> FsDetailsView {
    session.select_fs(fs_name);
    let server = session.server.clone();
    let ctx = menu_context(console, &server).await;

    match console.require_fs(&server, fs_name).await {
        Ok(fs) => {
            session.mount_point = Some(fs.mount_point.clone());
            FsDetailsView::new(&fs, &ctx)
        }
        Err(e) => {
            session.alert.set_backend_error(
                &resource_string("fs.details.error", &[fs_name]),
                &e,
                &server,
            );
            FsDetailsView::missing(fs_name)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DetailsAction {
    Mount,
    Unmount,
    Delete,
    Samfsck {
        log_file: String,
        /// `check` or `repair`.
        kind: String,
    },
    EditMountOptions,
    Grow,
    Shrink,
    ViewSharedMembers,
    ScheduleDump,
}

pub async fn submit(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    action: DetailsAction,
) -> Page {
    debug!("Details action {:?} on {}", action, fs_name);
    let server = session.server.clone();
    let current = Page::FsDetails(fs_name.to_string());
    match action {
        DetailsAction::Mount => {
            let result = mount_fs(console, &server, fs_name).await;
            report(
                session,
                result,
                &resource_string("fs.mount.done", &[fs_name]),
                &resource_string("fs.mount.error", &[fs_name]),
            );
        }
        DetailsAction::Unmount => {
            info!("Unmounting {} on {}", fs_name, server);
            let result = console.backend().unmount(&server, fs_name).await;
            report(
                session,
                result,
                &resource_string("fs.unmount.done", &[fs_name]),
                &resource_string("fs.unmount.error", &[fs_name]),
            );
        }
        DetailsAction::Delete => return delete_fs(console, session, fs_name, current).await,
        DetailsAction::Samfsck { log_file, kind } => {
            let repair = match kind.as_str() {
                "check" => false,
                "repair" => true,
                other => {
                    developer_bug(
                        session,
                        &resource_string("fs.samfsck.error", &[fs_name]),
                        "samfsck kind",
                        other,
                    );
                    return current;
                }
            };
            samfsck(console, session, fs_name, log_file.trim(), repair).await;
        }
        DetailsAction::EditMountOptions => {
            session.mount_options_host = None;
            return Page::MountOptions(fs_name.to_string());
        }
        DetailsAction::Grow => {
            session.alert.set_info(
                &resource_string("fs.resize.summary", &[]),
                &resource_string("fs.grow.command", &[fs_name]),
            );
        }
        DetailsAction::Shrink => {
            session.alert.set_info(
                &resource_string("fs.resize.summary", &[]),
                &resource_string("fs.shrink.command", &[fs_name]),
            );
        }
        DetailsAction::ViewSharedMembers => return Page::SharedFs(fs_name.to_string()),
        DetailsAction::ScheduleDump => return Page::RecoverySchedule(fs_name.to_string()),
    }
    current
}

/// Start a file system check writing to `log_file`, which must not exist yet.
pub(crate) async fn samfsck(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    log_file: &str,
    repair: bool,
) {
    let server = session.server.clone();
    let summary = resource_string("fs.samfsck.error", &[fs_name]);
    let result = async {
        if !log_file.starts_with('/') {
            return Err(SamFsError::with_message(
                codes::INVALID_INPUT,
                resource_string("fs.samfsck.log.invalid", &[]),
            ));
        }
        if console.backend().file_exists(&server, log_file).await? {
            return Err(SamFsError::code_only(codes::FILE_EXISTS));
        }
        console.require_fs(&server, fs_name).await?;
        info!("Running samfsck on {} (repair: {})", fs_name, repair);
        console
            .backend()
            .samfsck(&server, fs_name, log_file, repair)
            .await
    }
    .await;

    match result {
        Ok(job) if job > 0 => session.alert.set_info(
            &resource_string("success.summary", &[]),
            &resource_string("fs.samfsck.job", &[fs_name, &job.to_string(), log_file]),
        ),
        Ok(_) => session.alert.set_info(
            &resource_string("success.summary", &[]),
            &resource_string("fs.samfsck.done", &[fs_name, log_file]),
        ),
        Err(e) => session.alert.set_backend_error(&summary, &e, &server),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SamQfsBackend;
    use crate::backend::local::Fault;
    use crate::backend::local::tests::SERVER;
    use crate::console::AlertKind;
    use crate::console::tests::{demo_console, demo_session};
    use crate::error::HostFailure;

    #[tokio::test]
    async fn test_display_property_sheet() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "samfs1").await;
        assert!(view.found);
        assert_eq!(view.hwm_text, "80%");
        assert_eq!(view.lwm_text, "60%");
        assert_eq!(view.usage, 60);
        assert!(view.options.unmount);
        assert!(!view.options.delete);
        assert!(view.options.schedule_dump);
        assert_eq!(session.mount_point.as_deref(), Some("/sam1"));
    }

    #[tokio::test]
    async fn test_display_missing_fs() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "gone").await;
        assert!(!view.found);
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.code, Some(codes::NOT_FOUND));
        assert_eq!(alert.detail, vec![resource_string("error.-1000", &[])]);
    }

    #[tokio::test]
    async fn test_samfsck_on_mounted_fs_starts_job() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let action = DetailsAction::Samfsck {
            log_file: "/var/tmp/samfs1.fsck".into(),
            kind: "check".into(),
        };
        submit(&console, &mut session, "samfs1", action.clone()).await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Info);
        assert_eq!(
            alert.detail[0],
            resource_string("fs.samfsck.job", &["samfs1", "1", "/var/tmp/samfs1.fsck"])
        );

        // The log file now exists.
        submit(&console, &mut session, "samfs1", action).await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.code, Some(codes::FILE_EXISTS));
    }

    #[tokio::test]
    async fn test_samfsck_on_unmounted_fs_completes() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        submit(
            &console,
            &mut session,
            "qfs1",
            DetailsAction::Samfsck {
                log_file: "/var/tmp/qfs1.fsck".into(),
                kind: "repair".into(),
            },
        )
        .await;
        let alert = session.alert.take().unwrap();
        assert_eq!(
            alert.detail[0],
            resource_string("fs.samfsck.done", &["qfs1", "/var/tmp/qfs1.fsck"])
        );
    }

    #[tokio::test]
    async fn test_samfsck_missing_fs() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        submit(
            &console,
            &mut session,
            "gone",
            DetailsAction::Samfsck {
                log_file: "/var/tmp/gone.fsck".into(),
                kind: "check".into(),
            },
        )
        .await;
        assert_eq!(session.alert.take().unwrap().code, Some(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_delete_warnings_return_to_summary() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.unmount(SERVER, "qfs1").await.unwrap();
        backend.inject(
            "delete_file_system",
            Fault::Fail(SamFsError::Warnings {
                code: codes::ARCHIVER_CONFIG_WARNINGS,
                messages: vec!["images criteria 1 no longer applies to qfs1".into()],
            }),
        );
        let page = submit(&console, &mut session, "qfs1", DetailsAction::Delete).await;
        assert_eq!(page, Page::FsSummary);
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Warning);
    }

    #[tokio::test]
    async fn test_delete_multi_msg_returns_to_summary() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.inject(
            "delete_file_system",
            Fault::Fail(SamFsError::MultiMsg {
                code: codes::ARCHIVER_CONFIG_ERRORS,
                messages: vec!["logs criteria 1 no longer applies".into()],
            }),
        );
        let page = submit(&console, &mut session, "qfs1", DetailsAction::Delete).await;
        assert_eq!(page, Page::FsSummary);
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.detail, vec!["logs criteria 1 no longer applies"]);
    }

    #[tokio::test]
    async fn test_delete_multi_host_returns_to_summary() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.inject(
            "delete_file_system",
            Fault::Fail(SamFsError::MultiHost {
                code: 31_211,
                message: "qfs1 was not removed from every host".into(),
                failures: vec![HostFailure {
                    host: "client1".into(),
                    error: SamFsError::with_message(5, "host unreachable"),
                }],
            }),
        );
        let page = submit(&console, &mut session, "qfs1", DetailsAction::Delete).await;
        assert_eq!(page, Page::FsSummary);
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(
            alert.detail,
            vec!["qfs1 was not removed from every host\nclient1: host unreachable"]
        );
    }

    #[tokio::test]
    async fn test_delete_plain_error_stays() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let page = submit(&console, &mut session, "samfs1", DetailsAction::Delete).await;
        assert_eq!(page, Page::FsDetails("samfs1".into()));
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.code, Some(codes::INVALID_INPUT));
    }

    #[tokio::test]
    async fn test_unknown_samfsck_kind() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        submit(
            &console,
            &mut session,
            "qfs1",
            DetailsAction::Samfsck {
                log_file: "/tmp/x".into(),
                kind: "both".into(),
            },
        )
        .await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Error);
    }
}
