//! File system summary: one row per SAM file system followed by the other
//! file systems mounted on the server.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::messages::resource_string;
use super::recovery_points::schedule_text;
use super::session::SessionContext;
use super::{Console, Page, developer_bug, format_kb, handle_delete_result, report};
use crate::backend::model::{
    FileSystem, FsFamily, FsState, GenericFileSystem, SetupKind, ShareStatus,
};
use crate::error::{SamFsError, codes};
use crate::retry::PollOutcome;

/// Values of the row action menu. They are also the `option` values posted
/// by the page.
pub mod menu {
    use crate::backend::model::SetupKind;

    pub const LABEL: u8 = 0;
    pub const EDIT_MOUNT_OPTIONS: u8 = 1;
    pub const CHECK_FS: u8 = 2;
    pub const MOUNT: u8 = 3;
    pub const UNMOUNT: u8 = 4;
    pub const GROW: u8 = 5;
    pub const DELETE: u8 = 6;
    pub const ARCHIVE_ACTIVITIES: u8 = 7;
    pub const SCHEDULE_DUMP: u8 = 8;
    pub const SHRINK: u8 = 9;

    /// Order in which the menu items are laid out.
    pub const QFS_ONLY: [u8; 8] = [
        LABEL,
        EDIT_MOUNT_OPTIONS,
        CHECK_FS,
        MOUNT,
        UNMOUNT,
        GROW,
        SHRINK,
        DELETE,
    ];

    pub const SAM: [u8; 10] = [
        LABEL,
        EDIT_MOUNT_OPTIONS,
        CHECK_FS,
        MOUNT,
        UNMOUNT,
        GROW,
        SHRINK,
        DELETE,
        ARCHIVE_ACTIVITIES,
        SCHEDULE_DUMP,
    ];

    pub fn items(setup: SetupKind) -> &'static [u8] {
        match setup {
            SetupKind::QfsOnly => &QFS_ONLY,
            SetupKind::Sam => &SAM,
        }
    }

    /// Position of `option` in the menu layout, `0` when it is not shown.
    pub fn position(setup: SetupKind, option: u8) -> usize {
        items(setup).iter().position(|&o| o == option).unwrap_or(0)
    }

    pub fn label_key(option: u8) -> &'static str {
        match option {
            EDIT_MOUNT_OPTIONS => "fs.menu.edit_mount_options",
            CHECK_FS => "fs.menu.check_fs",
            MOUNT => "fs.menu.mount",
            UNMOUNT => "fs.menu.unmount",
            GROW => "fs.menu.grow",
            SHRINK => "fs.menu.shrink",
            DELETE => "fs.menu.delete",
            ARCHIVE_ACTIVITIES => "fs.menu.archive_activities",
            SCHEDULE_DUMP => "fs.menu.schedule_dump",
            _ => "fs.menu.label",
        }
    }
}

/// Indexes of the table buttons enabled per row.
pub mod buttons {
    pub const VIEW_POLICIES: u8 = 0;
    pub const VIEW_FILES: u8 = 1;
    pub const NEW_POLICY: u8 = 2;
    /// QFS-only servers only have the view files button.
    pub const VIEW_FILES_QFS: u8 = 0;
}

/// Assumed when the server does not report its API version.
pub const DEFAULT_API_VERSION: &str = "1.5";

/// Compare dotted API versions numerically, component by component.
pub fn api_at_least(version: &str, reference: &str) -> bool {
    fn parts(v: &str) -> Vec<u32> {
        v.trim()
            .split('.')
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    }
    let (a, b) = (parts(version), parts(reference));
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}

/// What the server supports, used to decide which row actions are offered.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuContext {
    pub setup: SetupKind,
    pub api_version: String,
}

impl MenuContext {
    pub fn new(setup: SetupKind, api_version: &str) -> Self {
        let api_version = if api_version.trim().is_empty() {
            DEFAULT_API_VERSION
        } else {
            api_version
        };
        Self {
            setup,
            api_version: api_version.to_string(),
        }
    }
}

/// Archive management is only done on the host owning the metadata.
pub fn archive_enabled(fs: &FileSystem, setup: SetupKind) -> bool {
    !fs.ha && setup == SetupKind::Sam && fs.is_archiving() && fs.share_status.owns_metadata()
}

fn join_positions(setup: SetupKind, options: &[u8]) -> String {
    options
        .iter()
        .map(|&o| menu::position(setup, o).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Menu positions enabled for a SAM file system row, comma separated.
pub fn enabled_menu_options(fs: &FileSystem, ctx: &MenuContext) -> String {
    join_positions(ctx.setup, &enabled_options(fs, ctx))
}

/// Menu values enabled for a SAM file system, in the order they are emitted.
pub fn enabled_options(fs: &FileSystem, ctx: &MenuContext) -> Vec<u8> {
    let mounted = fs.state.is_mounted();
    let root = fs.mount_point == "/";
    let owns_metadata = fs.share_status.owns_metadata();

    let (grow, shrink) = if api_at_least(&ctx.api_version, "1.6") {
        (!fs.ha && owns_metadata, !fs.ha && mounted && owns_metadata)
    } else {
        (
            !fs.ha && !mounted && fs.share_status == ShareStatus::Unshared,
            false,
        )
    };
    let fsck = fs.share_status == ShareStatus::Unshared
        || (fs.share_status == ShareStatus::Mds && !mounted);
    let archive = archive_enabled(fs, ctx.setup);

    let mut options = Vec::new();
    if grow {
        options.push(menu::GROW);
    }
    if shrink {
        options.push(menu::SHRINK);
    }
    options.push(menu::EDIT_MOUNT_OPTIONS);
    if fsck {
        options.push(menu::CHECK_FS);
    }
    if !mounted {
        options.push(menu::MOUNT);
    }
    if mounted && !root {
        options.push(menu::UNMOUNT);
    }
    if !mounted && !root {
        options.push(menu::DELETE);
    }
    if archive {
        options.push(menu::ARCHIVE_ACTIVITIES);
        if mounted {
            options.push(menu::SCHEDULE_DUMP);
        }
    }
    options
}

/// Menu positions enabled for a non-SAM file system row.
pub fn enabled_generic_options(fs: &GenericFileSystem, setup: SetupKind) -> String {
    let mounted = fs.state.is_mounted();
    let root = fs.mount_point == "/";
    let zfs = fs.family() == FsFamily::Zfs;

    let mut options = Vec::new();
    if !mounted && !zfs {
        options.push(menu::MOUNT);
    }
    if mounted && !zfs && !root {
        options.push(menu::UNMOUNT);
    }
    if !mounted && !root {
        options.push(menu::DELETE);
    }
    join_positions(setup, &options)
}

pub fn enabled_buttons(setup: SetupKind, archive: bool) -> String {
    match setup {
        SetupKind::QfsOnly => buttons::VIEW_FILES_QFS.to_string(),
        SetupKind::Sam if archive => format!(
            "{},{},{}",
            buttons::VIEW_FILES,
            buttons::VIEW_POLICIES,
            buttons::NEW_POLICY
        ),
        SetupKind::Sam => buttons::VIEW_FILES.to_string(),
    }
}

/// Usage bar drawn in the capacity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UsageBar {
    Blank,
    Normal(u8),
    /// Usage reached the high water mark.
    Red(u8),
}

impl UsageBar {
    pub fn new(mounted: bool, consumed: i32, archive: bool, hwm: Option<u32>) -> Self {
        if !mounted || !(0..=100).contains(&consumed) {
            return UsageBar::Blank;
        }
        let pct = consumed as u8;
        match hwm {
            Some(hwm) if archive && consumed as u32 >= hwm => UsageBar::Red(pct),
            _ => UsageBar::Normal(pct),
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            UsageBar::Blank => "usage-blank",
            UsageBar::Normal(_) => "usage-normal",
            UsageBar::Red(_) => "usage-red",
        }
    }

    pub fn percent(&self) -> u8 {
        match self {
            UsageBar::Blank => 0,
            UsageBar::Normal(p) | UsageBar::Red(p) => *p,
        }
    }

    pub fn is_blank(&self) -> bool {
        *self == UsageBar::Blank
    }
}

/// File system types the summary can be narrowed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SummaryFilter {
    #[default]
    All,
    Qfs,
    Ufs,
    Vxfs,
    NfsShared,
}

impl SummaryFilter {
    pub const ALL: [SummaryFilter; 5] = [
        SummaryFilter::All,
        SummaryFilter::Qfs,
        SummaryFilter::Ufs,
        SummaryFilter::Vxfs,
        SummaryFilter::NfsShared,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SummaryFilter::All => "all",
            SummaryFilter::Qfs => "qfs",
            SummaryFilter::Ufs => "ufs",
            SummaryFilter::Vxfs => "vxfs",
            SummaryFilter::NfsShared => "nfs",
        }
    }

    pub fn label(self) -> String {
        resource_string(&format!("fs.filter.{}", self.as_str()), &[])
    }

    pub fn should_exclude(self, family: FsFamily, nfs_shared: bool) -> bool {
        match self {
            SummaryFilter::All => false,
            SummaryFilter::Qfs => family != FsFamily::SamQfs,
            SummaryFilter::Ufs => family != FsFamily::Ufs,
            SummaryFilter::Vxfs => family != FsFamily::Vxfs,
            SummaryFilter::NfsShared => !nfs_shared,
        }
    }
}

/// Type column of a SAM file system.
pub fn describe(fs: &FileSystem) -> String {
    let mut text = fs.product.label().to_string();
    if fs.share_status.is_shared() {
        let role = resource_string(&format!("fs.role.{}", share_key(fs.share_status)), &[]);
        text = resource_string("fs.type.shared", &[&text, &role]);
    }
    if fs.ha {
        text = resource_string("fs.type.ha", &[&text]);
    }
    text
}

pub fn share_key(status: ShareStatus) -> &'static str {
    match status {
        ShareStatus::Unshared => "unshared",
        ShareStatus::Mds => "mds",
        ShareStatus::Pmds => "pmds",
        ShareStatus::Client => "client",
    }
}

pub fn state_text(state: FsState) -> String {
    match state {
        FsState::Mounted => resource_string("fs.state.mounted", &[]),
        FsState::Unmounted => resource_string("fs.state.unmounted", &[]),
    }
}

/// One row of the summary table.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub name: String,
    pub display_name: String,
    pub generic: bool,
    pub type_text: String,
    pub mounted: bool,
    pub state_text: String,
    pub capacity_text: String,
    /// `-1` when not mounted.
    pub usage: i32,
    pub bar: UsageBar,
    pub hwm_text: String,
    pub mount_point: String,
    pub nfs_shared_text: String,
    pub dump_schedule: String,
    pub enabled_buttons: String,
    pub enabled_menu_options: String,
    pub proto_fs: bool,
}

impl SummaryRow {
    pub fn details_url(&self) -> String {
        Page::FsDetails(self.name.clone()).url()
    }

    /// Archiving rows get the policy buttons on top of view files.
    pub fn policies_enabled(&self) -> bool {
        self.enabled_buttons.split(',').count() > 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuEntry {
    pub value: u8,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterEntry {
    pub value: &'static str,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    pub server: String,
    pub rows: Vec<SummaryRow>,
    pub menu: Vec<MenuEntry>,
    pub filters: Vec<FilterEntry>,
    pub sam_setup: bool,
}

fn sam_row(fs: &FileSystem, ctx: &MenuContext, dump_schedule: String) -> SummaryRow {
    let mounted = fs.state.is_mounted();
    let archive = archive_enabled(fs, ctx.setup);
    let consumed = fs.consumed_percentage();
    let hwm = fs.mount_properties.hwm;

    SummaryRow {
        name: fs.name.clone(),
        display_name: fs.name.clone(),
        generic: false,
        type_text: describe(fs),
        mounted,
        state_text: state_text(fs.state),
        capacity_text: if mounted {
            format_kb(fs.capacity_kb)
        } else {
            String::new()
        },
        usage: if mounted { consumed } else { -1 },
        bar: UsageBar::new(mounted, consumed, archive, hwm),
        hwm_text: match hwm {
            Some(hwm) if archive => hwm.to_string(),
            _ => String::new(),
        },
        mount_point: fs.mount_point.clone(),
        nfs_shared_text: yes_or_blank(fs.nfs_shared),
        dump_schedule,
        enabled_buttons: enabled_buttons(ctx.setup, archive),
        enabled_menu_options: enabled_menu_options(fs, ctx),
        proto_fs: fs.proto_fs,
    }
}

fn generic_row(fs: &GenericFileSystem, setup: SetupKind) -> SummaryRow {
    let mounted = fs.state.is_mounted();
    let consumed = fs.consumed_percentage();

    SummaryRow {
        name: fs.name.clone(),
        display_name: format!("<{}>", fs.type_name),
        generic: true,
        type_text: fs.type_name.to_uppercase(),
        mounted,
        state_text: state_text(fs.state),
        capacity_text: if mounted {
            format_kb(fs.capacity_kb)
        } else {
            String::new()
        },
        usage: if mounted { consumed } else { -1 },
        bar: UsageBar::new(mounted, consumed, false, None),
        hwm_text: String::new(),
        mount_point: fs.mount_point.clone(),
        nfs_shared_text: yes_or_blank(fs.nfs_shared),
        dump_schedule: String::new(),
        enabled_buttons: enabled_buttons(setup, false),
        enabled_menu_options: enabled_generic_options(fs, setup),
        proto_fs: false,
    }
}

fn yes_or_blank(flag: bool) -> String {
    if flag {
        resource_string("common.yes", &[])
    } else {
        String::new()
    }
}

pub async fn display(console: &Console, session: &mut SessionContext) -> SummaryView {
    let server = session.server.clone();
    let filter = session.summary_filter;
    let mut view = SummaryView {
        server: server.clone(),
        rows: Vec::new(),
        menu: Vec::new(),
        filters: SummaryFilter::ALL
            .into_iter()
            .map(|f| FilterEntry {
                value: f.as_str(),
                label: f.label(),
                selected: f == filter,
            })
            .collect(),
        sam_setup: false,
    };

    let info = match console.backend().server_info(&server).await {
        Ok(info) => info,
        Err(e) => {
            session
                .alert
                .set_backend_error(&resource_string("fs.summary.error", &[]), &e, &server);
            return view;
        }
    };
    let ctx = MenuContext::new(info.setup, &info.api_version);
    view.sam_setup = ctx.setup == SetupKind::Sam;
    view.menu = menu::items(ctx.setup)
        .iter()
        .map(|&value| MenuEntry {
            value,
            label: resource_string(menu::label_key(value), &[]),
        })
        .collect();

    match console.backend().list_file_systems(&server).await {
        Ok(list) => {
            for fs in list {
                if filter.should_exclude(FsFamily::SamQfs, fs.nfs_shared) {
                    continue;
                }
                let mut dump_schedule = String::new();
                if archive_enabled(&fs, ctx.setup) && fs.state.is_mounted() {
                    match console
                        .backend()
                        .recovery_point_schedule(&server, &fs.name)
                        .await
                    {
                        Ok(Some(schedule)) => dump_schedule = schedule_text(&schedule),
                        Ok(None) => {}
                        Err(e) => debug!("No recovery point schedule for {}: {}", fs.name, e),
                    }
                }
                view.rows.push(sam_row(&fs, &ctx, dump_schedule));
            }
        }
        Err(e) => {
            session
                .alert
                .set_backend_error(&resource_string("fs.summary.error", &[]), &e, &server);
            return view;
        }
    }

    if filter == SummaryFilter::Qfs {
        return view;
    }

    match console.backend().list_generic_file_systems(&server).await {
        Ok(list) => view.rows.extend(
            list.iter()
                .filter(|fs| !filter.should_exclude(fs.family(), fs.nfs_shared))
                .map(|fs| generic_row(fs, ctx.setup)),
        ),
        Err(e) => session
            .alert
            .set_backend_error(&resource_string("fs.summary.error", &[]), &e, &server),
    }
    view
}

/// Actions posted by the summary page.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SummaryAction {
    /// Row action menu; `option` is one of the [`menu`] values.
    Menu {
        fs: String,
        option: String,
        #[serde(default)]
        generic: Option<String>,
    },
    Mount {
        fs: String,
        #[serde(default)]
        generic: Option<String>,
    },
    Unmount {
        fs: String,
        #[serde(default)]
        generic: Option<String>,
    },
    Delete {
        fs: String,
        #[serde(default)]
        generic: Option<String>,
    },
    Filter {
        filter: String,
    },
    ViewFiles {
        fs: String,
    },
    ViewPolicies {
        fs: String,
    },
    EditMountOptions {
        fs: String,
    },
    CheckFs {
        fs: String,
    },
    ScheduleDump {
        fs: String,
    },
    ArchiveActivities {
        fs: String,
    },
}

fn is_generic(flag: &Option<String>) -> bool {
    matches!(flag.as_deref(), Some("true") | Some("on") | Some("1"))
}

pub async fn submit(console: &Console, session: &mut SessionContext, action: SummaryAction) -> Page {
    debug!("Summary action {:?}", action);
    match action {
        SummaryAction::Menu {
            fs,
            option,
            generic,
        } => {
            let Ok(option) = option.trim().parse::<u8>() else {
                developer_bug(
                    session,
                    &resource_string("fs.summary.error", &[]),
                    "menu option",
                    &option,
                );
                return Page::FsSummary;
            };
            run_menu_option(console, session, &fs, option, is_generic(&generic)).await
        }
        SummaryAction::Mount { fs, generic } => {
            run_menu_option(console, session, &fs, menu::MOUNT, is_generic(&generic)).await
        }
        SummaryAction::Unmount { fs, generic } => {
            run_menu_option(console, session, &fs, menu::UNMOUNT, is_generic(&generic)).await
        }
        SummaryAction::Delete { fs, generic } => {
            run_menu_option(console, session, &fs, menu::DELETE, is_generic(&generic)).await
        }
        SummaryAction::Filter { filter } => {
            match SummaryFilter::parse(&filter) {
                Some(f) => session.summary_filter = f,
                None => developer_bug(
                    session,
                    &resource_string("fs.summary.error", &[]),
                    "filter",
                    &filter,
                ),
            }
            Page::FsSummary
        }
        SummaryAction::ViewFiles { fs } => view_files(console, session, &fs).await,
        SummaryAction::ViewPolicies { fs } => {
            session.select_fs(&fs);
            Page::ArchivePolicies(fs)
        }
        SummaryAction::EditMountOptions { fs } => {
            run_menu_option(console, session, &fs, menu::EDIT_MOUNT_OPTIONS, false).await
        }
        SummaryAction::CheckFs { fs } => {
            run_menu_option(console, session, &fs, menu::CHECK_FS, false).await
        }
        SummaryAction::ScheduleDump { fs } => {
            run_menu_option(console, session, &fs, menu::SCHEDULE_DUMP, false).await
        }
        SummaryAction::ArchiveActivities { fs } => {
            run_menu_option(console, session, &fs, menu::ARCHIVE_ACTIVITIES, false).await
        }
    }
}

async fn run_menu_option(
    console: &Console,
    session: &mut SessionContext,
    fs: &str,
    option: u8,
    generic: bool,
) -> Page {
    if generic {
        return run_generic_option(console, session, fs, option).await;
    }
    let server = session.server.clone();
    match option {
        menu::LABEL => Page::FsSummary,
        menu::MOUNT => {
            let result = mount_fs(console, &server, fs).await;
            report(
                session,
                result,
                &resource_string("fs.mount.done", &[fs]),
                &resource_string("fs.mount.error", &[fs]),
            );
            Page::FsSummary
        }
        menu::UNMOUNT => {
            let result = console.backend().unmount(&server, fs).await;
            report(
                session,
                result,
                &resource_string("fs.unmount.done", &[fs]),
                &resource_string("fs.unmount.error", &[fs]),
            );
            Page::FsSummary
        }
        menu::DELETE => delete_fs(console, session, fs, Page::FsSummary).await,
        menu::EDIT_MOUNT_OPTIONS => {
            session.select_fs(fs);
            session.mount_options_host = None;
            Page::MountOptions(fs.to_string())
        }
        menu::CHECK_FS => {
            session.select_fs(fs);
            Page::FsDetails(fs.to_string())
        }
        menu::GROW | menu::SHRINK => {
            session.select_fs(fs);
            let key = if option == menu::GROW {
                "fs.grow.command"
            } else {
                "fs.shrink.command"
            };
            session.alert.set_info(
                &resource_string("fs.resize.summary", &[]),
                &resource_string(key, &[fs]),
            );
            Page::FsDetails(fs.to_string())
        }
        menu::ARCHIVE_ACTIVITIES => {
            session.select_fs(fs);
            Page::ArchivePolicies(fs.to_string())
        }
        menu::SCHEDULE_DUMP => {
            session.select_fs(fs);
            Page::RecoverySchedule(fs.to_string())
        }
        other => {
            developer_bug(
                session,
                &resource_string("fs.summary.error", &[]),
                "menu option",
                &other.to_string(),
            );
            Page::FsSummary
        }
    }
}

async fn run_generic_option(
    console: &Console,
    session: &mut SessionContext,
    fs: &str,
    option: u8,
) -> Page {
    let server = session.server.clone();
    match option {
        menu::LABEL => {}
        menu::MOUNT => {
            let result = console.backend().mount_generic(&server, fs).await;
            report(
                session,
                result,
                &resource_string("fs.mount.done", &[fs]),
                &resource_string("fs.mount.error", &[fs]),
            );
        }
        menu::UNMOUNT => {
            let result = console.backend().unmount_generic(&server, fs).await;
            report(
                session,
                result,
                &resource_string("fs.unmount.done", &[fs]),
                &resource_string("fs.unmount.error", &[fs]),
            );
        }
        menu::DELETE => {
            info!("Deleting {} from {}", fs, server);
            let result = console.backend().delete_generic_file_system(&server, fs).await;
            return handle_delete_result(session, result, fs, Page::FsSummary);
        }
        other => developer_bug(
            session,
            &resource_string("fs.summary.error", &[]),
            "menu option",
            &other.to_string(),
        ),
    }
    Page::FsSummary
}

/// Mount a SAM file system and check that it really is mounted afterwards.
pub(crate) async fn mount_fs(console: &Console, host: &str, name: &str) -> Result<(), SamFsError> {
    info!("Mounting {} on {}", name, host);
    console.backend().mount(host, name).await?;
    let fs = console.require_fs(host, name).await?;
    if !fs.state.is_mounted() {
        warn!("{} is still unmounted on {}", name, host);
        return Err(SamFsError::code_only(codes::NO_EFFECT));
    }
    Ok(())
}

/// Delete a SAM file system. Shared file systems are removed from every
/// member and the page waits until the server stops reporting it.
pub(crate) async fn delete_fs(
    console: &Console,
    session: &mut SessionContext,
    name: &str,
    current: Page,
) -> Page {
    let server = session.server.clone();
    let fs = match console.require_fs(&server, name).await {
        Ok(fs) => fs,
        Err(e) => {
            session
                .alert
                .set_backend_error(&resource_string("fs.delete.error", &[]), &e, &server);
            return current;
        }
    };

    info!("Deleting file system {} on {}", name, server);
    let shared = fs.share_status.is_shared();
    let result = if shared {
        console.backend().delete_shared_file_system(&server, name).await
    } else {
        console.backend().delete_file_system(&server, name).await
    };

    let ran = match &result {
        Ok(()) => true,
        Err(e) => e.action_completed(),
    };
    let page = handle_delete_result(session, result, name, current);

    if shared && ran {
        match console.wait_for_fs(&server, name, false).await {
            PollOutcome::Ready => {}
            PollOutcome::TimedOut => session.alert.set_warning(
                &resource_string("fs.delete.pending.summary", &[]),
                &resource_string("fs.delete.pending", &[name]),
            ),
            PollOutcome::Failed(e) => warn!("Polling for {} on {} failed: {}", name, server, e),
        }
    }
    if session.fs_name.as_deref() == Some(name) && page == Page::FsSummary {
        session.fs_name = None;
        session.mount_point = None;
        session.mds = None;
    }
    page
}

async fn view_files(console: &Console, session: &mut SessionContext, name: &str) -> Page {
    let server = session.server.clone();
    match console.require_fs(&server, name).await {
        Ok(fs) => {
            session.select_fs(name);
            session.mount_point = Some(fs.mount_point.clone());
            session.last_used_fs.insert(server, name.to_string());
            session.current_dir = Some(fs.mount_point);
            session.base_path_menu_clicked = false;
            Page::FileBrowser
        }
        Err(e) => {
            session
                .alert
                .set_backend_error(&resource_string("fs.summary.error", &[]), &e, &server);
            Page::FsSummary
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SamQfsBackend;
    use crate::backend::local::Fault;
    use crate::backend::local::tests::SERVER;
    use crate::backend::model::{ArchivingType, FsProduct, MountProperties};
    use crate::console::AlertKind;
    use crate::console::tests::{demo_console, demo_session};

    fn fs(state: FsState, share: ShareStatus) -> FileSystem {
        FileSystem {
            name: "fs1".into(),
            host: "srv".into(),
            product: FsProduct::SamQfs,
            state,
            share_status: share,
            archiving: ArchivingType::Archiving,
            ha: false,
            capacity_kb: 100,
            available_kb: 10,
            mount_point: "/fs1".into(),
            metadata_server: "srv".into(),
            mount_properties: MountProperties {
                hwm: Some(80),
                ..Default::default()
            },
            nfs_shared: false,
            proto_fs: false,
        }
    }

    fn generic(type_name: &str, state: FsState, mount_point: &str) -> GenericFileSystem {
        GenericFileSystem {
            name: "dev".into(),
            host: "srv".into(),
            type_name: type_name.into(),
            state,
            capacity_kb: 100,
            available_kb: 50,
            mount_point: mount_point.into(),
            nfs_shared: false,
        }
    }

    fn sam(api: &str) -> MenuContext {
        MenuContext::new(SetupKind::Sam, api)
    }

    #[test]
    fn test_menu_positions() {
        assert_eq!(menu::position(SetupKind::Sam, menu::SHRINK), 6);
        assert_eq!(menu::position(SetupKind::Sam, menu::DELETE), 7);
        assert_eq!(menu::position(SetupKind::Sam, menu::SCHEDULE_DUMP), 9);
        assert_eq!(menu::position(SetupKind::QfsOnly, menu::SCHEDULE_DUMP), 0);
    }

    #[test]
    fn test_unshared_mounted_archiving() {
        let f = fs(FsState::Mounted, ShareStatus::Unshared);
        assert_eq!(enabled_menu_options(&f, &sam("1.6")), "5,6,1,2,4,8,9");
        assert_eq!(enabled_buttons(SetupKind::Sam, archive_enabled(&f, SetupKind::Sam)), "1,0,2");
    }

    #[test]
    fn test_unshared_unmounted_on_qfs_server() {
        let mut f = fs(FsState::Unmounted, ShareStatus::Unshared);
        f.archiving = ArchivingType::NonArchiving;
        let ctx = MenuContext::new(SetupKind::QfsOnly, "1.6");
        assert_eq!(enabled_menu_options(&f, &ctx), "5,1,2,3,7");
        assert_eq!(enabled_buttons(SetupKind::QfsOnly, false), "0");
    }

    #[test]
    fn test_shared_client() {
        let f = fs(FsState::Mounted, ShareStatus::Client);
        assert_eq!(enabled_menu_options(&f, &sam("1.6")), "1,4");
        assert!(!archive_enabled(&f, SetupKind::Sam));
    }

    #[test]
    fn test_mds_on_older_api() {
        let f = fs(FsState::Mounted, ShareStatus::Mds);
        assert_eq!(enabled_menu_options(&f, &sam("1.5")), "1,4,8,9");

        let f = fs(FsState::Unmounted, ShareStatus::Mds);
        assert_eq!(enabled_menu_options(&f, &sam("1.5")), "1,2,3,7,8");

        let f = fs(FsState::Unmounted, ShareStatus::Unshared);
        assert_eq!(enabled_menu_options(&f, &sam("")), "5,1,2,3,7,8");
    }

    #[test]
    fn test_ha_and_root() {
        let mut f = fs(FsState::Mounted, ShareStatus::Unshared);
        f.ha = true;
        f.mount_point = "/".into();
        assert_eq!(enabled_menu_options(&f, &sam("1.6")), "1,2");

        f.state = FsState::Unmounted;
        assert_eq!(enabled_menu_options(&f, &sam("1.6")), "1,2,3");
    }

    #[test]
    fn test_generic_options() {
        let setup = SetupKind::Sam;
        assert_eq!(enabled_generic_options(&generic("ufs", FsState::Mounted, "/"), setup), "");
        assert_eq!(
            enabled_generic_options(&generic("ufs", FsState::Mounted, "/data"), setup),
            "4"
        );
        assert_eq!(
            enabled_generic_options(&generic("vxfs", FsState::Unmounted, "/vx"), setup),
            "3,7"
        );
        assert_eq!(
            enabled_generic_options(&generic("zfs", FsState::Unmounted, "/z"), setup),
            "7"
        );
        assert_eq!(enabled_generic_options(&generic("zfs", FsState::Mounted, "/z"), setup), "");
    }

    #[test]
    fn test_api_versions() {
        assert!(api_at_least("1.6", "1.6"));
        assert!(api_at_least("1.10", "1.6"));
        assert!(api_at_least("2.0", "1.6"));
        assert!(!api_at_least("1.5", "1.6"));
        assert!(!api_at_least("", "1.6"));
        assert_eq!(MenuContext::new(SetupKind::Sam, " ").api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn test_usage_bar() {
        assert_eq!(UsageBar::new(false, 50, true, Some(80)), UsageBar::Blank);
        assert_eq!(UsageBar::new(true, -1, true, Some(80)), UsageBar::Blank);
        assert_eq!(UsageBar::new(true, 101, false, None), UsageBar::Blank);
        assert_eq!(UsageBar::new(true, 80, true, Some(80)), UsageBar::Red(80));
        assert_eq!(UsageBar::new(true, 80, false, Some(80)), UsageBar::Normal(80));
        assert_eq!(UsageBar::new(true, 30, true, Some(80)).percent(), 30);
    }

    #[test]
    fn test_should_exclude() {
        assert!(!SummaryFilter::All.should_exclude(FsFamily::Zfs, false));
        assert!(!SummaryFilter::Qfs.should_exclude(FsFamily::SamQfs, false));
        assert!(SummaryFilter::Qfs.should_exclude(FsFamily::Ufs, true));
        assert!(SummaryFilter::Ufs.should_exclude(FsFamily::Vxfs, false));
        assert!(!SummaryFilter::Vxfs.should_exclude(FsFamily::Vxfs, false));
        assert!(SummaryFilter::NfsShared.should_exclude(FsFamily::SamQfs, false));
        assert!(!SummaryFilter::NfsShared.should_exclude(FsFamily::Zfs, true));
        assert_eq!(SummaryFilter::parse("nfs"), Some(SummaryFilter::NfsShared));
        assert_eq!(SummaryFilter::parse("7"), None);
    }

    #[tokio::test]
    async fn test_display_rows_and_filter() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();

        let view = display(&console, &mut session).await;
        assert!(session.alert.peek().is_none());
        assert_eq!(view.rows.len(), 6);
        assert!(view.sam_setup);
        let samfs1 = view.rows.iter().find(|r| r.name == "samfs1").unwrap();
        assert_eq!(samfs1.hwm_text, "80");
        assert_eq!(samfs1.dump_schedule, "Repeat every 1 day");
        let ufs = view.rows.iter().find(|r| r.generic && r.mount_point == "/").unwrap();
        assert_eq!(ufs.display_name, "<ufs>");

        session.summary_filter = SummaryFilter::Qfs;
        let view = display(&console, &mut session).await;
        assert_eq!(view.rows.len(), 3);
        assert!(view.rows.iter().all(|r| !r.generic));

        session.summary_filter = SummaryFilter::NfsShared;
        let view = display(&console, &mut session).await;
        let names: Vec<_> = view.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["samfs1", "rpool/export/home"]);
    }

    #[tokio::test]
    async fn test_display_unknown_server() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        session.server = "nohost".into();
        let view = display(&console, &mut session).await;
        assert!(view.rows.is_empty());
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert!(alert.detail[0].contains("nohost"));
    }

    #[tokio::test]
    async fn test_invalid_filter_keeps_previous() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        session.summary_filter = SummaryFilter::Ufs;
        let page = submit(
            &console,
            &mut session,
            SummaryAction::Filter {
                filter: "bogus".into(),
            },
        )
        .await;
        assert_eq!(page, Page::FsSummary);
        assert_eq!(session.summary_filter, SummaryFilter::Ufs);
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Error);
    }

    #[tokio::test]
    async fn test_mount_without_effect() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.inject("mount", Fault::Ignore);

        submit(
            &console,
            &mut session,
            SummaryAction::Mount {
                fs: "qfs1".into(),
                generic: None,
            },
        )
        .await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.code, Some(codes::NO_EFFECT));
        assert_eq!(alert.detail, vec![resource_string("error.-1099", &[])]);

        submit(
            &console,
            &mut session,
            SummaryAction::Menu {
                fs: "qfs1".into(),
                option: menu::MOUNT.to_string(),
                generic: None,
            },
        )
        .await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
        let fs = backend.get_file_system(SERVER, "qfs1").await.unwrap().unwrap();
        assert!(fs.state.is_mounted());
    }

    #[tokio::test]
    async fn test_delete_with_orphaned_policies_returns_to_summary() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.unmount(SERVER, "samfs1").await.unwrap();

        let page = submit(
            &console,
            &mut session,
            SummaryAction::Delete {
                fs: "samfs1".into(),
                generic: None,
            },
        )
        .await;
        assert_eq!(page, Page::FsSummary);
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.summary, resource_string("archiver.config.error", &[]));
    }

    #[tokio::test]
    async fn test_delete_shared_waits_for_removal() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        backend.unmount(SERVER, "sharefs1").await.unwrap();
        backend.unmount("client1", "sharefs1").await.unwrap();

        let page = submit(
            &console,
            &mut session,
            SummaryAction::Menu {
                fs: "sharefs1".into(),
                option: menu::DELETE.to_string(),
                generic: None,
            },
        )
        .await;
        assert_eq!(page, Page::FsSummary);
        let alert = session.alert.take().unwrap();
        // images criteria 1 still applies to samfs1.
        assert_eq!(alert.kind, AlertKind::Warning);
        assert!(backend.get_file_system(SERVER, "sharefs1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_generic() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        submit(
            &console,
            &mut session,
            SummaryAction::Delete {
                fs: "/dev/vx/dsk/dg1/vol1".into(),
                generic: Some("true".into()),
            },
        )
        .await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
        assert!(backend
            .get_generic_file_system(SERVER, "/dev/vx/dsk/dg1/vol1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_view_files_sets_browser_state() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        session.base_path_menu_clicked = true;
        let page = submit(
            &console,
            &mut session,
            SummaryAction::ViewFiles {
                fs: "samfs1".into(),
            },
        )
        .await;
        assert_eq!(page, Page::FileBrowser);
        assert_eq!(session.current_dir.as_deref(), Some("/sam1"));
        assert_eq!(session.last_used_fs.get(SERVER).map(String::as_str), Some("samfs1"));
        assert!(!session.base_path_menu_clicked);
    }

    #[tokio::test]
    async fn test_menu_forwards() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let forward = |option: u8| SummaryAction::Menu {
            fs: "samfs1".into(),
            option: option.to_string(),
            generic: None,
        };
        assert_eq!(
            submit(&console, &mut session, forward(menu::SCHEDULE_DUMP)).await,
            Page::RecoverySchedule("samfs1".into())
        );
        assert_eq!(
            submit(&console, &mut session, forward(menu::EDIT_MOUNT_OPTIONS)).await,
            Page::MountOptions("samfs1".into())
        );
        assert_eq!(
            submit(&console, &mut session, forward(menu::CHECK_FS)).await,
            Page::FsDetails("samfs1".into())
        );
        assert_eq!(session.fs_name.as_deref(), Some("samfs1"));

        let page = submit(
            &console,
            &mut session,
            SummaryAction::Menu {
                fs: "samfs1".into(),
                option: "x".into(),
                generic: None,
            },
        )
        .await;
        assert_eq!(page, Page::FsSummary);
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Error);
    }
}
