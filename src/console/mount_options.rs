//! Mount options editor.
//!
//! The page layout depends on the product and on whether the file system is
//! shared. Shared clients only edit the basic and general sections.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::messages::resource_string;
use super::session::SessionContext;
use super::{Console, Page, report};
use crate::backend::model::{
    ArchivingType, FileSystem, FsProduct, FsState, MountProperties, ShareStatus,
};
use crate::error::codes;

/// Layout of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountPageType {
    UnsharedSamQfs,
    UnsharedQfs,
    UnsharedSamFs,
    SharedSamQfs,
    SharedQfs,
}

impl MountPageType {
    pub fn of(fs: &FileSystem) -> Self {
        let shared = fs.share_status.is_shared();
        match (shared, fs.product) {
            (false, FsProduct::Qfs) => MountPageType::UnsharedQfs,
            (false, FsProduct::SamFs) => MountPageType::UnsharedSamFs,
            (false, FsProduct::SamQfs) => MountPageType::UnsharedSamQfs,
            (true, FsProduct::Qfs) => MountPageType::SharedQfs,
            (true, _) => MountPageType::SharedSamQfs,
        }
    }

    pub fn is_archiving(self) -> bool {
        !matches!(self, MountPageType::UnsharedQfs | MountPageType::SharedQfs)
    }

    pub fn is_shared(self) -> bool {
        matches!(self, MountPageType::SharedSamQfs | MountPageType::SharedQfs)
    }

    pub fn label(self) -> String {
        let key = match self {
            MountPageType::UnsharedSamQfs => "mount.type.unshared_samqfs",
            MountPageType::UnsharedQfs => "mount.type.unshared_qfs",
            MountPageType::UnsharedSamFs => "mount.type.unshared_samfs",
            MountPageType::SharedSamQfs => "mount.type.shared_samqfs",
            MountPageType::SharedQfs => "mount.type.shared_qfs",
        };
        resource_string(key, &[])
    }
}

/// Property sections of the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Sections {
    pub basic: bool,
    pub general: bool,
    pub performance: bool,
    pub archive: bool,
    pub shared: bool,
    /// Quick write does not apply to SAM-FS.
    pub quick_write: bool,
    /// Stage flush behind only applies to archiving file systems.
    pub stage_flush: bool,
}

impl Sections {
    pub fn new(page: MountPageType, role: ShareStatus) -> Self {
        let client = role == ShareStatus::Client;
        Self {
            basic: true,
            general: true,
            performance: !client,
            archive: page.is_archiving() && !client,
            shared: page.is_shared() && !client,
            quick_write: page != MountPageType::UnsharedSamFs,
            stage_flush: page.is_archiving(),
        }
    }
}

fn num(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, Serialize)]
pub struct MountOptionsView {
    pub fs_name: String,
    pub host: String,
    pub found: bool,
    pub page_label: String,
    pub role_label: String,
    pub mounted: bool,
    pub sections: Sections,
    /// Watermarks are only shown for archiving file systems.
    pub archiving: bool,
    pub hwm: String,
    pub lwm: String,
    pub stripe_width: String,
    pub trace: bool,
    pub read_only: bool,
    pub no_setuid: bool,
    pub quick_write: bool,
    pub readahead_kb: String,
    pub writebehind_kb: String,
    pub write_throttle_kb: String,
    pub flush_behind_kb: String,
    pub stage_flush_behind_kb: String,
    pub partial_release_kb: String,
    pub max_partial_kb: String,
    pub mount_in_background: bool,
    pub mount_retries: String,
    pub metadata_refresh_secs: String,
    pub min_pool: String,
    pub read_lease_secs: String,
    pub write_lease_secs: String,
    pub append_lease_secs: String,
    pub lease_timeout_secs: String,
    pub multi_host_write: bool,
    pub synchronized_metadata: bool,
    pub consistency_checking: bool,
}

impl MountOptionsView {
    fn new(fs: &FileSystem) -> Self {
        let page = MountPageType::of(fs);
        let p = &fs.mount_properties;
        Self {
            fs_name: fs.name.clone(),
            host: fs.host.clone(),
            found: true,
            page_label: page.label(),
            role_label: resource_string(
                &format!("fs.role.{}", super::fs_summary::share_key(fs.share_status)),
                &[],
            ),
            mounted: fs.state.is_mounted(),
            sections: Sections::new(page, fs.share_status),
            archiving: page.is_archiving(),
            hwm: num(p.hwm),
            lwm: num(p.lwm),
            stripe_width: num(p.stripe_width),
            trace: p.trace,
            read_only: p.read_only,
            no_setuid: p.no_setuid,
            quick_write: p.quick_write,
            readahead_kb: num(p.readahead_kb),
            writebehind_kb: num(p.writebehind_kb),
            write_throttle_kb: num(p.write_throttle_kb),
            flush_behind_kb: num(p.flush_behind_kb),
            stage_flush_behind_kb: num(p.stage_flush_behind_kb),
            partial_release_kb: num(p.partial_release_kb),
            max_partial_kb: num(p.max_partial_kb),
            mount_in_background: p.mount_in_background,
            mount_retries: num(p.mount_retries),
            metadata_refresh_secs: num(p.metadata_refresh_secs),
            min_pool: num(p.min_pool),
            read_lease_secs: num(p.read_lease_secs),
            write_lease_secs: num(p.write_lease_secs),
            append_lease_secs: num(p.append_lease_secs),
            lease_timeout_secs: num(p.lease_timeout_secs),
            multi_host_write: p.multi_host_write,
            synchronized_metadata: p.synchronized_metadata,
            consistency_checking: p.consistency_checking,
        }
    }

    fn missing(fs_name: &str, host: &str) -> Self {
        let mut view = Self::new(&FileSystem {
            name: fs_name.to_string(),
            host: host.to_string(),
            product: FsProduct::Qfs,
            state: FsState::Unmounted,
            share_status: ShareStatus::Unshared,
            archiving: ArchivingType::NonArchiving,
            ha: false,
            capacity_kb: 0,
            available_kb: 0,
            mount_point: String::new(),
            metadata_server: String::new(),
            mount_properties: MountProperties::default(),
            nfs_shared: false,
            proto_fs: false,
        });
        view.found = false;
        view.sections = Sections::default();
        view
    }
}

fn editing_host(session: &SessionContext) -> String {
    session
        .mount_options_host
        .clone()
        .unwrap_or_else(|| session.server.clone())
}

pub async fn display(console: &Console, session: &mut SessionContext, fs_name: &str) -> MountOptionsView {
    if session.fs_name.as_deref() != Some(fs_name) {
        session.select_fs(fs_name);
    }
    let host = editing_host(session);
    match console.require_fs(&host, fs_name).await {
        Ok(fs) => MountOptionsView::new(&fs),
        Err(e) => {
            let server = session.server.clone();
            session.alert.set_backend_error(
                &resource_string("mount.load.error", &[fs_name, &host]),
                &e,
                &server,
            );
            MountOptionsView::missing(fs_name, &host)
        }
    }
}

/// Posted editor fields. Every numeric field is text; an empty field unsets
/// the option. Check boxes are present only when checked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MountOptionsForm {
    pub hwm: String,
    pub lwm: String,
    pub stripe_width: String,
    pub trace: Option<String>,
    pub read_only: Option<String>,
    pub no_setuid: Option<String>,
    pub quick_write: Option<String>,
    pub readahead_kb: String,
    pub writebehind_kb: String,
    pub write_throttle_kb: String,
    pub flush_behind_kb: String,
    pub stage_flush_behind_kb: String,
    pub partial_release_kb: String,
    pub max_partial_kb: String,
    pub mount_in_background: Option<String>,
    pub mount_retries: String,
    pub metadata_refresh_secs: String,
    pub min_pool: String,
    pub read_lease_secs: String,
    pub write_lease_secs: String,
    pub append_lease_secs: String,
    pub lease_timeout_secs: String,
    pub multi_host_write: Option<String>,
    pub synchronized_metadata: Option<String>,
    pub consistency_checking: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MountOptionsAction {
    Save(MountOptionsForm),
    Cancel,
}

/// Parse an optional numeric field. `Err` carries the message for the user.
fn parse_field(text: &str, label_key: &str) -> Result<Option<u32>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<u32>().map(Some).map_err(|_| {
        resource_string("mount.invalid.number", &[&resource_string(label_key, &[]), text])
    })
}

/// Apply the visible sections of `form` to `props`. Hidden sections keep
/// their current values.
pub fn apply_form(
    form: &MountOptionsForm,
    sections: Sections,
    page: MountPageType,
    props: &mut MountProperties,
) -> Result<(), String> {
    if sections.basic {
        if page.is_archiving() {
            props.hwm = parse_field(&form.hwm, "mount.field.hwm")?;
            props.lwm = parse_field(&form.lwm, "mount.field.lwm")?;
        }
        props.stripe_width = parse_field(&form.stripe_width, "mount.field.stripe_width")?;
    }
    if sections.general {
        props.trace = form.trace.is_some();
        props.read_only = form.read_only.is_some();
        props.no_setuid = form.no_setuid.is_some();
        if sections.quick_write {
            props.quick_write = form.quick_write.is_some();
        }
    }
    if sections.performance {
        props.readahead_kb = parse_field(&form.readahead_kb, "mount.field.readahead")?;
        props.writebehind_kb = parse_field(&form.writebehind_kb, "mount.field.writebehind")?;
        props.write_throttle_kb =
            parse_field(&form.write_throttle_kb, "mount.field.write_throttle")?;
        props.flush_behind_kb = parse_field(&form.flush_behind_kb, "mount.field.flush_behind")?;
        if sections.stage_flush {
            props.stage_flush_behind_kb =
                parse_field(&form.stage_flush_behind_kb, "mount.field.stage_flush_behind")?;
        }
    }
    if sections.archive {
        props.partial_release_kb =
            parse_field(&form.partial_release_kb, "mount.field.partial_release")?;
        props.max_partial_kb = parse_field(&form.max_partial_kb, "mount.field.max_partial")?;
    }
    if sections.shared {
        props.mount_in_background = form.mount_in_background.is_some();
        props.mount_retries = parse_field(&form.mount_retries, "mount.field.mount_retries")?;
        props.metadata_refresh_secs =
            parse_field(&form.metadata_refresh_secs, "mount.field.metadata_refresh")?;
        props.min_pool = parse_field(&form.min_pool, "mount.field.min_pool")?;
        props.read_lease_secs = parse_field(&form.read_lease_secs, "mount.field.read_lease")?;
        props.write_lease_secs = parse_field(&form.write_lease_secs, "mount.field.write_lease")?;
        props.append_lease_secs =
            parse_field(&form.append_lease_secs, "mount.field.append_lease")?;
        props.lease_timeout_secs =
            parse_field(&form.lease_timeout_secs, "mount.field.lease_timeout")?;
        props.multi_host_write = form.multi_host_write.is_some();
        props.synchronized_metadata = form.synchronized_metadata.is_some();
        props.consistency_checking = form.consistency_checking.is_some();
    }
    validate(props)
}

/// Watermarks are percentages and the low one must stay below the high one.
pub fn validate(props: &MountProperties) -> Result<(), String> {
    for (value, key) in [(props.hwm, "mount.field.hwm"), (props.lwm, "mount.field.lwm")] {
        if let Some(v) = value
            && v > 100
        {
            return Err(resource_string(
                "mount.invalid.percent",
                &[&resource_string(key, &[])],
            ));
        }
    }
    if let (Some(hwm), Some(lwm)) = (props.hwm, props.lwm)
        && lwm >= hwm
    {
        return Err(resource_string("mount.invalid.watermarks", &[]));
    }
    Ok(())
}

/// Page the editor returns to.
fn back_page(session: &SessionContext, fs_name: &str) -> Page {
    if session.mount_options_host.is_some() {
        Page::SharedFs(fs_name.to_string())
    } else {
        Page::FsDetails(fs_name.to_string())
    }
}

pub async fn submit(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    action: MountOptionsAction,
) -> Page {
    let form = match action {
        MountOptionsAction::Save(form) => form,
        MountOptionsAction::Cancel => return back_page(session, fs_name),
    };
    let current = Page::MountOptions(fs_name.to_string());
    let server = session.server.clone();
    let host = editing_host(session);
    let summary = resource_string("mount.save.error", &[fs_name, &host]);

    let fs = match console.require_fs(&host, fs_name).await {
        Ok(fs) => fs,
        Err(e) => {
            session.alert.set_backend_error(&summary, &e, &server);
            return current;
        }
    };

    let page = MountPageType::of(&fs);
    let sections = Sections::new(page, fs.share_status);
    let mut props = fs.mount_properties.clone();
    if let Err(message) = apply_form(&form, sections, page, &mut props) {
        debug!("Rejected mount options for {}: {}", fs_name, message);
        session
            .alert
            .set_error(&summary, codes::INVALID_INPUT, Some(&message), &server);
        return current;
    }

    info!("Saving mount options of {} on {}", fs_name, host);
    let result = match fs.share_status {
        ShareStatus::Mds | ShareStatus::Pmds => {
            console
                .backend()
                .set_shared_mount_options(&host, fs_name, &props)
                .await
        }
        ShareStatus::Unshared | ShareStatus::Client => {
            console
                .backend()
                .change_mount_options(&host, fs_name, &props)
                .await
        }
    };
    report(
        session,
        result,
        &resource_string("mount.save.done", &[fs_name, &host]),
        &summary,
    );
    current
}
