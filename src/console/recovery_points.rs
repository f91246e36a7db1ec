//! Recovery point (metadata snapshot) schedule and the list of recovery
//! points taken for a file system.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::file_browser::remove_trailing_slashes;
use super::messages::resource_string;
use super::session::SessionContext;
use super::{Console, Page, format_bytes, report};
use crate::backend::model::{DumpFile, RecoveryPointSchedule, TimeUnit};
use crate::error::codes;

/// "Repeat every N unit", flagged when the schedule is disabled.
pub fn schedule_text(schedule: &RecoveryPointSchedule) -> String {
    let mut text = resource_string(
        "schedule.repeat",
        &[
            &schedule.periodicity.to_string(),
            schedule.periodicity_unit.label(schedule.periodicity != 1),
        ],
    );
    if schedule.disabled {
        text.push(' ');
        text.push_str(&resource_string("schedule.disabled", &[]));
    }
    text
}

pub fn retention_text(retention: Option<(u64, TimeUnit)>) -> String {
    match retention {
        Some((n, unit)) => resource_string("schedule.retain", &[&n.to_string(), unit.label(n != 1)]),
        None => resource_string("schedule.retain.forever", &[]),
    }
}

/// Schedule used when a file system has none yet.
fn new_schedule(fs_name: &str) -> RecoveryPointSchedule {
    RecoveryPointSchedule {
        fs_name: fs_name.to_string(),
        location: String::new(),
        name_prefix: fs_name.to_string(),
        compress: true,
        auto_index: false,
        periodicity: 1,
        periodicity_unit: TimeUnit::Days,
        start_hour: 0,
        start_minute: 0,
        retention: None,
        excluded_dirs: Vec::new(),
        pre_script: None,
        post_script: None,
        log_file: None,
        disabled: false,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOption {
    pub value: &'static str,
    pub label: &'static str,
}

fn unit_options() -> Vec<UnitOption> {
    [TimeUnit::Minutes, TimeUnit::Hours, TimeUnit::Days, TimeUnit::Weeks]
        .into_iter()
        .map(|u| UnitOption {
            value: u.as_str(),
            label: u.label(true),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    pub fs_name: String,
    pub exists: bool,
    pub location: String,
    pub name_prefix: String,
    pub compress: bool,
    pub auto_index: bool,
    pub periodicity: u64,
    pub periodicity_unit: &'static str,
    pub start_time: String,
    pub retention_value: String,
    pub retention_unit: &'static str,
    pub excluded_dirs: String,
    pub pre_script: String,
    pub post_script: String,
    pub log_file: String,
    pub enabled: bool,
    pub summary_text: String,
    pub retention_summary: String,
    pub units: Vec<UnitOption>,
}

impl ScheduleView {
    fn new(schedule: &RecoveryPointSchedule, exists: bool) -> Self {
        Self {
            fs_name: schedule.fs_name.clone(),
            exists,
            location: schedule.location.clone(),
            name_prefix: schedule.name_prefix.clone(),
            compress: schedule.compress,
            auto_index: schedule.auto_index,
            periodicity: schedule.periodicity,
            periodicity_unit: schedule.periodicity_unit.as_str(),
            start_time: format!("{:02}:{:02}", schedule.start_hour, schedule.start_minute),
            retention_value: schedule
                .retention
                .map(|(n, _)| n.to_string())
                .unwrap_or_default(),
            retention_unit: schedule
                .retention
                .map(|(_, u)| u.as_str())
                .unwrap_or(TimeUnit::Weeks.as_str()),
            excluded_dirs: schedule.excluded_dirs.join("\n"),
            pre_script: schedule.pre_script.clone().unwrap_or_default(),
            post_script: schedule.post_script.clone().unwrap_or_default(),
            log_file: schedule.log_file.clone().unwrap_or_default(),
            enabled: !schedule.disabled,
            summary_text: if exists {
                schedule_text(schedule)
            } else {
                String::new()
            },
            retention_summary: retention_text(schedule.retention),
            units: unit_options(),
        }
    }
}

pub async fn display_schedule(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
) -> ScheduleView {
    session.select_fs(fs_name);
    let server = session.server.clone();
    match console.backend().recovery_point_schedule(&server, fs_name).await {
        Ok(Some(schedule)) => ScheduleView::new(&schedule, true),
        Ok(None) => ScheduleView::new(&new_schedule(fs_name), false),
        Err(e) => {
            session.alert.set_backend_error(
                &resource_string("schedule.load.error", &[fs_name]),
                &e,
                &server,
            );
            ScheduleView::new(&new_schedule(fs_name), false)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScheduleAction {
    Save {
        location: String,
        #[serde(default)]
        name_prefix: String,
        #[serde(default)]
        compress: Option<String>,
        #[serde(default)]
        auto_index: Option<String>,
        periodicity: String,
        periodicity_unit: String,
        start_time: String,
        #[serde(default)]
        retention_value: String,
        #[serde(default)]
        retention_unit: String,
        #[serde(default)]
        excluded_dirs: String,
        #[serde(default)]
        pre_script: String,
        #[serde(default)]
        post_script: String,
        #[serde(default)]
        log_file: String,
        #[serde(default)]
        enabled: Option<String>,
    },
    ViewRecoveryPoints,
}

fn optional(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn parse_time(text: &str) -> Option<(u8, u8)> {
    let (h, m) = text.trim().split_once(':')?;
    let (h, m): (u8, u8) = (h.parse().ok()?, m.parse().ok()?);
    (h < 24 && m < 60).then_some((h, m))
}

/// Build a schedule from the posted form, or the message naming the first
/// invalid field.
fn parse_schedule(fs_name: &str, action: &ScheduleAction) -> Result<RecoveryPointSchedule, String> {
    let ScheduleAction::Save {
        location,
        name_prefix,
        compress,
        auto_index,
        periodicity,
        periodicity_unit,
        start_time,
        retention_value,
        retention_unit,
        excluded_dirs,
        pre_script,
        post_script,
        log_file,
        enabled,
    } = action
    else {
        return Err(resource_string("error.developer_bug", &["action", "schedule"]));
    };

    let location = remove_trailing_slashes(location);
    if location == "/" || !location.starts_with('/') {
        return Err(resource_string("schedule.invalid.location", &[]));
    }
    let periodicity = match periodicity.trim().parse::<u64>() {
        Ok(n) if n > 0 => n,
        _ => return Err(resource_string("schedule.invalid.periodicity", &[])),
    };
    let periodicity_unit = TimeUnit::parse(periodicity_unit)
        .ok_or_else(|| resource_string("schedule.invalid.unit", &[]))?;
    let (start_hour, start_minute) =
        parse_time(start_time).ok_or_else(|| resource_string("schedule.invalid.start", &[]))?;

    let retention = if retention_value.trim().is_empty() {
        None
    } else {
        let n = match retention_value.trim().parse::<u64>() {
            Ok(n) if n > 0 => n,
            _ => return Err(resource_string("schedule.invalid.retention", &[])),
        };
        let unit = TimeUnit::parse(retention_unit)
            .ok_or_else(|| resource_string("schedule.invalid.unit", &[]))?;
        Some((n, unit))
    };

    let excluded_dirs: Vec<String> = excluded_dirs
        .split(['\n', ','])
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(remove_trailing_slashes)
        .collect();
    if let Some(bad) = excluded_dirs.iter().find(|d| !d.starts_with('/')) {
        return Err(resource_string("schedule.invalid.excluded", &[bad]));
    }

    Ok(RecoveryPointSchedule {
        fs_name: fs_name.to_string(),
        location,
        name_prefix: optional(name_prefix).unwrap_or_else(|| fs_name.to_string()),
        compress: compress.is_some(),
        auto_index: auto_index.is_some(),
        periodicity,
        periodicity_unit,
        start_hour,
        start_minute,
        retention,
        excluded_dirs,
        pre_script: optional(pre_script),
        post_script: optional(post_script),
        log_file: optional(log_file),
        disabled: enabled.is_none(),
    })
}

pub async fn submit_schedule(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    action: ScheduleAction,
) -> Page {
    if matches!(action, ScheduleAction::ViewRecoveryPoints) {
        return Page::RecoveryPoints(fs_name.to_string());
    }
    let server = session.server.clone();
    let schedule = match parse_schedule(fs_name, &action) {
        Ok(schedule) => schedule,
        Err(message) => {
            session.alert.set_error(
                &resource_string("schedule.save.error", &[fs_name]),
                codes::INVALID_INPUT,
                Some(&message),
                &server,
            );
            return Page::RecoverySchedule(fs_name.to_string());
        }
    };

    info!("Saving recovery point schedule for {}", fs_name);
    let result = console
        .backend()
        .set_recovery_point_schedule(&server, &schedule)
        .await;
    report(
        session,
        result,
        &resource_string("schedule.save.done", &[fs_name]),
        &resource_string("schedule.save.error", &[fs_name]),
    );
    Page::RecoverySchedule(fs_name.to_string())
}

/// One recovery point of the table.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryPointRow {
    /// Name relative to the recovery point directory.
    pub name: String,
    pub file_name: String,
    pub compressed_text: String,
    pub indexed_text: String,
    pub date: String,
    pub size_text: String,
    pub entries: u64,
    pub retained_text: String,
    pub retained: bool,
    pub can_index: bool,
    pub can_delete_index: bool,
    pub can_delete: bool,
}

fn yes_no(flag: bool) -> String {
    resource_string(if flag { "common.yes" } else { "common.no" }, &[])
}

impl RecoveryPointRow {
    fn new(dir: &str, dump: &DumpFile) -> Self {
        let name = dump
            .file_name
            .strip_prefix(dir)
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(&dump.file_name)
            .to_string();
        let indexed_text = if dump.broken {
            resource_string("recovery.index.broken", &[])
        } else if dump.processing {
            resource_string("recovery.index.processing", &[])
        } else {
            yes_no(dump.indexed)
        };

        Self {
            name,
            file_name: dump.file_name.clone(),
            compressed_text: yes_no(dump.compressed),
            indexed_text,
            date: dump.modified.format("%Y-%m-%d %H:%M").to_string(),
            size_text: format_bytes(dump.size_bytes),
            entries: dump.entries,
            retained_text: if dump.locked {
                resource_string("common.yes", &[])
            } else {
                String::new()
            },
            retained: dump.locked,
            can_index: !dump.indexed && !dump.processing && !dump.broken,
            can_delete_index: dump.indexed && !dump.processing,
            can_delete: !dump.processing && !dump.locked,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryPointsView {
    pub fs_name: String,
    pub dir: String,
    pub rows: Vec<RecoveryPointRow>,
    /// Names of the listed recovery points, for the page scripts.
    pub names_json: String,
    pub schedule_text: String,
}

/// Directory listed when the session has none: the schedule location.
async fn default_dir(console: &Console, server: &str, fs_name: &str) -> Option<String> {
    match console.backend().recovery_point_schedule(server, fs_name).await {
        Ok(Some(schedule)) => Some(schedule.location),
        Ok(None) => None,
        Err(e) => {
            debug!("No recovery point schedule for {}: {}", fs_name, e);
            None
        }
    }
}

pub async fn display(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
) -> RecoveryPointsView {
    session.select_fs(fs_name);
    let server = session.server.clone();
    if session.recovery_point_dir.is_none() {
        session.recovery_point_dir = default_dir(console, &server, fs_name).await;
    }

    let mut view = RecoveryPointsView {
        fs_name: fs_name.to_string(),
        dir: session.recovery_point_dir.clone().unwrap_or_default(),
        rows: Vec::new(),
        names_json: "[]".to_string(),
        schedule_text: String::new(),
    };
    if let Ok(Some(schedule)) = console.backend().recovery_point_schedule(&server, fs_name).await
    {
        view.schedule_text = schedule_text(&schedule);
    }
    if view.dir.is_empty() {
        return view;
    }

    match console.backend().dump_files(&server, fs_name, &view.dir).await {
        Ok(dumps) => {
            view.rows = dumps
                .iter()
                .map(|d| RecoveryPointRow::new(&view.dir, d))
                .collect();
            let names: Vec<&str> = view.rows.iter().map(|r| r.name.as_str()).collect();
            view.names_json = serde_json::to_string(&names).unwrap_or_else(|_| "[]".into());
        }
        Err(e) => session.alert.set_backend_error(
            &resource_string("recovery.list.error", &[&view.dir]),
            &e,
            &server,
        ),
    }
    view
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryPointAction {
    CreateIndex { dump: String },
    DeleteIndex { dump: String },
    DeleteDump { dump: String },
    Retain { dump: String },
    Release { dump: String },
    SetPath { path: String },
    EditSchedule,
}

async fn set_retained(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    dump: &str,
    retain: bool,
) {
    let server = session.server.clone();
    let result = console
        .backend()
        .set_dump_retained(&server, fs_name, dump, retain)
        .await;
    let done = if retain {
        "recovery.retain.done"
    } else {
        "recovery.release.done"
    };
    report(
        session,
        result,
        &resource_string(done, &[dump]),
        &resource_string("recovery.retain.error", &[dump]),
    );
}

pub async fn submit(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    action: RecoveryPointAction,
) -> Page {
    debug!("Recovery point action {:?}", action);
    session.select_fs(fs_name);
    let server = session.server.clone();
    let page = Page::RecoveryPoints(fs_name.to_string());
    match action {
        RecoveryPointAction::CreateIndex { dump } => {
            match console
                .backend()
                .enable_dump_for_use(&server, fs_name, &dump)
                .await
            {
                Ok(job) if job > 0 => session.alert.set_info(
                    &resource_string("success.summary", &[]),
                    &resource_string("recovery.index.job", &[&dump, &job.to_string()]),
                ),
                Ok(_) => session.alert.set_info(
                    &resource_string("success.summary", &[]),
                    &resource_string("recovery.index.done", &[&dump]),
                ),
                Err(e) => session.alert.set_backend_error(
                    &resource_string("recovery.index.error", &[&dump]),
                    &e,
                    &server,
                ),
            }
        }
        RecoveryPointAction::DeleteIndex { dump } => {
            let result = console.backend().clean_dump(&server, fs_name, &dump).await;
            report(
                session,
                result,
                &resource_string("recovery.unindex.done", &[&dump]),
                &resource_string("recovery.unindex.error", &[&dump]),
            );
        }
        RecoveryPointAction::DeleteDump { dump } => {
            let result = console.backend().delete_dump(&server, fs_name, &dump).await;
            report(
                session,
                result,
                &resource_string("recovery.delete.done", &[&dump]),
                &resource_string("recovery.delete.error", &[&dump]),
            );
        }
        RecoveryPointAction::Retain { dump } => {
            set_retained(console, session, fs_name, &dump, true).await;
        }
        RecoveryPointAction::Release { dump } => {
            set_retained(console, session, fs_name, &dump, false).await;
        }
        RecoveryPointAction::SetPath { path } => {
            let path = remove_trailing_slashes(&path);
            if path.starts_with('/') {
                session.recovery_point_dir = Some(path);
            } else {
                session.alert.set_error(
                    &resource_string("recovery.list.error", &[&path]),
                    codes::INVALID_INPUT,
                    Some(&resource_string("schedule.invalid.location", &[])),
                    &server,
                );
            }
        }
        RecoveryPointAction::EditSchedule => return Page::RecoverySchedule(fs_name.to_string()),
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SamQfsBackend;
    use crate::backend::local::tests::SERVER;
    use crate::console::AlertKind;
    use crate::console::tests::{demo_console, demo_session};

    fn save_form(location: &str, periodicity: &str, start_time: &str) -> ScheduleAction {
        ScheduleAction::Save {
            location: location.into(),
            name_prefix: String::new(),
            compress: Some("on".into()),
            auto_index: None,
            periodicity: periodicity.into(),
            periodicity_unit: "hours".into(),
            start_time: start_time.into(),
            retention_value: "3".into(),
            retention_unit: "days".into(),
            excluded_dirs: "/qfs1/tmp\n\n/qfs1/scratch/".into(),
            pre_script: String::new(),
            post_script: String::new(),
            log_file: " ".into(),
            enabled: None,
        }
    }

    #[test]
    fn test_schedule_text() {
        let mut schedule = new_schedule("samfs1");
        assert_eq!(schedule_text(&schedule), "Repeat every 1 day");
        schedule.periodicity = 6;
        schedule.periodicity_unit = TimeUnit::Hours;
        schedule.disabled = true;
        assert_eq!(schedule_text(&schedule), "Repeat every 6 hours (disabled)");
    }

    #[test]
    fn test_parse_schedule() {
        let schedule = parse_schedule("qfs1", &save_form("/dumps/", "6", "23:15")).unwrap();
        assert_eq!(schedule.location, "/dumps");
        assert_eq!(schedule.name_prefix, "qfs1");
        assert_eq!((schedule.start_hour, schedule.start_minute), (23, 15));
        assert_eq!(schedule.retention, Some((3, TimeUnit::Days)));
        assert_eq!(schedule.excluded_dirs, vec!["/qfs1/tmp", "/qfs1/scratch"]);
        assert!(schedule.disabled);
        assert!(schedule.log_file.is_none());

        assert!(parse_schedule("qfs1", &save_form("dumps", "6", "23:15")).is_err());
        assert!(parse_schedule("qfs1", &save_form("/dumps", "0", "23:15")).is_err());
        assert!(parse_schedule("qfs1", &save_form("/dumps", "6", "24:00")).is_err());
        assert!(parse_schedule("qfs1", &save_form("/dumps", "6", "noon")).is_err());
    }

    #[tokio::test]
    async fn test_save_schedule() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();

        let view = display_schedule(&console, &mut session, "qfs1").await;
        assert!(!view.exists);

        let page = submit_schedule(&console, &mut session, "qfs1", save_form("/dumps", "6", "1:05")).await;
        assert_eq!(page, Page::RecoverySchedule("qfs1".into()));
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
        let saved = backend
            .recovery_point_schedule(SERVER, "qfs1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.periodicity, 6);

        let view = display_schedule(&console, &mut session, "qfs1").await;
        assert_eq!(view.start_time, "01:05");
        assert_eq!(view.summary_text, "Repeat every 6 hours (disabled)");

        submit_schedule(&console, &mut session, "qfs1", save_form("/dumps", "x", "1:05")).await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.code, Some(codes::INVALID_INPUT));
    }

    #[tokio::test]
    async fn test_rows_relative_to_dir() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "samfs1").await;
        assert_eq!(view.dir, "/sam1_dumps");
        assert_eq!(view.rows.len(), 3);
        assert!(view.rows.iter().all(|r| r.name.starts_with("samfs1-")));
        assert!(view.names_json.starts_with("[\"samfs1-"));

        let unindexed: Vec<_> = view.rows.iter().filter(|r| r.can_index).collect();
        assert_eq!(unindexed.len(), 1);
        assert_eq!(unindexed[0].indexed_text, "No");
        assert_eq!(view.rows.iter().filter(|r| !r.can_delete).count(), 1);
    }

    #[tokio::test]
    async fn test_create_index_job_and_delete() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "samfs1").await;
        let dump = view.rows.iter().find(|r| r.can_index).unwrap().file_name.clone();

        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::CreateIndex { dump: dump.clone() },
        )
        .await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Info);
        assert_eq!(alert.detail[0], resource_string("recovery.index.job", &[&dump, "1"]));

        let view = display(&console, &mut session, "samfs1").await;
        let row = view.rows.iter().find(|r| r.file_name == dump).unwrap();
        assert_eq!(row.indexed_text, resource_string("recovery.index.processing", &[]));

        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::DeleteDump { dump },
        )
        .await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Error);
    }

    #[tokio::test]
    async fn test_index_already_indexed_is_done() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "samfs1").await;
        let dump = view.rows.iter().find(|r| r.can_delete_index).unwrap().file_name.clone();

        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::CreateIndex { dump: dump.clone() },
        )
        .await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.detail[0], resource_string("recovery.index.done", &[&dump]));

        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::DeleteIndex { dump },
        )
        .await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
    }

    #[tokio::test]
    async fn test_set_path() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        session.select_fs("sharefs1");
        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::SetPath {
                path: "/elsewhere/".into(),
            },
        )
        .await;
        assert_eq!(session.recovery_point_dir.as_deref(), Some("/elsewhere"));
        let view = display(&console, &mut session, "samfs1").await;
        assert_eq!(view.dir, "/elsewhere");
        assert!(view.rows.is_empty());

        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::SetPath {
                path: "relative".into(),
            },
        )
        .await;
        assert_eq!(session.recovery_point_dir.as_deref(), Some("/elsewhere"));
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Error);
    }

    #[tokio::test]
    async fn test_retain_and_release() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "samfs1").await;
        let dump = view.rows.iter().find(|r| !r.retained).unwrap().file_name.clone();

        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::Retain { dump: dump.clone() },
        )
        .await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Info);
        assert_eq!(alert.detail, vec![resource_string("recovery.retain.done", &[&dump])]);
        let view = display(&console, &mut session, "samfs1").await;
        let row = view.rows.iter().find(|r| r.file_name == dump).unwrap();
        assert!(row.retained);
        assert!(!row.can_delete);

        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::Release { dump: dump.clone() },
        )
        .await;
        assert_eq!(
            session.alert.take().unwrap().detail,
            vec![resource_string("recovery.release.done", &[&dump])]
        );
        let view = display(&console, &mut session, "samfs1").await;
        assert!(view.rows.iter().find(|r| r.file_name == dump).unwrap().can_delete);

        submit(
            &console,
            &mut session,
            "samfs1",
            RecoveryPointAction::Retain {
                dump: "/sam1_dumps/missing.dmp".into(),
            },
        )
        .await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Error);
    }
}
