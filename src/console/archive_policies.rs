//! Archive policy criteria applied to one file system.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::messages::resource_string;
use super::session::SessionContext;
use super::{Console, Page, developer_bug};
use crate::backend::model::PolicyCriteria;
use crate::error::{SamFsError, codes};

/// Position of a criteria in a reorder request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaKey {
    pub policy: String,
    pub criteria: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriteriaRow {
    pub policy: String,
    pub criteria: u32,
    pub starting_dir: String,
    pub name_pattern: String,
    pub min_size: String,
    pub max_size: String,
    pub access_age: String,
    pub copies: u32,
    pub default_policy: bool,
    pub reorderable: bool,
    /// Order that moves this row one place up, as posted by the reorder
    /// action.
    pub move_up_order: Option<String>,
}

/// One row per criteria that has a policy name.
pub fn criteria_rows(criteria: &[PolicyCriteria]) -> Vec<CriteriaRow> {
    criteria
        .iter()
        .filter_map(|c| {
            let policy = c.policy_name.as_deref()?.trim();
            if policy.is_empty() {
                return None;
            }
            Some(CriteriaRow {
                policy: policy.to_string(),
                criteria: c.criteria_number,
                starting_dir: c.starting_dir.clone(),
                name_pattern: c.name_pattern.clone().unwrap_or_default(),
                min_size: c.min_size.clone().unwrap_or_default(),
                max_size: c.max_size.clone().unwrap_or_default(),
                access_age: c.access_age.clone().unwrap_or_default(),
                copies: c.copies,
                default_policy: c.default_policy,
                reorderable: !c.default_policy,
                move_up_order: None,
            })
        })
        .collect()
}

fn reorderable_keys(rows: &[CriteriaRow]) -> Vec<CriteriaKey> {
    rows.iter()
        .filter(|r| r.reorderable)
        .map(|r| CriteriaKey {
            policy: r.policy.clone(),
            criteria: r.criteria,
        })
        .collect()
}

fn fill_move_up(rows: &mut [CriteriaRow]) {
    let keys = reorderable_keys(rows);
    for (index, row) in rows.iter_mut().filter(|r| r.reorderable).enumerate().skip(1) {
        let mut order = keys.clone();
        order.swap(index - 1, index);
        row.move_up_order = serde_json::to_string(&order).ok();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoliciesView {
    pub fs_name: String,
    pub rows: Vec<CriteriaRow>,
    pub reorder_enabled: bool,
    pub order_json: String,
}

pub async fn display(console: &Console, session: &mut SessionContext, fs_name: &str) -> PoliciesView {
    session.select_fs(fs_name);
    let server = session.server.clone();
    let mut rows = match console.backend().policy_criteria(&server, fs_name).await {
        Ok(criteria) => criteria_rows(&criteria),
        Err(e) => {
            session.alert.set_backend_error(
                &resource_string("policy.load.error", &[fs_name]),
                &e,
                &server,
            );
            Vec::new()
        }
    };
    let keys = reorderable_keys(&rows);
    let reorder_enabled = keys.len() > 1;
    if reorder_enabled {
        fill_move_up(&mut rows);
    }
    PoliciesView {
        fs_name: fs_name.to_string(),
        rows,
        reorder_enabled,
        order_json: serde_json::to_string(&keys).unwrap_or_else(|_| "[]".to_string()),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PolicyAction {
    Remove { policy: String, criteria: String },
    /// `order` is a JSON array of `{policy, criteria}` objects.
    Reorder { order: String },
}

pub async fn submit(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    action: PolicyAction,
) -> Page {
    debug!("Policy action {:?} on {}", action, fs_name);
    session.select_fs(fs_name);
    let current = Page::ArchivePolicies(fs_name.to_string());
    match action {
        PolicyAction::Remove { policy, criteria } => {
            remove(console, session, fs_name, &policy, &criteria).await
        }
        PolicyAction::Reorder { order } => reorder(console, session, fs_name, &order).await,
    }
    current
}

async fn remove(
    console: &Console,
    session: &mut SessionContext,
    fs_name: &str,
    policy: &str,
    criteria: &str,
) {
    let server = session.server.clone();
    let summary = resource_string("policy.remove.error", &[policy, fs_name]);
    let Ok(number) = criteria.trim().parse::<u32>() else {
        developer_bug(session, &summary, "criteria number", criteria);
        return;
    };

    // A missing file system is reported before the criteria lookup.
    if let Err(e) = console.require_fs(&server, fs_name).await {
        session.alert.set_backend_error(&summary, &e, &server);
        return;
    }

    info!("Removing criteria {} of {} from {}", number, policy, fs_name);
    match console
        .backend()
        .remove_policy_criteria(&server, fs_name, policy, number)
        .await
    {
        Ok(()) => session.alert.set_info(
            &resource_string("success.summary", &[]),
            &resource_string("policy.remove.done", &[policy, fs_name]),
        ),
        Err(SamFsError::MultiMsg { code, messages }) => session.alert.set_error(
            &resource_string("archiver.config.error", &[]),
            code,
            Some(&messages.join("\n")),
            &server,
        ),
        Err(SamFsError::Warnings { messages, .. }) => session.alert.set_warning(
            &resource_string("archiver.config.warning", &[]),
            &messages.join("\n"),
        ),
        Err(e) => session.alert.set_backend_error(&summary, &e, &server),
    }
}

async fn reorder(console: &Console, session: &mut SessionContext, fs_name: &str, order: &str) {
    let server = session.server.clone();
    let summary = resource_string("policy.reorder.error", &[fs_name]);
    let keys: Vec<CriteriaKey> = match serde_json::from_str(order) {
        Ok(keys) => keys,
        Err(e) => {
            debug!("Unreadable criteria order: {}", e);
            developer_bug(session, &summary, "criteria order", order);
            return;
        }
    };
    if keys.is_empty() {
        session.alert.set_error(&summary, codes::INVALID_INPUT, None, &server);
        return;
    }
    let order: Vec<(String, u32)> = keys.into_iter().map(|k| (k.policy, k.criteria)).collect();
    let result = console
        .backend()
        .reorder_policy_criteria(&server, fs_name, &order)
        .await;
    super::report(
        session,
        result,
        &resource_string("policy.reorder.done", &[fs_name]),
        &summary,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SamQfsBackend;
    use crate::backend::local::Fault;
    use crate::backend::local::tests::SERVER;
    use crate::console::AlertKind;
    use crate::console::tests::{demo_console, demo_session};

    fn criteria(name: Option<&str>, default_policy: bool) -> PolicyCriteria {
        PolicyCriteria {
            policy_name: name.map(String::from),
            criteria_number: 1,
            starting_dir: ".".into(),
            name_pattern: None,
            min_size: None,
            max_size: None,
            access_age: None,
            copies: 1,
            default_policy,
            file_systems: vec!["samfs1".into()],
        }
    }

    #[test]
    fn test_rows_skip_blank_names() {
        let rows = criteria_rows(&[
            criteria(Some("samfs1"), true),
            criteria(None, false),
            criteria(Some("  "), false),
            criteria(Some("logs"), false),
        ]);
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].reorderable);
        assert!(rows[1].reorderable);
    }

    #[tokio::test]
    async fn test_display_enables_reorder() {
        let (console, _) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "samfs1").await;
        assert_eq!(view.rows.len(), 3);
        assert!(view.reorder_enabled);
        assert!(view.rows[1].move_up_order.is_none());
        assert_eq!(
            view.rows[2].move_up_order.as_deref(),
            Some(r#"[{"policy":"logs","criteria":1},{"policy":"images","criteria":1}]"#)
        );

        let single = display(&console, &mut session, "sharefs1").await;
        assert_eq!(single.rows.len(), 1);
        assert!(!single.reorder_enabled);
    }

    #[tokio::test]
    async fn test_reorder() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        let view = display(&console, &mut session, "samfs1").await;
        let order = view.rows[2].move_up_order.clone().unwrap();

        submit(&console, &mut session, "samfs1", PolicyAction::Reorder { order }).await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);
        let names: Vec<_> = backend
            .policy_criteria(SERVER, "samfs1")
            .await
            .unwrap()
            .into_iter()
            .filter_map(|c| c.policy_name)
            .collect();
        assert_eq!(names, vec!["samfs1", "logs", "images"]);

        submit(
            &console,
            &mut session,
            "samfs1",
            PolicyAction::Reorder {
                order: "logs,images".into(),
            },
        )
        .await;
        assert_eq!(session.alert.take().unwrap().code, Some(codes::INVALID_INPUT));
    }

    #[tokio::test]
    async fn test_remove_outcomes() {
        let (console, backend) = demo_console().await;
        let mut session = demo_session();
        let remove = |policy: &str| PolicyAction::Remove {
            policy: policy.into(),
            criteria: "1".into(),
        };

        submit(&console, &mut session, "samfs1", remove("images")).await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Info);

        submit(&console, &mut session, "samfs1", remove("logs")).await;
        assert_eq!(session.alert.take().unwrap().kind, AlertKind::Warning);

        submit(&console, &mut session, "samfs1", remove("archive9")).await;
        assert_eq!(
            session.alert.take().unwrap().code,
            Some(codes::POLICY_NOT_FOUND)
        );

        submit(&console, &mut session, "gone", remove("images")).await;
        assert_eq!(session.alert.take().unwrap().code, Some(codes::NOT_FOUND));

        backend.inject(
            "remove_policy_criteria",
            Fault::Fail(SamFsError::MultiMsg {
                code: codes::ARCHIVER_CONFIG_ERRORS,
                messages: vec!["archiver.cmd: line 4".into()],
            }),
        );
        submit(&console, &mut session, "sharefs1", remove("images")).await;
        let alert = session.alert.take().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.summary, resource_string("archiver.config.error", &[]));
    }
}
