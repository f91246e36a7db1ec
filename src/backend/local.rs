use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::SamQfsBackend;
use super::model::{
    AddMemberRequest, AttributeMode, ChangeAttributesRequest, DirectoryListing, DumpFile,
    FileEntry, FileSystem, FsState, GenericFileSystem, MemberType, MountProperties,
    PolicyCriteria, RecoveryPointSchedule, ServerInfo, ShareStatus, SharedMember, attr,
};
use crate::error::{BackendResult, HostFailure, SamFsError, codes};
use crate::state::{InventoryState, StateManager};

/// Index builds over this many entries run as background jobs.
const INLINE_INDEX_LIMIT: u64 = 10_000;

/// How long simulated background jobs run.
const JOB_DURATION_SECS: i64 = 30;

/// Backend that serves the inventory kept by [`StateManager`].
pub struct LocalBackend {
    state: Arc<StateManager>,
    #[cfg(test)]
    faults: std::sync::Mutex<Vec<(&'static str, Fault)>>,
}

/// Injected outcome for the next call of an operation.
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum Fault {
    Fail(SamFsError),
    /// Report success without changing anything.
    Ignore,
}

impl LocalBackend {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self {
            state,
            #[cfg(test)]
            faults: std::sync::Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub fn inject(&self, op: &'static str, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push((op, fault));
        }
    }

    #[cfg(test)]
    fn intercept(&self, op: &str) -> Option<BackendResult<()>> {
        let mut faults = self.faults.lock().ok()?;
        let pos = faults.iter().position(|(name, _)| *name == op)?;
        match faults.remove(pos).1 {
            Fault::Fail(e) => Some(Err(e)),
            Fault::Ignore => Some(Ok(())),
        }
    }

    #[cfg(not(test))]
    fn intercept(&self, _op: &str) -> Option<BackendResult<()>> {
        None
    }

    /// Finish elapsed jobs, flagging their recovery points as indexed.
    async fn reap_jobs(&self) -> BackendResult<()> {
        let now = Utc::now();
        let pending = self
            .state
            .read(|s| s.jobs.iter().any(|j| j.finishes <= now))
            .await;
        if !pending {
            return Ok(());
        }

        self.state
            .apply(|s| {
                for job in s.reap_jobs(now) {
                    debug!("Job {} ({}) finished", job.id, job.kind);
                    if let Some(target) = job.target
                        && let Some(dump) = s
                            .dumps
                            .get_mut(&job.fs_name)
                            .and_then(|d| d.iter_mut().find(|d| d.file_name == target))
                    {
                        dump.processing = false;
                        dump.indexed = true;
                    }
                }
                Ok(())
            })
            .await
    }
}

fn require_server<'a>(state: &'a InventoryState, server: &str) -> BackendResult<&'a ServerInfo> {
    state.server(server).ok_or_else(|| {
        SamFsError::with_message(codes::SERVER_DOWN, format!("Cannot connect to {}", server))
    })
}

fn require_fs<'a>(
    state: &'a mut InventoryState,
    server: &str,
    name: &str,
) -> BackendResult<&'a mut FileSystem> {
    state
        .file_system_mut(server, name)
        .ok_or_else(SamFsError::not_found)
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

fn is_under(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return path.starts_with('/') && path != "/";
    }
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn criteria_label(c: &PolicyCriteria) -> String {
    format!(
        "{} criteria {}",
        c.policy_name.as_deref().unwrap_or("(unnamed)"),
        c.criteria_number
    )
}

/// Detach `fs_name` from every archive criteria. Criteria that no longer apply
/// to any file system are dropped and reported as configuration errors;
/// criteria still applied elsewhere are reported as warnings.
fn detach_policies(state: &mut InventoryState, fs_name: &str) -> BackendResult<()> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    state.policies.retain_mut(|c| {
        if !c.file_systems.iter().any(|f| f == fs_name) {
            return true;
        }
        c.file_systems.retain(|f| f != fs_name);
        if c.default_policy {
            return !c.file_systems.is_empty();
        }
        if c.file_systems.is_empty() {
            errors.push(format!("{} no longer applies to any file system", criteria_label(c)));
            false
        } else {
            warnings.push(format!("{} no longer applies to {}", criteria_label(c), fs_name));
            true
        }
    });

    if !errors.is_empty() {
        return Err(SamFsError::MultiMsg {
            code: codes::ARCHIVER_CONFIG_ERRORS,
            messages: errors,
        });
    }
    if !warnings.is_empty() {
        return Err(SamFsError::Warnings {
            code: codes::ARCHIVER_CONFIG_WARNINGS,
            messages: warnings,
        });
    }
    Ok(())
}

#[async_trait]
impl SamQfsBackend for LocalBackend {
    async fn server_info(&self, server: &str) -> BackendResult<ServerInfo> {
        self.state
            .read(|s| require_server(s, server).cloned())
            .await
    }

    async fn list_file_systems(&self, server: &str) -> BackendResult<Vec<FileSystem>> {
        self.state
            .read(|s| {
                require_server(s, server)?;
                Ok(s.file_systems
                    .iter()
                    .filter(|f| f.host == server)
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn list_generic_file_systems(
        &self,
        server: &str,
    ) -> BackendResult<Vec<GenericFileSystem>> {
        self.state
            .read(|s| {
                require_server(s, server)?;
                Ok(s.generic_file_systems
                    .iter()
                    .filter(|f| f.host == server)
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn get_file_system(&self, server: &str, name: &str) -> BackendResult<Option<FileSystem>> {
        self.state
            .read(|s| {
                require_server(s, server)?;
                Ok(s.file_system(server, name).cloned())
            })
            .await
    }

    async fn get_generic_file_system(
        &self,
        server: &str,
        name: &str,
    ) -> BackendResult<Option<GenericFileSystem>> {
        self.state
            .read(|s| {
                require_server(s, server)?;
                Ok(s.generic_file_system(server, name).cloned())
            })
            .await
    }

    async fn mount(&self, server: &str, name: &str) -> BackendResult<()> {
        if let Some(r) = self.intercept("mount") {
            return r;
        }
        info!("Mounting {} on {}", name, server);
        self.state
            .apply(|s| {
                let fs = require_fs(s, server, name)?;
                fs.state = FsState::Mounted;
                if let Some(member) = s
                    .shared_members
                    .get_mut(name)
                    .and_then(|m| m.iter_mut().find(|m| m.host == server))
                {
                    member.state = FsState::Mounted;
                }
                Ok(())
            })
            .await
    }

    async fn unmount(&self, server: &str, name: &str) -> BackendResult<()> {
        if let Some(r) = self.intercept("unmount") {
            return r;
        }
        info!("Unmounting {} on {}", name, server);
        self.state
            .apply(|s| {
                let fs = require_fs(s, server, name)?;
                if fs.mount_point == "/" {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "Cannot unmount the root file system",
                    ));
                }
                fs.state = FsState::Unmounted;
                if let Some(member) = s
                    .shared_members
                    .get_mut(name)
                    .and_then(|m| m.iter_mut().find(|m| m.host == server))
                {
                    member.state = FsState::Unmounted;
                }
                Ok(())
            })
            .await
    }

    async fn mount_generic(&self, server: &str, name: &str) -> BackendResult<()> {
        info!("Mounting {} on {}", name, server);
        self.state
            .apply(|s| {
                let fs = s
                    .generic_file_system_mut(server, name)
                    .ok_or_else(SamFsError::not_found)?;
                fs.state = FsState::Mounted;
                Ok(())
            })
            .await
    }

    async fn unmount_generic(&self, server: &str, name: &str) -> BackendResult<()> {
        info!("Unmounting {} on {}", name, server);
        self.state
            .apply(|s| {
                let fs = s
                    .generic_file_system_mut(server, name)
                    .ok_or_else(SamFsError::not_found)?;
                if fs.mount_point == "/" {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "Cannot unmount the root file system",
                    ));
                }
                fs.state = FsState::Unmounted;
                Ok(())
            })
            .await
    }

    async fn delete_file_system(&self, server: &str, name: &str) -> BackendResult<()> {
        if let Some(r) = self.intercept("delete_file_system") {
            return r;
        }
        info!("Deleting file system {} on {}", name, server);
        self.state
            .apply(|s| {
                let fs = require_fs(s, server, name)?;
                if fs.state.is_mounted() {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        format!("{} is mounted", name),
                    ));
                }
                s.file_systems
                    .retain(|f| !(f.host == server && f.name == name));
                s.schedules.retain(|sc| sc.fs_name != name);
                s.dumps.remove(name);
                detach_policies(s, name)
            })
            .await
    }

    async fn delete_shared_file_system(&self, server: &str, name: &str) -> BackendResult<()> {
        if let Some(r) = self.intercept("delete_shared_file_system") {
            return r;
        }
        info!("Deleting shared file system {} from {}", name, server);
        self.state
            .apply(|s| {
                let fs = require_fs(s, server, name)?;
                if fs.share_status != ShareStatus::Mds {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "Shared file systems are deleted from the metadata server",
                    ));
                }
                if fs.state.is_mounted() {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        format!("{} is mounted on {}", name, server),
                    ));
                }

                let members = s.shared_members.remove(name).unwrap_or_default();
                let mut failures = Vec::new();
                let mut remaining = Vec::new();
                for member in members {
                    if member.host != server
                        && s.file_system(&member.host, name)
                            .is_some_and(|f| f.state.is_mounted())
                    {
                        warn!("{} still mounted on {}", name, member.host);
                        failures.push(HostFailure {
                            host: member.host.clone(),
                            error: SamFsError::with_message(
                                codes::INVALID_INPUT,
                                format!("{} is mounted", name),
                            ),
                        });
                        remaining.push(member);
                        continue;
                    }
                    let host = member.host;
                    s.file_systems
                        .retain(|f| !(f.host == host && f.name == name));
                }

                s.schedules.retain(|sc| sc.fs_name != name);
                s.dumps.remove(name);
                let policy_result = detach_policies(s, name);

                if !failures.is_empty() {
                    s.shared_members.insert(name.to_string(), remaining);
                    return Err(SamFsError::MultiHost {
                        code: codes::SHARED_FS_PARTIAL,
                        message: format!("{} could not be removed from every host", name),
                        failures,
                    });
                }
                policy_result
            })
            .await
    }

    async fn delete_generic_file_system(&self, server: &str, name: &str) -> BackendResult<()> {
        info!("Deleting file system {} on {}", name, server);
        self.state
            .apply(|s| {
                let fs = s
                    .generic_file_system(server, name)
                    .ok_or_else(SamFsError::not_found)?;
                if fs.state.is_mounted() || fs.mount_point == "/" {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        format!("{} is in use", name),
                    ));
                }
                s.generic_file_systems
                    .retain(|f| !(f.host == server && f.name == name));
                Ok(())
            })
            .await
    }

    async fn samfsck(
        &self,
        server: &str,
        name: &str,
        log_file: &str,
        repair: bool,
    ) -> BackendResult<i64> {
        if let Some(r) = self.intercept("samfsck") {
            return r.map(|_| -1);
        }
        info!("Checking {} on {} (repair: {})", name, server, repair);
        self.state
            .apply(|s| {
                let mounted = require_fs(s, server, name)?.state.is_mounted();
                if repair && mounted {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "A mounted file system cannot be repaired",
                    ));
                }
                s.log_files.push(log_file.to_string());
                if mounted {
                    Ok(s.start_job(
                        "samfsck",
                        server,
                        name,
                        None,
                        Duration::seconds(JOB_DURATION_SECS),
                    ))
                } else {
                    Ok(-1)
                }
            })
            .await
    }

    async fn file_exists(&self, server: &str, path: &str) -> BackendResult<bool> {
        self.state
            .read(|s| {
                require_server(s, server)?;
                Ok(s.log_files.iter().any(|f| f == path)
                    || s
                        .files
                        .get(server)
                        .is_some_and(|files| files.iter().any(|f| f.path == path)))
            })
            .await
    }

    async fn change_mount_options(
        &self,
        server: &str,
        name: &str,
        props: &MountProperties,
    ) -> BackendResult<()> {
        if let Some(r) = self.intercept("change_mount_options") {
            return r;
        }
        info!("Changing mount options of {} on {}", name, server);
        self.state
            .apply(|s| {
                require_fs(s, server, name)?.mount_properties = props.clone();
                Ok(())
            })
            .await
    }

    async fn shared_members(&self, server: &str, name: &str) -> BackendResult<Vec<SharedMember>> {
        self.state
            .read(|s| {
                let fs = s.file_system(server, name).ok_or_else(SamFsError::not_found)?;
                if !fs.share_status.is_shared() {
                    return Ok(Vec::new());
                }
                let mut members = s.shared_members.get(name).cloned().unwrap_or_default();
                for member in &mut members {
                    if let Some(view) = s.file_system(&member.host, name) {
                        member.state = view.state;
                    }
                }
                Ok(members)
            })
            .await
    }

    async fn hosts_not_used_by(&self, server: &str, name: &str) -> BackendResult<Vec<String>> {
        self.state
            .read(|s| {
                require_server(s, server)?;
                let members = s.shared_members.get(name);
                Ok(s.servers
                    .iter()
                    .map(|h| h.name.clone())
                    .filter(|h| !members.is_some_and(|m| m.iter().any(|m| &m.host == h)))
                    .collect())
            })
            .await
    }

    async fn ip_addresses(&self, host: &str) -> BackendResult<Vec<String>> {
        self.state
            .read(|s| require_server(s, host).map(|h| h.ip_addresses.clone()))
            .await
    }

    async fn add_host_to_shared_fs(&self, request: &AddMemberRequest) -> BackendResult<()> {
        if let Some(r) = self.intercept("add_host_to_shared_fs") {
            return r;
        }
        info!(
            "Adding {} to shared file system {}",
            request.host, request.fs_name
        );
        self.state
            .apply(|s| {
                require_server(s, &request.host)?;
                let template = s
                    .file_system(&request.server, &request.fs_name)
                    .filter(|f| f.share_status.is_shared())
                    .cloned()
                    .ok_or_else(SamFsError::not_found)?;
                if request.ip_addresses.is_empty() {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "At least one IP address is required",
                    ));
                }

                let members = s.shared_members.entry(request.fs_name.clone()).or_default();
                if members.iter().any(|m| m.host == request.host) {
                    return Err(SamFsError::with_message(
                        codes::FILE_EXISTS,
                        format!("{} is already a member", request.host),
                    ));
                }

                let member_type = if request.potential_server {
                    MemberType::Pmds
                } else {
                    MemberType::Client
                };
                let state = if request.mount_after_add {
                    FsState::Mounted
                } else {
                    FsState::Unmounted
                };
                members.push(SharedMember {
                    host: request.host.clone(),
                    member_type,
                    mount_point: request.mount_point.clone(),
                    state,
                    ip_addresses: request.ip_addresses.clone(),
                    read_only: request.read_only,
                    mount_at_boot: request.mount_at_boot,
                });

                s.file_systems.push(FileSystem {
                    host: request.host.clone(),
                    state,
                    share_status: member_type.share_status(),
                    mount_point: request.mount_point.clone(),
                    mount_properties: MountProperties {
                        read_only: request.read_only,
                        mount_in_background: request.background,
                        ..Default::default()
                    },
                    ..template
                });
                Ok(())
            })
            .await
    }

    async fn remove_host_from_shared_fs(
        &self,
        server: &str,
        name: &str,
        host: &str,
    ) -> BackendResult<()> {
        if let Some(r) = self.intercept("remove_host_from_shared_fs") {
            return r;
        }
        info!("Removing {} from shared file system {}", host, name);
        self.state
            .apply(|s| {
                require_fs(s, server, name)?;
                let members = s
                    .shared_members
                    .get_mut(name)
                    .ok_or_else(|| SamFsError::code_only(codes::MEMBER_NOT_FOUND))?;
                let pos = members
                    .iter()
                    .position(|m| m.host == host)
                    .ok_or_else(|| SamFsError::code_only(codes::MEMBER_NOT_FOUND))?;
                if members[pos].member_type == MemberType::Mds {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "The metadata server cannot be removed",
                    ));
                }
                if s.file_system(host, name).is_some_and(|f| f.state.is_mounted()) {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        format!("{} is mounted on {}", name, host),
                    ));
                }
                if let Some(members) = s.shared_members.get_mut(name) {
                    members.remove(pos);
                }
                s.file_systems.retain(|f| !(f.host == host && f.name == name));
                Ok(())
            })
            .await
    }

    async fn set_shared_mount_options(
        &self,
        host: &str,
        name: &str,
        props: &MountProperties,
    ) -> BackendResult<()> {
        if let Some(r) = self.intercept("set_shared_mount_options") {
            return r;
        }
        info!("Changing mount options of {} on member {}", name, host);
        self.state
            .apply(|s| {
                let fs = require_fs(s, host, name)?;
                if !fs.share_status.is_shared() {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        format!("{} is not shared", name),
                    ));
                }
                fs.mount_properties = props.clone();
                Ok(())
            })
            .await
    }

    async fn policy_criteria(
        &self,
        server: &str,
        fs_name: &str,
    ) -> BackendResult<Vec<PolicyCriteria>> {
        self.state
            .read(|s| {
                s.file_system(server, fs_name)
                    .ok_or_else(SamFsError::not_found)?;
                Ok(s.policies
                    .iter()
                    .filter(|c| c.file_systems.iter().any(|f| f == fs_name))
                    .cloned()
                    .collect())
            })
            .await
    }

    async fn remove_policy_criteria(
        &self,
        server: &str,
        fs_name: &str,
        policy: &str,
        criteria_number: u32,
    ) -> BackendResult<()> {
        if let Some(r) = self.intercept("remove_policy_criteria") {
            return r;
        }
        info!(
            "Removing {} criteria {} from {}",
            policy, criteria_number, fs_name
        );
        self.state
            .apply(|s| {
                require_fs(s, server, fs_name)?;
                let pos = s
                    .policies
                    .iter()
                    .position(|c| {
                        c.policy_name.as_deref() == Some(policy)
                            && c.criteria_number == criteria_number
                            && c.file_systems.iter().any(|f| f == fs_name)
                    })
                    .ok_or_else(|| SamFsError::code_only(codes::POLICY_NOT_FOUND))?;
                if s.policies[pos].default_policy {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "The default policy cannot be removed",
                    ));
                }

                let criteria = &mut s.policies[pos];
                criteria.file_systems.retain(|f| f != fs_name);
                if criteria.file_systems.is_empty() {
                    s.policies.remove(pos);
                    if !s
                        .policies
                        .iter()
                        .any(|c| c.policy_name.as_deref() == Some(policy))
                    {
                        return Err(SamFsError::Warnings {
                            code: codes::ARCHIVER_CONFIG_WARNINGS,
                            messages: vec![format!("Policy {} has no criteria left", policy)],
                        });
                    }
                }
                Ok(())
            })
            .await
    }

    async fn reorder_policy_criteria(
        &self,
        server: &str,
        fs_name: &str,
        order: &[(String, u32)],
    ) -> BackendResult<()> {
        info!("Reordering criteria of {}", fs_name);
        self.state
            .apply(|s| {
                require_fs(s, server, fs_name)?;
                let slots: Vec<usize> = s
                    .policies
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| {
                        !c.default_policy && c.file_systems.iter().any(|f| f == fs_name)
                    })
                    .map(|(i, _)| i)
                    .collect();
                if slots.len() != order.len() {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "Criteria order does not match the current criteria",
                    ));
                }

                let mut reordered = Vec::with_capacity(order.len());
                for (policy, number) in order {
                    let criteria = slots
                        .iter()
                        .map(|&i| &s.policies[i])
                        .find(|c| {
                            c.policy_name.as_deref() == Some(policy.as_str())
                                && c.criteria_number == *number
                        })
                        .cloned()
                        .ok_or_else(|| SamFsError::code_only(codes::POLICY_NOT_FOUND))?;
                    reordered.push(criteria);
                }
                for (slot, criteria) in slots.into_iter().zip(reordered) {
                    s.policies[slot] = criteria;
                }
                Ok(())
            })
            .await
    }

    async fn list_directory(
        &self,
        server: &str,
        dir: &str,
        max_entries: usize,
        filter: Option<&str>,
    ) -> BackendResult<DirectoryListing> {
        self.state
            .read(|s| {
                require_server(s, server)?;
                let files = s.files.get(server).map(Vec::as_slice).unwrap_or_default();
                let known = dir == "/"
                    || files.iter().any(|f| f.is_dir && f.path == dir)
                    || s
                        .file_systems
                        .iter()
                        .any(|f| f.host == server && f.mount_point == dir);
                if !known {
                    return Err(SamFsError::with_message(
                        codes::NOT_FOUND,
                        format!("{} does not exist", dir),
                    ));
                }

                let mut entries: Vec<FileEntry> = files
                    .iter()
                    .filter(|f| parent_dir(&f.path) == dir)
                    .filter(|f| filter.is_none_or(|p| f.name().contains(p)))
                    .cloned()
                    .collect();
                entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.path.cmp(&b.path)));
                let total = entries.len();
                entries.truncate(max_entries);
                Ok(DirectoryListing { entries, total })
            })
            .await
    }

    async fn file_details(&self, server: &str, path: &str) -> BackendResult<Option<FileEntry>> {
        self.state
            .read(|s| {
                require_server(s, server)?;
                Ok(s.files
                    .get(server)
                    .and_then(|files| files.iter().find(|f| f.path == path))
                    .cloned())
            })
            .await
    }

    async fn change_file_attributes(
        &self,
        server: &str,
        request: &ChangeAttributesRequest,
    ) -> BackendResult<()> {
        if let Some(r) = self.intercept("change_file_attributes") {
            return r;
        }
        info!(
            "Changing {:?} attributes of {} to {} (was {})",
            request.mode, request.path, request.new_option, request.existing_option
        );
        self.state
            .apply(|s| {
                let files = s.files.get_mut(server).ok_or_else(SamFsError::not_found)?;
                let target_is_dir = files
                    .iter()
                    .find(|f| f.path == request.path)
                    .map(|f| f.is_dir)
                    .ok_or_else(SamFsError::not_found)?;

                let selected = |f: &FileEntry| {
                    f.path == request.path
                        || (request.recursive && target_is_dir && is_under(&f.path, &request.path))
                };

                for file in files.iter().filter(|f| selected(f)) {
                    if file.is_dir {
                        continue;
                    }
                    match request.mode {
                        AttributeMode::Archive
                            if request.new_option == attr::ARCHIVE_NEVER && file.copies > 0 =>
                        {
                            return Err(SamFsError::with_message(
                                codes::ARCHIVE_FILES_FAILED,
                                format!("{} already has archive copies", file.path),
                            ));
                        }
                        AttributeMode::Release
                            if request.new_option & !attr::RELEASE_PARTIAL
                                == attr::RELEASE_ALWAYS
                                && file.copies == 0 =>
                        {
                            return Err(SamFsError::with_message(
                                codes::RELEASE_FILES_FAILED,
                                format!("{} has no archive copy", file.path),
                            ));
                        }
                        _ => {}
                    }
                }

                for file in files.iter_mut().filter(|f| selected(&**f)) {
                    match request.mode {
                        AttributeMode::Archive => file.attributes.archive = request.new_option,
                        AttributeMode::Release => {
                            file.attributes.release = request.new_option;
                            file.attributes.partial_size_kb = request.partial_size_kb;
                        }
                        AttributeMode::Stage => file.attributes.stage = request.new_option,
                    }
                }
                Ok(())
            })
            .await
    }

    async fn recovery_point_schedule(
        &self,
        server: &str,
        fs_name: &str,
    ) -> BackendResult<Option<RecoveryPointSchedule>> {
        self.state
            .read(|s| {
                s.file_system(server, fs_name)
                    .ok_or_else(SamFsError::not_found)?;
                Ok(s.schedules.iter().find(|sc| sc.fs_name == fs_name).cloned())
            })
            .await
    }

    async fn set_recovery_point_schedule(
        &self,
        server: &str,
        schedule: &RecoveryPointSchedule,
    ) -> BackendResult<()> {
        info!("Saving recovery point schedule of {}", schedule.fs_name);
        self.state
            .apply(|s| {
                require_fs(s, server, &schedule.fs_name)?;
                if !schedule.location.starts_with('/') || schedule.periodicity == 0 {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "Location must be absolute and the period positive",
                    ));
                }
                match s.schedules.iter_mut().find(|sc| sc.fs_name == schedule.fs_name) {
                    Some(existing) => *existing = schedule.clone(),
                    None => s.schedules.push(schedule.clone()),
                }
                Ok(())
            })
            .await
    }

    async fn dump_files(
        &self,
        server: &str,
        fs_name: &str,
        dir: &str,
    ) -> BackendResult<Vec<DumpFile>> {
        self.reap_jobs().await?;
        self.state
            .read(|s| {
                s.file_system(server, fs_name)
                    .ok_or_else(SamFsError::not_found)?;
                Ok(s.dumps
                    .get(fs_name)
                    .map(|dumps| {
                        dumps
                            .iter()
                            .filter(|d| is_under(&d.file_name, dir))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default())
            })
            .await
    }

    async fn enable_dump_for_use(
        &self,
        server: &str,
        fs_name: &str,
        dump: &str,
    ) -> BackendResult<i64> {
        info!("Indexing recovery point {}", dump);
        self.state
            .apply(|s| {
                require_fs(s, server, fs_name)?;
                let file = s
                    .dumps
                    .get_mut(fs_name)
                    .and_then(|d| d.iter_mut().find(|d| d.file_name == dump))
                    .ok_or_else(SamFsError::not_found)?;
                if file.indexed || file.processing {
                    return Ok(0);
                }
                if file.entries <= INLINE_INDEX_LIMIT {
                    file.indexed = true;
                    return Ok(0);
                }
                file.processing = true;
                Ok(s.start_job(
                    "index",
                    server,
                    fs_name,
                    Some(dump.to_string()),
                    Duration::seconds(JOB_DURATION_SECS),
                ))
            })
            .await
    }

    async fn clean_dump(&self, server: &str, fs_name: &str, dump: &str) -> BackendResult<()> {
        info!("Removing index of recovery point {}", dump);
        self.state
            .apply(|s| {
                require_fs(s, server, fs_name)?;
                let file = s
                    .dumps
                    .get_mut(fs_name)
                    .and_then(|d| d.iter_mut().find(|d| d.file_name == dump))
                    .ok_or_else(SamFsError::not_found)?;
                if file.processing {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "The recovery point is being indexed",
                    ));
                }
                file.indexed = false;
                Ok(())
            })
            .await
    }

    async fn delete_dump(&self, server: &str, fs_name: &str, dump: &str) -> BackendResult<()> {
        info!("Deleting recovery point {}", dump);
        self.state
            .apply(|s| {
                require_fs(s, server, fs_name)?;
                let dumps = s.dumps.get_mut(fs_name).ok_or_else(SamFsError::not_found)?;
                let pos = dumps
                    .iter()
                    .position(|d| d.file_name == dump)
                    .ok_or_else(SamFsError::not_found)?;
                if dumps[pos].locked || dumps[pos].processing {
                    return Err(SamFsError::with_message(
                        codes::INVALID_INPUT,
                        "The recovery point is retained or in use",
                    ));
                }
                dumps.remove(pos);
                Ok(())
            })
            .await
    }

    async fn set_dump_retained(
        &self,
        server: &str,
        fs_name: &str,
        dump: &str,
        retain: bool,
    ) -> BackendResult<()> {
        if let Some(r) = self.intercept("set_dump_retained") {
            return r;
        }
        info!("Setting retention of {} to {}", dump, retain);
        self.state
            .apply(|s| {
                require_fs(s, server, fs_name)?;
                let found = s
                    .dumps
                    .get_mut(fs_name)
                    .and_then(|dumps| dumps.iter_mut().find(|d| d.file_name == dump))
                    .ok_or_else(SamFsError::not_found)?;
                found.locked = retain;
                Ok(())
            })
            .await
    }

    async fn job_exists(&self, server: &str, job_id: i64) -> BackendResult<bool> {
        self.reap_jobs().await?;
        self.state
            .read(|s| {
                require_server(s, server)?;
                Ok(s.jobs.iter().any(|j| j.id == job_id))
            })
            .await
    }
}
