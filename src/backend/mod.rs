//! Management API used by the console pages.
//!
//! Every call is addressed to a managed server by name. The console never
//! interprets archiving or sharing semantics itself; it only forwards requests
//! and reports the resulting [`SamFsError`](crate::error::SamFsError).

pub mod local;
pub mod model;

use async_trait::async_trait;

use crate::error::BackendResult;
use model::{
    AddMemberRequest, ChangeAttributesRequest, DirectoryListing, DumpFile, FileEntry, FileSystem,
    GenericFileSystem, MountProperties, PolicyCriteria, RecoveryPointSchedule, ServerInfo,
    SharedMember,
};

pub use local::LocalBackend;

#[async_trait]
pub trait SamQfsBackend: Send + Sync {
    // Server
    async fn server_info(&self, server: &str) -> BackendResult<ServerInfo>;

    // File systems
    async fn list_file_systems(&self, server: &str) -> BackendResult<Vec<FileSystem>>;

    async fn list_generic_file_systems(&self, server: &str)
    -> BackendResult<Vec<GenericFileSystem>>;

    /// `Ok(None)` when the file system does not exist on `server`.
    async fn get_file_system(&self, server: &str, name: &str) -> BackendResult<Option<FileSystem>>;

    async fn get_generic_file_system(
        &self,
        server: &str,
        name: &str,
    ) -> BackendResult<Option<GenericFileSystem>>;

    async fn mount(&self, server: &str, name: &str) -> BackendResult<()>;

    async fn unmount(&self, server: &str, name: &str) -> BackendResult<()>;

    async fn mount_generic(&self, server: &str, name: &str) -> BackendResult<()>;

    async fn unmount_generic(&self, server: &str, name: &str) -> BackendResult<()>;

    async fn delete_file_system(&self, server: &str, name: &str) -> BackendResult<()>;

    /// Remove a shared file system from every member host.
    async fn delete_shared_file_system(&self, server: &str, name: &str) -> BackendResult<()>;

    async fn delete_generic_file_system(&self, server: &str, name: &str) -> BackendResult<()>;

    /// Start a file system check. Returns a job id; negative when the check
    /// already finished.
    async fn samfsck(&self, server: &str, name: &str, log_file: &str, repair: bool)
    -> BackendResult<i64>;

    async fn file_exists(&self, server: &str, path: &str) -> BackendResult<bool>;

    async fn change_mount_options(
        &self,
        server: &str,
        name: &str,
        props: &MountProperties,
    ) -> BackendResult<()>;

    // Shared file systems
    async fn shared_members(&self, server: &str, name: &str) -> BackendResult<Vec<SharedMember>>;

    /// Hosts known to `server` that are not members of the file system.
    async fn hosts_not_used_by(&self, server: &str, name: &str) -> BackendResult<Vec<String>>;

    async fn ip_addresses(&self, host: &str) -> BackendResult<Vec<String>>;

    async fn add_host_to_shared_fs(&self, request: &AddMemberRequest) -> BackendResult<()>;

    async fn remove_host_from_shared_fs(&self, server: &str, name: &str, host: &str)
    -> BackendResult<()>;

    /// Mount options as seen by one member host.
    async fn set_shared_mount_options(
        &self,
        host: &str,
        name: &str,
        props: &MountProperties,
    ) -> BackendResult<()>;

    // Archive policies
    async fn policy_criteria(&self, server: &str, fs_name: &str)
    -> BackendResult<Vec<PolicyCriteria>>;

    async fn remove_policy_criteria(
        &self,
        server: &str,
        fs_name: &str,
        policy: &str,
        criteria_number: u32,
    ) -> BackendResult<()>;

    /// Reorder the criteria applied to a file system. `order` lists
    /// `(policy, criteria_number)` pairs from first to last.
    async fn reorder_policy_criteria(
        &self,
        server: &str,
        fs_name: &str,
        order: &[(String, u32)],
    ) -> BackendResult<()>;

    // Files
    async fn list_directory(
        &self,
        server: &str,
        dir: &str,
        max_entries: usize,
        filter: Option<&str>,
    ) -> BackendResult<DirectoryListing>;

    async fn file_details(&self, server: &str, path: &str) -> BackendResult<Option<FileEntry>>;

    async fn change_file_attributes(
        &self,
        server: &str,
        request: &ChangeAttributesRequest,
    ) -> BackendResult<()>;

    // Recovery points
    async fn recovery_point_schedule(
        &self,
        server: &str,
        fs_name: &str,
    ) -> BackendResult<Option<RecoveryPointSchedule>>;

    async fn set_recovery_point_schedule(
        &self,
        server: &str,
        schedule: &RecoveryPointSchedule,
    ) -> BackendResult<()>;

    async fn dump_files(&self, server: &str, fs_name: &str, dir: &str)
    -> BackendResult<Vec<DumpFile>>;

    /// Index a recovery point. Returns a job id, zero or negative when the
    /// index was built synchronously.
    async fn enable_dump_for_use(&self, server: &str, fs_name: &str, dump: &str)
    -> BackendResult<i64>;

    async fn clean_dump(&self, server: &str, fs_name: &str, dump: &str) -> BackendResult<()>;

    async fn delete_dump(&self, server: &str, fs_name: &str, dump: &str) -> BackendResult<()>;

    /// Keep a recovery point out of automatic expiry and deletion.
    async fn set_dump_retained(
        &self,
        server: &str,
        fs_name: &str,
        dump: &str,
        retain: bool,
    ) -> BackendResult<()>;

    async fn job_exists(&self, server: &str, job_id: i64) -> BackendResult<bool>;
}
