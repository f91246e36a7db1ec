use crate::backend::model::{
    ArchivingType, DumpFile, FileAttributes, FileEntry, FileSystem, FsProduct, FsState,
    GenericFileSystem, MemberType, MountProperties, PolicyCriteria, RecoveryPointSchedule,
    ServerInfo, SetupKind, ShareStatus, SharedMember, TimeUnit,
};
use crate::error::{SamFsError, StateError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Maximum number of backup versions to keep
const MAX_BACKUPS: usize = 10;

/// Thread-safe inventory store.
pub struct StateManager {
    path: PathBuf,
    state: RwLock<InventoryState>,
}

impl StateManager {
    /// Load state from file or create default.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();

        let state = if path.exists() {
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| StateError::Read(e.to_string()))?;

            serde_json::from_str(&content).map_err(|e| StateError::Parse(e.to_string()))?
        } else {
            InventoryState::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Load state from file, or seed a demo inventory for `server` and
    /// persist it when the file does not exist yet.
    pub async fn load_or_seed(path: impl AsRef<Path>, server: &str) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Self::load(path).await;
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::Write(format!("Failed to create state dir: {}", e)))?;
        }

        let manager = Self {
            path,
            state: RwLock::new(InventoryState::demo(server)),
        };
        manager.save().await?;
        tracing::info!("Seeded demo inventory for server {}", server);
        Ok(manager)
    }

    /// Save current state to file with atomic write and backup.
    pub async fn save(&self) -> Result<(), StateError> {
        let state = self.state.read().await;
        let content =
            serde_json::to_string_pretty(&*state).map_err(|e| StateError::Parse(e.to_string()))?;

        if self.path.exists()
            && let Err(e) = self.create_backup().await
        {
            tracing::warn!("Failed to create backup: {}", e);
        }

        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, &content)
            .await
            .map_err(|e| StateError::Write(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StateError::Write(format!("Failed to rename temp file: {}", e)))?;

        tracing::debug!("State saved successfully to {:?}", self.path);
        Ok(())
    }

    /// Create a timestamped backup of the current state file.
    async fn create_backup(&self) -> Result<(), StateError> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup_path = self.path.with_extension(format!("json.{}", timestamp));

        fs::copy(&self.path, &backup_path)
            .await
            .map_err(|e| StateError::Write(format!("Failed to create backup: {}", e)))?;

        tracing::debug!("Created backup: {:?}", backup_path);

        self.cleanup_old_backups().await;

        Ok(())
    }

    /// Remove old backups, keeping only MAX_BACKUPS most recent.
    async fn cleanup_old_backups(&self) {
        for old_backup in self.list_backups().await.into_iter().skip(MAX_BACKUPS) {
            if let Err(e) = fs::remove_file(&old_backup).await {
                tracing::warn!("Failed to remove old backup {:?}: {}", old_backup, e);
            } else {
                tracing::debug!("Removed old backup: {:?}", old_backup);
            }
        }
    }

    /// List available backups (most recent first).
    pub async fn list_backups(&self) -> Vec<PathBuf> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            Some(_) => Path::new("."),
            None => return Vec::new(),
        };

        let stem = match self.path.file_stem() {
            Some(s) => s.to_string_lossy().to_string(),
            None => return Vec::new(),
        };
        let prefix = format!("{}.json.", stem);

        let mut backups: Vec<PathBuf> = Vec::new();

        if let Ok(mut entries) = fs::read_dir(parent).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if let Some(name) = path.file_name() {
                    let name_str = name.to_string_lossy();
                    if name_str.starts_with(&prefix) && !name_str.ends_with(".tmp") {
                        backups.push(path);
                    }
                }
            }
        }

        backups.sort_by(|a, b| b.cmp(a));
        backups
    }

    /// Roll the inventory back to one of the listed backups, named by its
    /// file name. The replaced inventory is itself backed up first.
    pub async fn restore_backup(&self, name: &str) -> Result<PathBuf, StateError> {
        let backup = self
            .list_backups()
            .await
            .into_iter()
            .find(|p| p.file_name().is_some_and(|n| n.to_string_lossy() == name))
            .ok_or_else(|| StateError::NotFound(format!("backup {}", name)))?;

        let content = fs::read_to_string(&backup)
            .await
            .map_err(|e| StateError::Read(e.to_string()))?;
        let restored: InventoryState = serde_json::from_str(&content)
            .map_err(|e| StateError::Parse(format!("Invalid backup {}: {}", name, e)))?;

        *self.state.write().await = restored;
        self.save().await?;

        tracing::info!("Inventory restored from {:?}", backup);
        Ok(backup)
    }

    /// Get a clone of the current state.
    pub async fn get(&self) -> InventoryState {
        self.state.read().await.clone()
    }

    /// Run a read-only query against the state.
    pub async fn read<T>(&self, f: impl FnOnce(&InventoryState) -> T) -> T {
        let state = self.state.read().await;
        f(&state)
    }

    /// Update state with a function and save.
    #[cfg(test)]
    pub async fn update<F>(&self, f: F) -> Result<(), StateError>
    where
        F: FnOnce(&mut InventoryState),
    {
        {
            let mut state = self.state.write().await;
            f(&mut state);
        }
        self.save().await
    }

    /// Apply a fallible mutation. The state is saved when the mutation
    /// succeeds, and also when it fails with an error whose primary action
    /// was carried out (warnings, multi-host, multi-message).
    pub async fn apply<T, F>(&self, f: F) -> Result<T, SamFsError>
    where
        F: FnOnce(&mut InventoryState) -> Result<T, SamFsError>,
    {
        let result = {
            let mut state = self.state.write().await;
            f(&mut state)
        };

        let persist = match &result {
            Ok(_) => true,
            Err(e) => e.action_completed(),
        };
        if persist {
            self.save().await?;
        }
        result
    }
}

/// Background job started by a long running backend operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub kind: String,
    pub server: String,
    pub fs_name: String,
    /// Dump file the job works on, if any.
    #[serde(default)]
    pub target: Option<String>,
    pub started: DateTime<Utc>,
    pub finishes: DateTime<Utc>,
}

/// Root state structure persisted to state.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryState {
    #[serde(default)]
    pub servers: Vec<ServerInfo>,
    #[serde(default)]
    pub file_systems: Vec<FileSystem>,
    #[serde(default)]
    pub generic_file_systems: Vec<GenericFileSystem>,
    /// Shared file system name to member hosts.
    #[serde(default)]
    pub shared_members: BTreeMap<String, Vec<SharedMember>>,
    #[serde(default)]
    pub policies: Vec<PolicyCriteria>,
    /// Files per server.
    #[serde(default)]
    pub files: BTreeMap<String, Vec<FileEntry>>,
    #[serde(default)]
    pub schedules: Vec<RecoveryPointSchedule>,
    /// Recovery point files per file system.
    #[serde(default)]
    pub dumps: BTreeMap<String, Vec<DumpFile>>,
    #[serde(default)]
    pub log_files: Vec<String>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub next_job_id: i64,
    /// Instance identifier, regenerated for every seeded inventory.
    #[serde(default = "Uuid::new_v4")]
    pub instance: Uuid,
}

impl InventoryState {
    pub fn server(&self, name: &str) -> Option<&ServerInfo> {
        self.servers.iter().find(|s| s.name == name)
    }

    pub fn file_system(&self, server: &str, name: &str) -> Option<&FileSystem> {
        self.file_systems
            .iter()
            .find(|f| f.host == server && f.name == name)
    }

    pub fn file_system_mut(&mut self, server: &str, name: &str) -> Option<&mut FileSystem> {
        self.file_systems
            .iter_mut()
            .find(|f| f.host == server && f.name == name)
    }

    pub fn generic_file_system(&self, server: &str, name: &str) -> Option<&GenericFileSystem> {
        self.generic_file_systems
            .iter()
            .find(|f| f.host == server && f.name == name)
    }

    pub fn generic_file_system_mut(
        &mut self,
        server: &str,
        name: &str,
    ) -> Option<&mut GenericFileSystem> {
        self.generic_file_systems
            .iter_mut()
            .find(|f| f.host == server && f.name == name)
    }

    /// Register a new job and return its id.
    pub fn start_job(
        &mut self,
        kind: &str,
        server: &str,
        fs_name: &str,
        target: Option<String>,
        duration: Duration,
    ) -> i64 {
        self.next_job_id += 1;
        let started = Utc::now();
        self.jobs.push(Job {
            id: self.next_job_id,
            kind: kind.to_string(),
            server: server.to_string(),
            fs_name: fs_name.to_string(),
            target,
            started,
            finishes: started + duration,
        });
        self.next_job_id
    }

    /// Drop jobs whose run time has elapsed and return them.
    pub fn reap_jobs(&mut self, now: DateTime<Utc>) -> Vec<Job> {
        let (done, running): (Vec<Job>, Vec<Job>) =
            self.jobs.drain(..).partition(|j| j.finishes <= now);
        self.jobs = running;
        done
    }

    /// Demo inventory: one archiving server with a shared file system and
    /// two client hosts.
    pub fn demo(server: &str) -> Self {
        let now = Utc::now();
        let mut state = InventoryState {
            instance: Uuid::new_v4(),
            ..Default::default()
        };

        state.servers = vec![
            ServerInfo {
                name: server.to_string(),
                architecture: "sparc".into(),
                api_version: "1.6".into(),
                ip_addresses: vec!["10.0.0.10".into(), "192.168.10.10".into()],
                setup: SetupKind::Sam,
            },
            ServerInfo {
                name: "client1".into(),
                architecture: "sparc".into(),
                api_version: "1.6".into(),
                ip_addresses: vec!["10.0.0.21".into()],
                setup: SetupKind::Sam,
            },
            ServerInfo {
                name: "client2".into(),
                architecture: "x64".into(),
                api_version: "1.6".into(),
                ip_addresses: vec!["10.0.0.22".into(), "192.168.10.22".into()],
                setup: SetupKind::QfsOnly,
            },
        ];

        let archiving_props = MountProperties {
            hwm: Some(80),
            lwm: Some(60),
            stripe_width: Some(1),
            max_partial_kb: Some(16),
            partial_release_kb: Some(16),
            ..Default::default()
        };

        state.file_systems = vec![
            FileSystem {
                name: "samfs1".into(),
                host: server.to_string(),
                product: FsProduct::SamQfs,
                state: FsState::Mounted,
                share_status: ShareStatus::Unshared,
                archiving: ArchivingType::Archiving,
                ha: false,
                capacity_kb: 104_857_600,
                available_kb: 41_943_040,
                mount_point: "/sam1".into(),
                metadata_server: server.to_string(),
                mount_properties: archiving_props.clone(),
                nfs_shared: true,
                proto_fs: false,
            },
            FileSystem {
                name: "qfs1".into(),
                host: server.to_string(),
                product: FsProduct::Qfs,
                state: FsState::Unmounted,
                share_status: ShareStatus::Unshared,
                archiving: ArchivingType::NonArchiving,
                ha: false,
                capacity_kb: 20_971_520,
                available_kb: 20_971_520,
                mount_point: "/qfs1".into(),
                metadata_server: server.to_string(),
                mount_properties: MountProperties::default(),
                nfs_shared: false,
                proto_fs: false,
            },
            FileSystem {
                name: "sharefs1".into(),
                host: server.to_string(),
                product: FsProduct::SamQfs,
                state: FsState::Mounted,
                share_status: ShareStatus::Mds,
                archiving: ArchivingType::Archiving,
                ha: false,
                capacity_kb: 52_428_800,
                available_kb: 5_242_880,
                mount_point: "/sharefs1".into(),
                metadata_server: server.to_string(),
                mount_properties: archiving_props,
                nfs_shared: false,
                proto_fs: false,
            },
            FileSystem {
                name: "sharefs1".into(),
                host: "client1".into(),
                product: FsProduct::SamQfs,
                state: FsState::Mounted,
                share_status: ShareStatus::Client,
                archiving: ArchivingType::Archiving,
                ha: false,
                capacity_kb: 52_428_800,
                available_kb: 5_242_880,
                mount_point: "/sharefs1".into(),
                metadata_server: server.to_string(),
                mount_properties: MountProperties::default(),
                nfs_shared: false,
                proto_fs: false,
            },
        ];

        state.generic_file_systems = vec![
            GenericFileSystem {
                name: "/dev/dsk/c0t0d0s0".into(),
                host: server.to_string(),
                type_name: "ufs".into(),
                state: FsState::Mounted,
                capacity_kb: 16_777_216,
                available_kb: 8_388_608,
                mount_point: "/".into(),
                nfs_shared: false,
            },
            GenericFileSystem {
                name: "rpool/export/home".into(),
                host: server.to_string(),
                type_name: "zfs".into(),
                state: FsState::Mounted,
                capacity_kb: 33_554_432,
                available_kb: 30_000_000,
                mount_point: "/export/home".into(),
                nfs_shared: true,
            },
            GenericFileSystem {
                name: "/dev/vx/dsk/dg1/vol1".into(),
                host: server.to_string(),
                type_name: "vxfs".into(),
                state: FsState::Unmounted,
                capacity_kb: 8_388_608,
                available_kb: 8_000_000,
                mount_point: "/vx1".into(),
                nfs_shared: false,
            },
        ];

        state.shared_members.insert(
            "sharefs1".into(),
            vec![
                SharedMember {
                    host: server.to_string(),
                    member_type: MemberType::Mds,
                    mount_point: "/sharefs1".into(),
                    state: FsState::Mounted,
                    ip_addresses: vec!["10.0.0.10".into()],
                    read_only: false,
                    mount_at_boot: true,
                },
                SharedMember {
                    host: "client1".into(),
                    member_type: MemberType::Client,
                    mount_point: "/sharefs1".into(),
                    state: FsState::Mounted,
                    ip_addresses: vec!["10.0.0.21".into()],
                    read_only: false,
                    mount_at_boot: true,
                },
            ],
        );

        state.policies = vec![
            PolicyCriteria {
                policy_name: Some("samfs1".into()),
                criteria_number: 1,
                starting_dir: ".".into(),
                name_pattern: None,
                min_size: None,
                max_size: None,
                access_age: None,
                copies: 1,
                default_policy: true,
                file_systems: vec!["samfs1".into()],
            },
            PolicyCriteria {
                policy_name: Some("images".into()),
                criteria_number: 1,
                starting_dir: "images".into(),
                name_pattern: Some(r"\.jpg$".into()),
                min_size: Some("1M".into()),
                max_size: None,
                access_age: None,
                copies: 2,
                default_policy: false,
                file_systems: vec!["samfs1".into(), "sharefs1".into()],
            },
            PolicyCriteria {
                policy_name: Some("logs".into()),
                criteria_number: 1,
                starting_dir: "logs".into(),
                name_pattern: Some(r"\.log$".into()),
                min_size: None,
                max_size: Some("100M".into()),
                access_age: Some("30d".into()),
                copies: 1,
                default_policy: false,
                file_systems: vec!["samfs1".into()],
            },
        ];

        let file = |path: &str, is_dir: bool, size: u64, online: bool, copies: u32| FileEntry {
            path: path.into(),
            is_dir,
            size,
            modified: now - Duration::days(3),
            online,
            copies,
            attributes: FileAttributes::default(),
        };
        state.files.insert(
            server.to_string(),
            vec![
                file("/sam1", true, 4096, true, 0),
                file("/sam1/images", true, 4096, true, 0),
                file("/sam1/images/scan-0001.jpg", false, 3_145_728, false, 2),
                file("/sam1/images/scan-0002.jpg", false, 2_097_152, true, 2),
                file("/sam1/logs", true, 4096, true, 0),
                file("/sam1/logs/archiver.log", false, 65_536, true, 1),
                file("/sam1/readme.txt", false, 1024, true, 0),
                file("/sharefs1", true, 4096, true, 0),
                file("/sharefs1/projects", true, 4096, true, 0),
            ],
        );

        state.schedules = vec![RecoveryPointSchedule {
            fs_name: "samfs1".into(),
            location: "/sam1_dumps".into(),
            name_prefix: "samfs1".into(),
            compress: true,
            auto_index: true,
            periodicity: 1,
            periodicity_unit: TimeUnit::Days,
            start_hour: 2,
            start_minute: 30,
            retention: Some((4, TimeUnit::Weeks)),
            excluded_dirs: vec!["/sam1/tmp".into()],
            pre_script: None,
            post_script: None,
            log_file: Some("/var/adm/samfs1_dump.log".into()),
            disabled: false,
        }];

        state.dumps.insert(
            "samfs1".into(),
            (1..=3)
                .map(|i| DumpFile {
                    file_name: format!(
                        "/sam1_dumps/samfs1-{}.dmp.gz",
                        (now - Duration::days(i)).format("%Y%m%d")
                    ),
                    compressed: true,
                    indexed: i != 2,
                    processing: false,
                    broken: false,
                    modified: now - Duration::days(i),
                    size_bytes: 1_048_576 * i as u64,
                    entries: 12_000 + i as u64,
                    locked: i == 3,
                })
                .collect(),
        );

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    fn temp_state_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("samqfs-console-{}", Uuid::new_v4()))
            .join("state.json")
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_empty_state() {
        let manager = StateManager::load(temp_state_path()).await.unwrap();
        assert!(manager.get().await.file_systems.is_empty());
    }

    #[tokio::test]
    async fn test_seed_and_reload() {
        let path = temp_state_path();
        let manager = StateManager::load_or_seed(&path, "samqfs1").await.unwrap();
        assert!(path.exists());
        let seeded = manager.get().await;

        let reloaded = StateManager::load(&path).await.unwrap().get().await;
        assert_eq!(reloaded.file_systems.len(), seeded.file_systems.len());
        assert_eq!(reloaded.instance, seeded.instance);
        assert!(reloaded.file_system("samqfs1", "samfs1").is_some());
    }

    #[tokio::test]
    async fn test_apply_persists_completed_errors_only() {
        let path = temp_state_path();
        let manager = StateManager::load_or_seed(&path, "srv").await.unwrap();

        let res: Result<(), SamFsError> = manager
            .apply(|s| {
                s.log_files.push("/tmp/not-saved".into());
                Err(SamFsError::not_found())
            })
            .await;
        assert_eq!(res.unwrap_err().code(), codes::NOT_FOUND);
        let on_disk = StateManager::load(&path).await.unwrap().get().await;
        assert!(on_disk.log_files.is_empty());

        let res: Result<(), SamFsError> = manager
            .apply(|s| {
                s.log_files.push("/tmp/saved".into());
                Err(SamFsError::Warnings {
                    code: 1,
                    messages: vec!["w".into()],
                })
            })
            .await;
        assert!(res.is_err());
        let on_disk = StateManager::load(&path).await.unwrap().get().await;
        assert!(on_disk.log_files.contains(&"/tmp/saved".to_string()));
    }

    #[tokio::test]
    async fn test_backups_are_listed_after_save() {
        let path = temp_state_path();
        let manager = StateManager::load_or_seed(&path, "srv").await.unwrap();
        manager.update(|s| s.next_job_id = 5).await.unwrap();
        let backups = manager.list_backups().await;
        assert!(!backups.is_empty());

        let name = backups[0].file_name().unwrap().to_string_lossy().to_string();
        manager.restore_backup(&name).await.unwrap();
        assert_eq!(manager.get().await.next_job_id, 0);
        assert!(manager.restore_backup("../state.json").await.is_err());
    }

    #[test]
    fn test_reap_jobs() {
        let mut state = InventoryState::default();
        let id = state.start_job("samfsck", "srv", "fs", None, Duration::seconds(30));
        assert_eq!(id, 1);
        assert!(state.reap_jobs(Utc::now()).is_empty());
        let done = state.reap_jobs(Utc::now() + Duration::seconds(31));
        assert_eq!(done.len(), 1);
        assert!(state.jobs.is_empty());
    }
}
