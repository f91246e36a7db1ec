use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mount state of a file system on one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsState {
    Mounted,
    Unmounted,
}

impl FsState {
    pub fn is_mounted(self) -> bool {
        self == FsState::Mounted
    }
}

/// Role of the local host in a (possibly) shared file system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    Unshared,
    /// Metadata server.
    Mds,
    /// Potential metadata server.
    Pmds,
    Client,
}

impl ShareStatus {
    pub fn is_shared(self) -> bool {
        self != ShareStatus::Unshared
    }

    /// Unshared, or the host owning the metadata.
    pub fn owns_metadata(self) -> bool {
        matches!(self, ShareStatus::Unshared | ShareStatus::Mds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsProduct {
    Qfs,
    SamFs,
    SamQfs,
}

impl FsProduct {
    pub fn label(self) -> &'static str {
        match self {
            FsProduct::Qfs => "QFS",
            FsProduct::SamFs => "SAM-FS",
            FsProduct::SamQfs => "SAM-QFS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivingType {
    Archiving,
    NonArchiving,
}

/// Which product is installed on the managed server. Controls the layout of
/// the summary page action menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupKind {
    QfsOnly,
    Sam,
}

/// Mount options of a SAM/QFS file system. `None` means "not set", which the
/// backend interprets as the product default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountProperties {
    // basic
    pub hwm: Option<u32>,
    pub lwm: Option<u32>,
    pub stripe_width: Option<u32>,
    pub trace: bool,

    // general
    pub read_only: bool,
    pub no_setuid: bool,
    pub quick_write: bool,
    pub mount_in_background: bool,
    pub mount_retries: Option<u32>,

    // performance
    pub readahead_kb: Option<u32>,
    pub writebehind_kb: Option<u32>,
    pub write_throttle_kb: Option<u32>,
    pub flush_behind_kb: Option<u32>,

    // archiving
    pub partial_release_kb: Option<u32>,
    pub max_partial_kb: Option<u32>,
    pub stage_flush_behind_kb: Option<u32>,

    // shared
    pub metadata_refresh_secs: Option<u32>,
    pub min_pool: Option<u32>,
    pub read_lease_secs: Option<u32>,
    pub write_lease_secs: Option<u32>,
    pub append_lease_secs: Option<u32>,
    pub lease_timeout_secs: Option<u32>,
    pub multi_host_write: bool,
    pub synchronized_metadata: bool,
    pub consistency_checking: bool,
}

/// A SAM-FS / QFS / SAM-QFS file system as seen from one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystem {
    pub name: String,
    /// Host this view belongs to.
    pub host: String,
    pub product: FsProduct,
    pub state: FsState,
    pub share_status: ShareStatus,
    pub archiving: ArchivingType,
    #[serde(default)]
    pub ha: bool,
    pub capacity_kb: u64,
    pub available_kb: u64,
    pub mount_point: String,
    /// Metadata server of the file system.
    pub metadata_server: String,
    #[serde(default)]
    pub mount_properties: MountProperties,
    #[serde(default)]
    pub nfs_shared: bool,
    #[serde(default)]
    pub proto_fs: bool,
}

impl FileSystem {
    /// Consumed space in percent, or -1 when the capacity is unknown.
    pub fn consumed_percentage(&self) -> i32 {
        consumed_percentage(self.capacity_kb, self.available_kb)
    }

    pub fn is_archiving(&self) -> bool {
        self.archiving == ArchivingType::Archiving
    }
}

/// Non SAM file systems (ufs, vxfs, zfs, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericFileSystem {
    pub name: String,
    pub host: String,
    pub type_name: String,
    pub state: FsState,
    pub capacity_kb: u64,
    pub available_kb: u64,
    pub mount_point: String,
    #[serde(default)]
    pub nfs_shared: bool,
}

impl GenericFileSystem {
    pub fn consumed_percentage(&self) -> i32 {
        consumed_percentage(self.capacity_kb, self.available_kb)
    }

    pub fn family(&self) -> FsFamily {
        match self.type_name.to_lowercase().as_str() {
            "ufs" => FsFamily::Ufs,
            "vxfs" => FsFamily::Vxfs,
            "zfs" => FsFamily::Zfs,
            _ => FsFamily::Other,
        }
    }
}

/// Coarse classification used by the summary filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsFamily {
    SamQfs,
    Ufs,
    Vxfs,
    Zfs,
    Other,
}

fn consumed_percentage(capacity_kb: u64, available_kb: u64) -> i32 {
    if capacity_kb == 0 {
        return -1;
    }
    let used = capacity_kb.saturating_sub(available_kb);
    ((used as f64 / capacity_kb as f64) * 100.0).round() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Mds,
    Pmds,
    Client,
}

impl MemberType {
    pub fn label(self) -> &'static str {
        match self {
            MemberType::Mds => "Metadata Server",
            MemberType::Pmds => "Potential Metadata Server",
            MemberType::Client => "Client",
        }
    }

    pub fn share_status(self) -> ShareStatus {
        match self {
            MemberType::Mds => ShareStatus::Mds,
            MemberType::Pmds => ShareStatus::Pmds,
            MemberType::Client => ShareStatus::Client,
        }
    }
}

/// A host participating in a shared file system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedMember {
    pub host: String,
    pub member_type: MemberType,
    pub mount_point: String,
    pub state: FsState,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub mount_at_boot: bool,
}

/// Parameters of an add-host-to-shared-fs call.
#[derive(Debug, Clone, PartialEq)]
pub struct AddMemberRequest {
    pub fs_name: String,
    pub server: String,
    pub mount_point: String,
    pub host: String,
    pub ip_addresses: Vec<String>,
    pub read_only: bool,
    pub mount_at_boot: bool,
    pub mount_after_add: bool,
    pub potential_server: bool,
    pub background: bool,
}

/// Managed server identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub architecture: String,
    pub api_version: String,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    pub setup: SetupKind,
}

/// One criteria of an archive policy applied to a file system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCriteria {
    pub policy_name: Option<String>,
    pub criteria_number: u32,
    #[serde(default)]
    pub starting_dir: String,
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub min_size: Option<String>,
    #[serde(default)]
    pub max_size: Option<String>,
    #[serde(default)]
    pub access_age: Option<String>,
    pub copies: u32,
    #[serde(default)]
    pub default_policy: bool,
    /// File systems this criteria applies to.
    #[serde(default)]
    pub file_systems: Vec<String>,
}

/// Archive, release and stage attribute codes.
pub mod attr {
    pub const ARCHIVE_DEFAULT: i32 = 0;
    pub const ARCHIVE_NEVER: i32 = 1;

    pub const RELEASE_DEFAULT: i32 = 0;
    pub const RELEASE_NEVER: i32 = 1;
    pub const RELEASE_ALWAYS: i32 = 2;
    pub const RELEASE_PARTIAL: i32 = 0x100;

    pub const STAGE_DEFAULT: i32 = 0;
    pub const STAGE_NEVER: i32 = 1;
    pub const STAGE_ASSOCIATIVE: i32 = 2;
}

/// Which attribute family a change-file-attributes call modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeMode {
    Archive,
    Release,
    Stage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub archive: i32,
    pub release: i32,
    pub stage: i32,
    #[serde(default)]
    pub partial_size_kb: Option<u32>,
}

/// A file or directory under a SAM file system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub copies: u32,
    #[serde(default)]
    pub attributes: FileAttributes,
}

impl FileEntry {
    pub fn name(&self) -> &str {
        if self.path == "/" {
            return "/";
        }
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectoryListing {
    pub entries: Vec<FileEntry>,
    pub total: usize,
}

impl DirectoryListing {
    pub fn truncated(&self) -> bool {
        self.entries.len() < self.total
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeAttributesRequest {
    pub mode: AttributeMode,
    pub path: String,
    pub new_option: i32,
    pub existing_option: i32,
    pub recursive: bool,
    pub partial_size_kb: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    pub fn label(self, plural: bool) -> &'static str {
        match (self, plural) {
            (TimeUnit::Minutes, false) => "minute",
            (TimeUnit::Minutes, true) => "minutes",
            (TimeUnit::Hours, false) => "hour",
            (TimeUnit::Hours, true) => "hours",
            (TimeUnit::Days, false) => "day",
            (TimeUnit::Days, true) => "days",
            (TimeUnit::Weeks, false) => "week",
            (TimeUnit::Weeks, true) => "weeks",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minutes" => Some(TimeUnit::Minutes),
            "hours" => Some(TimeUnit::Hours),
            "days" => Some(TimeUnit::Days),
            "weeks" => Some(TimeUnit::Weeks),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.label(true)
    }
}

/// Periodic recovery point (metadata snapshot) schedule of a file system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPointSchedule {
    pub fs_name: String,
    pub location: String,
    pub name_prefix: String,
    pub compress: bool,
    pub auto_index: bool,
    pub periodicity: u64,
    pub periodicity_unit: TimeUnit,
    pub start_hour: u8,
    pub start_minute: u8,
    /// `None` retains recovery points forever.
    pub retention: Option<(u64, TimeUnit)>,
    #[serde(default)]
    pub excluded_dirs: Vec<String>,
    #[serde(default)]
    pub pre_script: Option<String>,
    #[serde(default)]
    pub post_script: Option<String>,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// A recovery point file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpFile {
    /// Absolute path.
    pub file_name: String,
    pub compressed: bool,
    pub indexed: bool,
    #[serde(default)]
    pub processing: bool,
    #[serde(default)]
    pub broken: bool,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
    pub entries: u64,
    #[serde(default)]
    pub locked: bool,
}
