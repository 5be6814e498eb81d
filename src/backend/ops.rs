//! Backend operations and their argv encoding.
//!
//! Every operation is a parameter struct that knows its subcommand name
//! and serializes itself into positional arguments here and nowhere else.
//! The backend parses arguments by position, so the order produced by each
//! `args()` is a contract with the backend: reorder only together with a
//! backend change.

use serde::de::DeserializeOwned;

use serde_json::json;

use super::models::{
    CacheInfo, DowngradeResponse, GroupedLogResponse, IgnoreOperationResponse,
    IgnoredPackagesResponse, KeyringStatusResponse, LogResponse, MirrorEntry,
    MirrorListResponse, MirrorStatusResponse, NewsResponse, OrphanResponse, PackageDetails,
    PackageListResponse, PreflightResponse, RebootStatus, SaveMirrorlistResponse,
    ScheduleConfigResponse, ScheduleSetResponse, ScheduledRunsResponse, SearchResponse,
    SyncPackageDetails, UpdatesResponse,
};
use super::process::{BackendCommand, Privilege};

/// A backend subcommand with fixed-order positional arguments.
pub trait BackendOperation {
    /// Subcommand name.
    const NAME: &'static str;
    /// Privilege the backend needs for this operation.
    const PRIVILEGE: Privilege = Privilege::Optional;

    /// Positional arguments, in backend order.
    fn args(&self) -> Vec<String>;

    /// The full command for this operation.
    fn command(&self) -> BackendCommand {
        BackendCommand::new(Self::NAME, Self::PRIVILEGE).args(self.args())
    }
}

/// An operation answered by a single JSON document.
pub trait QueryOperation: BackendOperation {
    /// Payload type of a successful response.
    type Response: DeserializeOwned;
}

/// A long-running operation reported through stream events.
pub trait StreamOperation: BackendOperation {}

/// Installed-package reason filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReasonFilter {
    #[default]
    All,
    Explicit,
    Dependency,
}

impl ReasonFilter {
    fn as_arg(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Explicit => "explicit",
            Self::Dependency => "dependency",
        }
    }
}

/// Search filter on installation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstalledFilter {
    #[default]
    All,
    Installed,
    NotInstalled,
}

impl InstalledFilter {
    fn as_arg(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Installed => "installed",
            Self::NotInstalled => "not-installed",
        }
    }
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_arg(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Sort key plus direction; absent sort is sent as two empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Column name understood by the backend (`name`, `size`, ...).
    pub by: String,
    /// Direction.
    pub direction: SortDirection,
}

fn sort_args(sort: Option<&Sort>) -> [String; 2] {
    match sort {
        Some(s) => [s.by.clone(), s.direction.as_arg().to_string()],
        None => [String::new(), String::new()],
    }
}

/// Transaction log filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryFilter {
    #[default]
    All,
    Upgraded,
    Installed,
    Removed,
}

impl HistoryFilter {
    fn as_arg(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Upgraded => "upgraded",
            Self::Installed => "installed",
            Self::Removed => "removed",
        }
    }
}

/// Which edges of the dependency graph to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyDirection {
    #[default]
    Forward,
    Reverse,
    Both,
}

impl DependencyDirection {
    fn as_arg(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
            Self::Both => "both",
        }
    }
}

/// What a scheduled run does with available updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleMode {
    Check,
    #[default]
    Upgrade,
}

impl ScheduleMode {
    fn as_arg(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Upgrade => "upgrade",
        }
    }
}

fn optional_timeout(args: &mut Vec<String>, timeout_secs: Option<u64>) {
    if let Some(secs) = timeout_secs {
        args.push(secs.to_string());
    }
}

/// `list-installed offset limit search filter repo sort_by sort_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListInstalled {
    pub offset: usize,
    pub limit: usize,
    pub search: Option<String>,
    pub filter: ReasonFilter,
    /// Repository name; `None` means all.
    pub repo: Option<String>,
    pub sort: Option<Sort>,
}

impl Default for ListInstalled {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
            search: None,
            filter: ReasonFilter::All,
            repo: None,
            sort: None,
        }
    }
}

impl BackendOperation for ListInstalled {
    const NAME: &'static str = "list-installed";

    fn args(&self) -> Vec<String> {
        let [sort_by, sort_dir] = sort_args(self.sort.as_ref());
        vec![
            self.offset.to_string(),
            self.limit.to_string(),
            self.search.clone().unwrap_or_default(),
            self.filter.as_arg().to_string(),
            self.repo.clone().unwrap_or_else(|| "all".to_string()),
            sort_by,
            sort_dir,
        ]
    }
}

impl QueryOperation for ListInstalled {
    type Response = PackageListResponse;
}

/// `check-updates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckUpdates;

impl BackendOperation for CheckUpdates {
    const NAME: &'static str = "check-updates";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for CheckUpdates {
    type Response = UpdatesResponse;
}

/// `local-package-info name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackageInfo {
    pub name: String,
}

impl BackendOperation for LocalPackageInfo {
    const NAME: &'static str = "local-package-info";

    fn args(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

impl QueryOperation for LocalPackageInfo {
    type Response = PackageDetails;
}

/// `sync-package-info name [repo]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPackageInfo {
    pub name: String,
    pub repo: Option<String>,
}

impl BackendOperation for SyncPackageInfo {
    const NAME: &'static str = "sync-package-info";

    fn args(&self) -> Vec<String> {
        let mut args = vec![self.name.clone()];
        if let Some(repo) = &self.repo {
            args.push(repo.clone());
        }
        args
    }
}

impl QueryOperation for SyncPackageInfo {
    type Response = SyncPackageDetails;
}

/// `search query offset limit installed sort_by sort_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub query: String,
    pub offset: usize,
    pub limit: usize,
    pub installed: InstalledFilter,
    pub sort: Option<Sort>,
}

impl Search {
    /// Search with default paging (first 100 hits).
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            offset: 0,
            limit: 100,
            installed: InstalledFilter::All,
            sort: None,
        }
    }
}

impl BackendOperation for Search {
    const NAME: &'static str = "search";

    fn args(&self) -> Vec<String> {
        let [sort_by, sort_dir] = sort_args(self.sort.as_ref());
        vec![
            self.query.clone(),
            self.offset.to_string(),
            self.limit.to_string(),
            self.installed.as_arg().to_string(),
            sort_by,
            sort_dir,
        ]
    }
}

impl QueryOperation for Search {
    type Response = SearchResponse;
}

/// `list-orphans`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListOrphans;

impl BackendOperation for ListOrphans {
    const NAME: &'static str = "list-orphans";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for ListOrphans {
    type Response = OrphanResponse;
}

/// `cache-info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetCacheInfo;

impl BackendOperation for GetCacheInfo {
    const NAME: &'static str = "cache-info";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for GetCacheInfo {
    type Response = CacheInfo;
}

/// `history offset limit filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    pub offset: usize,
    pub limit: usize,
    pub filter: HistoryFilter,
}

impl Default for History {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
            filter: HistoryFilter::All,
        }
    }
}

impl BackendOperation for History {
    const NAME: &'static str = "history";

    fn args(&self) -> Vec<String> {
        vec![
            self.offset.to_string(),
            self.limit.to_string(),
            self.filter.as_arg().to_string(),
        ]
    }
}

impl QueryOperation for History {
    type Response = LogResponse;
}

/// `keyring-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyringStatus;

impl BackendOperation for KeyringStatus {
    const NAME: &'static str = "keyring-status";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for KeyringStatus {
    type Response = KeyringStatusResponse;
}

/// `list-downgrades [package]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListDowngrades {
    pub package: Option<String>,
}

impl BackendOperation for ListDowngrades {
    const NAME: &'static str = "list-downgrades";

    fn args(&self) -> Vec<String> {
        self.package.iter().cloned().collect()
    }
}

impl QueryOperation for ListDowngrades {
    type Response = DowngradeResponse;
}

/// `preflight-upgrade [ignored,csv]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreflightUpgrade {
    pub ignore: Vec<String>,
}

impl BackendOperation for PreflightUpgrade {
    const NAME: &'static str = "preflight-upgrade";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        if self.ignore.is_empty() {
            Vec::new()
        } else {
            vec![self.ignore.join(",")]
        }
    }
}

impl QueryOperation for PreflightUpgrade {
    type Response = PreflightResponse;
}

/// `dependency-tree name depth direction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTree {
    pub name: String,
    pub depth: u32,
    pub direction: DependencyDirection,
}

impl DependencyTree {
    /// Forward dependencies three levels deep.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depth: 3,
            direction: DependencyDirection::Forward,
        }
    }
}

impl BackendOperation for DependencyTree {
    const NAME: &'static str = "dependency-tree";

    fn args(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.depth.to_string(),
            self.direction.as_arg().to_string(),
        ]
    }
}

impl QueryOperation for DependencyTree {
    type Response = serde_json::Value;
}

/// `reboot-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetRebootStatus;

impl BackendOperation for GetRebootStatus {
    const NAME: &'static str = "reboot-status";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for GetRebootStatus {
    type Response = RebootStatus;
}

/// `list-ignored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListIgnored;

impl BackendOperation for ListIgnored {
    const NAME: &'static str = "list-ignored";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for ListIgnored {
    type Response = IgnoredPackagesResponse;
}

/// `add-ignored package`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddIgnored {
    pub package: String,
}

impl BackendOperation for AddIgnored {
    const NAME: &'static str = "add-ignored";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        vec![self.package.clone()]
    }
}

impl QueryOperation for AddIgnored {
    type Response = IgnoreOperationResponse;
}

/// `remove-ignored package`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveIgnored {
    pub package: String,
}

impl BackendOperation for RemoveIgnored {
    const NAME: &'static str = "remove-ignored";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        vec![self.package.clone()]
    }
}

impl QueryOperation for RemoveIgnored {
    type Response = IgnoreOperationResponse;
}

/// `history-grouped offset limit filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedHistory {
    pub offset: usize,
    pub limit: usize,
    pub filter: HistoryFilter,
}

impl Default for GroupedHistory {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
            filter: HistoryFilter::All,
        }
    }
}

impl BackendOperation for GroupedHistory {
    const NAME: &'static str = "history-grouped";

    fn args(&self) -> Vec<String> {
        vec![
            self.offset.to_string(),
            self.limit.to_string(),
            self.filter.as_arg().to_string(),
        ]
    }
}

impl QueryOperation for GroupedHistory {
    type Response = GroupedLogResponse;
}

/// `news days`. The backend caps `days` at 365.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchNews {
    pub days: u32,
}

impl Default for FetchNews {
    fn default() -> Self {
        Self { days: 30 }
    }
}

impl BackendOperation for FetchNews {
    const NAME: &'static str = "news";

    fn args(&self) -> Vec<String> {
        vec![self.days.to_string()]
    }
}

impl QueryOperation for FetchNews {
    type Response = NewsResponse;
}

/// `list-mirrors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListMirrors;

impl BackendOperation for ListMirrors {
    const NAME: &'static str = "list-mirrors";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for ListMirrors {
    type Response = MirrorListResponse;
}

/// `mirror-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchMirrorStatus;

impl BackendOperation for FetchMirrorStatus {
    const NAME: &'static str = "mirror-status";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for FetchMirrorStatus {
    type Response = MirrorStatusResponse;
}

/// `save-mirrorlist mirrors_json`.
///
/// The whole list travels as one JSON array argument, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveMirrorlist {
    pub mirrors: Vec<MirrorEntry>,
}

impl BackendOperation for SaveMirrorlist {
    const NAME: &'static str = "save-mirrorlist";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        let entries: Vec<_> = self
            .mirrors
            .iter()
            .map(|m| json!({ "url": m.url, "enabled": m.enabled, "comment": m.comment }))
            .collect();
        vec![serde_json::Value::Array(entries).to_string()]
    }
}

impl QueryOperation for SaveMirrorlist {
    type Response = SaveMirrorlistResponse;
}

/// `get-schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetScheduleConfig;

impl BackendOperation for GetScheduleConfig {
    const NAME: &'static str = "get-schedule";

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl QueryOperation for GetScheduleConfig {
    type Response = ScheduleConfigResponse;
}

/// `set-schedule enabled mode schedule max_packages`.
///
/// Unset fields are sent as empty strings and leave the stored value alone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetScheduleConfig {
    pub enabled: Option<bool>,
    pub mode: Option<ScheduleMode>,
    /// systemd `OnCalendar` expression.
    pub schedule: Option<String>,
    pub max_packages: Option<usize>,
}

impl BackendOperation for SetScheduleConfig {
    const NAME: &'static str = "set-schedule";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        vec![
            self.enabled.map(|e| e.to_string()).unwrap_or_default(),
            self.mode.map(|m| m.as_arg().to_string()).unwrap_or_default(),
            self.schedule.clone().unwrap_or_default(),
            self.max_packages
                .map(|n| n.to_string())
                .unwrap_or_default(),
        ]
    }
}

impl QueryOperation for SetScheduleConfig {
    type Response = ScheduleSetResponse;
}

/// `scheduled-runs offset limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetScheduledRuns {
    pub offset: usize,
    pub limit: usize,
}

impl Default for GetScheduledRuns {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

impl BackendOperation for GetScheduledRuns {
    const NAME: &'static str = "scheduled-runs";

    fn args(&self) -> Vec<String> {
        vec![self.offset.to_string(), self.limit.to_string()]
    }
}

impl QueryOperation for GetScheduledRuns {
    type Response = ScheduledRunsResponse;
}

/// `sync-database force [timeout]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncDatabase {
    pub force: bool,
    pub timeout_secs: Option<u64>,
}

impl BackendOperation for SyncDatabase {
    const NAME: &'static str = "sync-database";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        let mut args = vec![self.force.to_string()];
        optional_timeout(&mut args, self.timeout_secs);
        args
    }
}

impl StreamOperation for SyncDatabase {}

/// `upgrade ignored,csv [timeout]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Upgrade {
    pub ignore: Vec<String>,
    pub timeout_secs: Option<u64>,
}

impl BackendOperation for Upgrade {
    const NAME: &'static str = "upgrade";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        let mut args = vec![self.ignore.join(",")];
        optional_timeout(&mut args, self.timeout_secs);
        args
    }
}

impl StreamOperation for Upgrade {}

/// `remove-orphans [timeout]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoveOrphans {
    pub timeout_secs: Option<u64>,
}

impl BackendOperation for RemoveOrphans {
    const NAME: &'static str = "remove-orphans";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        optional_timeout(&mut args, self.timeout_secs);
        args
    }
}

impl StreamOperation for RemoveOrphans {}

/// `clean-cache keep_versions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanCache {
    pub keep_versions: u32,
}

impl Default for CleanCache {
    fn default() -> Self {
        Self { keep_versions: 3 }
    }
}

impl BackendOperation for CleanCache {
    const NAME: &'static str = "clean-cache";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        vec![self.keep_versions.to_string()]
    }
}

impl StreamOperation for CleanCache {}

/// `downgrade name version [timeout]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downgrade {
    pub name: String,
    pub version: String,
    pub timeout_secs: Option<u64>,
}

impl BackendOperation for Downgrade {
    const NAME: &'static str = "downgrade";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        let mut args = vec![self.name.clone(), self.version.clone()];
        optional_timeout(&mut args, self.timeout_secs);
        args
    }
}

impl StreamOperation for Downgrade {}

/// `refresh-keyring`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshKeyring;

impl BackendOperation for RefreshKeyring {
    const NAME: &'static str = "refresh-keyring";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl StreamOperation for RefreshKeyring {}

/// `init-keyring`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitKeyring;

impl BackendOperation for InitKeyring {
    const NAME: &'static str = "init-keyring";
    const PRIVILEGE: Privilege = Privilege::Required;

    fn args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl StreamOperation for InitKeyring {}
