//! Response payloads of one-shot backend queries.
//!
//! Fields the backend may omit on older versions default rather than fail,
//! so `#[serde(default)]` is used generously.

use serde::{Deserialize, Serialize};

/// An installed package row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub installed_size: i64,
    #[serde(default)]
    pub install_date: Option<i64>,
    /// `explicit` or `dependency`.
    pub reason: String,
    #[serde(default)]
    pub repository: Option<String>,
}

/// Response of `list-installed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageListResponse {
    pub packages: Vec<Package>,
    pub total: usize,
    #[serde(default)]
    pub total_explicit: usize,
    #[serde(default)]
    pub total_dependency: usize,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// One pending upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub name: String,
    pub current_version: String,
    pub new_version: String,
    pub download_size: i64,
    #[serde(default)]
    pub current_size: i64,
    #[serde(default)]
    pub new_size: i64,
    #[serde(default)]
    pub repository: String,
}

/// Response of `check-updates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatesResponse {
    pub updates: Vec<UpdateInfo>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Response of `local-package-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDetails {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub licenses: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub optdepends: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub replaces: Vec<String>,
    pub installed_size: i64,
    #[serde(default)]
    pub packager: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    pub build_date: i64,
    #[serde(default)]
    pub install_date: Option<i64>,
    pub reason: String,
    #[serde(default)]
    pub validation: Vec<String>,
    #[serde(default)]
    pub repository: Option<String>,
}

/// Response of `sync-package-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPackageDetails {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub licenses: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub optdepends: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub replaces: Vec<String>,
    pub download_size: i64,
    pub installed_size: i64,
    #[serde(default)]
    pub packager: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    pub build_date: i64,
    pub repository: String,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub repository: String,
    pub installed: bool,
    #[serde(default)]
    pub installed_version: Option<String>,
}

/// Response of `search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
    #[serde(default)]
    pub total_installed: usize,
    #[serde(default)]
    pub total_not_installed: usize,
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// A package no longer required by anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub installed_size: i64,
    #[serde(default)]
    pub install_date: Option<i64>,
    #[serde(default)]
    pub repository: Option<String>,
}

/// Response of `list-orphans`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanResponse {
    pub orphans: Vec<OrphanPackage>,
    pub total_size: i64,
}

/// A package file in the cache directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePackage {
    pub name: String,
    pub version: String,
    pub filename: String,
    pub size: i64,
}

/// Response of `cache-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub total_size: i64,
    pub package_count: usize,
    pub packages: Vec<CachePackage>,
    pub path: String,
}

/// One pacman.log transaction entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub action: String,
    pub package: String,
    #[serde(default)]
    pub old_version: Option<String>,
    #[serde(default)]
    pub new_version: Option<String>,
}

/// Response of `history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogResponse {
    pub entries: Vec<LogEntry>,
    pub total: usize,
    #[serde(default)]
    pub total_upgraded: usize,
    #[serde(default)]
    pub total_installed: usize,
    #[serde(default)]
    pub total_removed: usize,
    #[serde(default)]
    pub total_other: usize,
}

/// A key in the pacman keyring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyringKey {
    pub fingerprint: String,
    pub uid: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
    pub trust: String,
}

/// Response of `keyring-status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyringStatusResponse {
    pub keys: Vec<KeyringKey>,
    pub total: usize,
    pub master_key_initialized: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A cached package version available for downgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedVersion {
    pub name: String,
    pub version: String,
    pub filename: String,
    pub size: i64,
    #[serde(default)]
    pub installed_version: Option<String>,
    pub is_older: bool,
}

/// Response of `list-downgrades`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowngradeResponse {
    pub packages: Vec<CachedVersion>,
    pub total: usize,
}

/// Two packages that cannot be installed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub package1: String,
    pub package2: String,
}

/// A package replaced by another during upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementInfo {
    pub old_package: String,
    pub new_package: String,
}

/// A dependency satisfiable by several providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderChoice {
    pub dependency: String,
    pub providers: Vec<String>,
}

/// A PGP key that would be imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub fingerprint: String,
    pub uid: String,
}

/// Response of `preflight-upgrade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub conflicts: Vec<ConflictInfo>,
    #[serde(default)]
    pub replacements: Vec<ReplacementInfo>,
    #[serde(default)]
    pub removals: Vec<String>,
    #[serde(default)]
    pub providers: Vec<ProviderChoice>,
    #[serde(default)]
    pub import_keys: Vec<KeyInfo>,
    #[serde(default)]
    pub packages_to_upgrade: usize,
    #[serde(default)]
    pub total_download_size: i64,
}

impl PreflightResponse {
    /// Whether the upgrade needs a decision from the user before running.
    #[must_use]
    pub fn needs_confirmation(&self) -> bool {
        !self.conflicts.is_empty()
            || !self.replacements.is_empty()
            || !self.removals.is_empty()
            || !self.providers.is_empty()
            || !self.import_keys.is_empty()
    }
}

/// Response of `reboot-status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebootStatus {
    pub requires_reboot: bool,
    /// `none`, `kernel_update` or `critical_packages`.
    pub reason: String,
    #[serde(default)]
    pub running_kernel: Option<String>,
    #[serde(default)]
    pub installed_kernel: Option<String>,
    #[serde(default)]
    pub kernel_package: Option<String>,
    #[serde(default)]
    pub updated_packages: Vec<String>,
}

/// Response of `list-ignored`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoredPackagesResponse {
    pub packages: Vec<String>,
    pub total: usize,
}

/// Response of `add-ignored` and `remove-ignored`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoreOperationResponse {
    pub success: bool,
    pub package: String,
    pub message: String,
}

/// A transaction burst: log entries no more than a minute apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogGroup {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub upgraded_count: usize,
    #[serde(default)]
    pub installed_count: usize,
    #[serde(default)]
    pub removed_count: usize,
    #[serde(default)]
    pub downgraded_count: usize,
    #[serde(default)]
    pub reinstalled_count: usize,
}

/// Response of `history-grouped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedLogResponse {
    pub groups: Vec<LogGroup>,
    pub total_groups: usize,
    #[serde(default)]
    pub total_upgraded: usize,
    #[serde(default)]
    pub total_installed: usize,
    #[serde(default)]
    pub total_removed: usize,
    #[serde(default)]
    pub total_other: usize,
}

/// An Arch news announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    /// RFC 3339 publication time.
    pub published: String,
    #[serde(default)]
    pub summary: String,
}

/// Response of `news`. Empty when the feed could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsResponse {
    pub items: Vec<NewsItem>,
}

/// One `Server =` line of the mirrorlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorEntry {
    pub url: String,
    /// False for commented-out servers.
    pub enabled: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Response of `list-mirrors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorListResponse {
    pub mirrors: Vec<MirrorEntry>,
    pub total: usize,
    #[serde(default)]
    pub enabled_count: usize,
    pub path: String,
    /// Unix seconds.
    #[serde(default)]
    pub last_modified: Option<i64>,
}

/// Health of one mirror as reported by archlinux.org.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorStatus {
    pub url: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub last_sync: Option<String>,
    #[serde(default)]
    pub delay: Option<i64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub completion_pct: Option<f64>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub ipv4: bool,
    #[serde(default)]
    pub ipv6: bool,
}

/// Response of `mirror-status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorStatusResponse {
    pub mirrors: Vec<MirrorStatus>,
    pub total: usize,
    #[serde(default)]
    pub last_check: Option<String>,
}

/// Response of `save-mirrorlist`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMirrorlistResponse {
    pub success: bool,
    /// Copy of the previous mirrorlist, when one existed.
    #[serde(default)]
    pub backup_path: Option<String>,
    pub message: String,
}

/// Response of `get-schedule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfigResponse {
    pub enabled: bool,
    /// `check` or `upgrade`.
    pub mode: String,
    /// systemd `OnCalendar` expression.
    pub schedule: String,
    pub max_packages: usize,
    #[serde(default)]
    pub timer_active: bool,
    #[serde(default)]
    pub timer_next_run: Option<String>,
}

/// Response of `set-schedule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSetResponse {
    pub success: bool,
    pub message: String,
}

/// One recorded run of the scheduled upgrade timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRunEntry {
    pub timestamp: String,
    pub mode: String,
    pub success: bool,
    #[serde(default)]
    pub packages_checked: usize,
    #[serde(default)]
    pub packages_upgraded: usize,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
}

/// Response of `scheduled-runs`, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRunsResponse {
    pub runs: Vec<ScheduledRunEntry>,
    pub total: usize,
}
