//! pacman-client - Command-line front end for the cockpit-pacman backend.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pacman_client::backend::{
    AddIgnored, BackendClient, CheckUpdates, CleanCache, DependencyDirection, DependencyTree,
    Downgrade, FetchMirrorStatus, FetchNews, GetCacheInfo, GetRebootStatus, GetScheduleConfig,
    GetScheduledRuns, GroupedHistory, History, HistoryFilter, InitKeyring, InstalledFilter,
    KeyringStatus, ListDowngrades, ListIgnored, ListInstalled, ListMirrors, ListOrphans,
    LocalPackageInfo, MirrorEntry, PreflightUpgrade, QueryOperation, ReasonFilter,
    RefreshKeyring, RemoveIgnored, RemoveOrphans, SaveMirrorlist, ScheduleMode, Search,
    SetScheduleConfig, Sort, SortDirection, StreamCallbacks, StreamOperation, StreamOutcome,
    SyncDatabase, SyncPackageInfo, Upgrade,
};
use pacman_client::config::{ClientConfig, ConfigLoader};
use pacman_client::display;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReasonArg {
    All,
    Explicit,
    Dependency,
}

impl From<ReasonArg> for ReasonFilter {
    fn from(arg: ReasonArg) -> Self {
        match arg {
            ReasonArg::All => ReasonFilter::All,
            ReasonArg::Explicit => ReasonFilter::Explicit,
            ReasonArg::Dependency => ReasonFilter::Dependency,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InstalledArg {
    All,
    Installed,
    NotInstalled,
}

impl From<InstalledArg> for InstalledFilter {
    fn from(arg: InstalledArg) -> Self {
        match arg {
            InstalledArg::All => InstalledFilter::All,
            InstalledArg::Installed => InstalledFilter::Installed,
            InstalledArg::NotInstalled => InstalledFilter::NotInstalled,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HistoryArg {
    All,
    Upgraded,
    Installed,
    Removed,
}

impl From<HistoryArg> for HistoryFilter {
    fn from(arg: HistoryArg) -> Self {
        match arg {
            HistoryArg::All => HistoryFilter::All,
            HistoryArg::Upgraded => HistoryFilter::Upgraded,
            HistoryArg::Installed => HistoryFilter::Installed,
            HistoryArg::Removed => HistoryFilter::Removed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Forward,
    Reverse,
    Both,
}

impl From<DirectionArg> for DependencyDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Forward => DependencyDirection::Forward,
            DirectionArg::Reverse => DependencyDirection::Reverse,
            DirectionArg::Both => DependencyDirection::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScheduleModeArg {
    Check,
    Upgrade,
}

impl From<ScheduleModeArg> for ScheduleMode {
    fn from(arg: ScheduleModeArg) -> Self {
        match arg {
            ScheduleModeArg::Check => ScheduleMode::Check,
            ScheduleModeArg::Upgrade => ScheduleMode::Upgrade,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "pacman-client",
    about = "Query and drive the cockpit-pacman backend",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the backend executable path.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Override the one-shot command deadline, in seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Do not truncate long output lines.
    #[arg(long, global = true)]
    raw: bool,

    /// Print streaming events as JSON lines instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Sort options shared by listing commands.
#[derive(Debug, clap::Args)]
struct SortArgs {
    /// Column to sort by.
    #[arg(long)]
    sort_by: Option<String>,
    /// Sort descending.
    #[arg(long, requires = "sort_by")]
    desc: bool,
}

impl SortArgs {
    fn into_sort(self) -> Option<Sort> {
        self.sort_by.map(|by| Sort {
            by,
            direction: if self.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            },
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List installed packages.
    ListInstalled {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Substring filter on name or description.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = ReasonArg::All)]
        filter: ReasonArg,
        /// Repository name.
        #[arg(long)]
        repo: Option<String>,
        #[command(flatten)]
        sort: SortArgs,
    },
    /// Search sync databases.
    Search {
        query: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = InstalledArg::All)]
        installed: InstalledArg,
        #[command(flatten)]
        sort: SortArgs,
    },
    /// Show package details.
    Info {
        name: String,
        /// Look the package up in the sync databases instead of locally.
        #[arg(long)]
        sync: bool,
        /// Repository for sync lookups.
        #[arg(long, requires = "sync")]
        repo: Option<String>,
    },
    /// List available updates.
    Updates,
    /// List orphaned packages.
    Orphans,
    /// Show package cache usage.
    Cache,
    /// Show the transaction log.
    History {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = HistoryArg::All)]
        filter: HistoryArg,
        /// Group entries into transactions.
        #[arg(long)]
        grouped: bool,
    },
    /// Show recent Arch Linux news.
    News {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Inspect or rewrite the mirrorlist.
    Mirrors {
        #[command(subcommand)]
        action: Option<MirrorAction>,
    },
    /// Inspect or change scheduled upgrades.
    Schedule {
        #[command(subcommand)]
        action: Option<ScheduleAction>,
    },
    /// Show keyring status.
    Keyring,
    /// List cached versions available for downgrade.
    Downgrades { package: Option<String> },
    /// Check what an upgrade would do.
    Preflight {
        /// Packages to ignore (comma separated).
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,
    },
    /// Show a package's dependency graph.
    Deps {
        name: String,
        #[arg(long, default_value_t = 3)]
        depth: u32,
        #[arg(long, value_enum, default_value_t = DirectionArg::Forward)]
        direction: DirectionArg,
    },
    /// Check whether a reboot is recommended.
    RebootStatus,
    /// Manage ignored packages.
    Ignored {
        #[command(subcommand)]
        action: Option<IgnoredAction>,
    },
    /// Synchronize package databases.
    Sync {
        /// Force a refresh even if databases are current.
        #[arg(long)]
        force: bool,
        /// Backend-side timeout, in seconds.
        #[arg(long)]
        op_timeout: Option<u64>,
    },
    /// Upgrade the system.
    Upgrade {
        /// Packages to ignore (comma separated).
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,
        /// Backend-side timeout, in seconds.
        #[arg(long)]
        op_timeout: Option<u64>,
    },
    /// Remove orphaned packages.
    RemoveOrphans {
        /// Backend-side timeout, in seconds.
        #[arg(long)]
        op_timeout: Option<u64>,
    },
    /// Remove old package versions from the cache.
    CleanCache {
        /// Versions of each package to keep.
        #[arg(long, default_value_t = 3)]
        keep: u32,
    },
    /// Install a cached older version of a package.
    Downgrade {
        name: String,
        version: String,
        /// Backend-side timeout, in seconds.
        #[arg(long)]
        op_timeout: Option<u64>,
    },
    /// Refresh keys from the keyserver.
    RefreshKeyring,
    /// Initialize and populate the keyring.
    InitKeyring,
}

#[derive(Subcommand)]
enum IgnoredAction {
    /// List ignored packages.
    List,
    /// Add a package to the ignore list.
    Add { package: String },
    /// Remove a package from the ignore list.
    Remove { package: String },
}

#[derive(Subcommand)]
enum MirrorAction {
    /// List configured mirrors.
    List,
    /// Fetch mirror health from archlinux.org.
    Status,
    /// Replace the mirrorlist with entries from a JSON file.
    Save {
        /// JSON array of `{url, enabled, comment}` objects.
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Show the schedule configuration and timer state.
    Show,
    /// Change the schedule; omitted options keep their current value.
    Set {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long, value_enum)]
        mode: Option<ScheduleModeArg>,
        /// systemd `OnCalendar` expression.
        #[arg(long)]
        calendar: Option<String>,
        #[arg(long)]
        max_packages: Option<usize>,
    },
    /// Show past scheduled runs, newest first.
    Runs {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

fn read_mirrors(path: &Path) -> Result<Vec<MirrorEntry>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Invalid mirror file {}: {e}", path.display()))
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig, String> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    tracing::debug!(paths = ?loader.search_paths(), "Config search paths");
    let mut config = loader.load().map_err(|e| e.to_string())?;
    if let Some(backend) = &cli.backend {
        config.backend_path.clone_from(backend);
    }
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }
    Ok(config)
}

async fn run_query<Q>(client: &BackendClient, op: &Q) -> ExitCode
where
    Q: QueryOperation,
    Q::Response: Serialize,
{
    match client.query(op).await {
        Ok(response) => {
            display::print_json(&response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(command = Q::NAME, kind = %e.kind, "Query failed");
            display::print_client_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run_stream<O: StreamOperation>(
    client: &BackendClient,
    op: &O,
    raw: bool,
    json: bool,
) -> ExitCode {
    let callbacks = if json {
        StreamCallbacks::new().on_event(display::print_event_json)
    } else {
        display::print_operation_start(O::NAME);
        StreamCallbacks::new().on_data(move |text| display::print_stream_text(text, raw))
    };

    let handle = client.stream(op, callbacks);
    let canceller = handle.canceller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            canceller.cancel();
        }
    });

    let outcome = handle.finished().await;
    interrupt.abort();

    match outcome {
        StreamOutcome::Completed => {
            if !json {
                display::print_complete(O::NAME);
            }
            ExitCode::SUCCESS
        }
        StreamOutcome::Failed(message) => {
            if !json {
                display::print_failure(O::NAME, &message);
            }
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(client: &BackendClient, command: Commands, raw: bool, json: bool) -> ExitCode {
    match command {
        Commands::ListInstalled {
            offset,
            limit,
            search,
            filter,
            repo,
            sort,
        } => {
            let op = ListInstalled {
                offset,
                limit,
                search,
                filter: filter.into(),
                repo,
                sort: sort.into_sort(),
            };
            run_query(client, &op).await
        }
        Commands::Search {
            query,
            offset,
            limit,
            installed,
            sort,
        } => {
            let op = Search {
                query,
                offset,
                limit,
                installed: installed.into(),
                sort: sort.into_sort(),
            };
            run_query(client, &op).await
        }
        Commands::Info { name, sync, repo } => {
            if sync {
                run_query(client, &SyncPackageInfo { name, repo }).await
            } else {
                run_query(client, &LocalPackageInfo { name }).await
            }
        }
        Commands::Updates => run_query(client, &CheckUpdates).await,
        Commands::Orphans => run_query(client, &ListOrphans).await,
        Commands::Cache => run_query(client, &GetCacheInfo).await,
        Commands::History {
            offset,
            limit,
            filter,
            grouped,
        } => {
            if grouped {
                let op = GroupedHistory {
                    offset,
                    limit,
                    filter: filter.into(),
                };
                run_query(client, &op).await
            } else {
                let op = History {
                    offset,
                    limit,
                    filter: filter.into(),
                };
                run_query(client, &op).await
            }
        }
        Commands::News { days } => run_query(client, &FetchNews { days }).await,
        Commands::Mirrors { action } => match action.unwrap_or(MirrorAction::List) {
            MirrorAction::List => run_query(client, &ListMirrors).await,
            MirrorAction::Status => run_query(client, &FetchMirrorStatus).await,
            MirrorAction::Save { file } => match read_mirrors(&file) {
                Ok(mirrors) => run_query(client, &SaveMirrorlist { mirrors }).await,
                Err(e) => {
                    display::print_error(&e);
                    ExitCode::FAILURE
                }
            },
        },
        Commands::Schedule { action } => match action.unwrap_or(ScheduleAction::Show) {
            ScheduleAction::Show => run_query(client, &GetScheduleConfig).await,
            ScheduleAction::Set {
                enabled,
                mode,
                calendar,
                max_packages,
            } => {
                let op = SetScheduleConfig {
                    enabled,
                    mode: mode.map(Into::into),
                    schedule: calendar,
                    max_packages,
                };
                run_query(client, &op).await
            }
            ScheduleAction::Runs { offset, limit } => {
                run_query(client, &GetScheduledRuns { offset, limit }).await
            }
        },
        Commands::Keyring => run_query(client, &KeyringStatus).await,
        Commands::Downgrades { package } => run_query(client, &ListDowngrades { package }).await,
        Commands::Preflight { ignore } => run_query(client, &PreflightUpgrade { ignore }).await,
        Commands::Deps {
            name,
            depth,
            direction,
        } => {
            let op = DependencyTree {
                name,
                depth,
                direction: direction.into(),
            };
            run_query(client, &op).await
        }
        Commands::RebootStatus => run_query(client, &GetRebootStatus).await,
        Commands::Ignored { action } => match action.unwrap_or(IgnoredAction::List) {
            IgnoredAction::List => run_query(client, &ListIgnored).await,
            IgnoredAction::Add { package } => run_query(client, &AddIgnored { package }).await,
            IgnoredAction::Remove { package } => {
                run_query(client, &RemoveIgnored { package }).await
            }
        },
        Commands::Sync { force, op_timeout } => {
            let op = SyncDatabase {
                force,
                timeout_secs: op_timeout,
            };
            run_stream(client, &op, raw, json).await
        }
        Commands::Upgrade { ignore, op_timeout } => {
            let op = Upgrade {
                ignore,
                timeout_secs: op_timeout,
            };
            run_stream(client, &op, raw, json).await
        }
        Commands::RemoveOrphans { op_timeout } => {
            let op = RemoveOrphans {
                timeout_secs: op_timeout,
            };
            run_stream(client, &op, raw, json).await
        }
        Commands::CleanCache { keep } => {
            run_stream(client, &CleanCache { keep_versions: keep }, raw, json).await
        }
        Commands::Downgrade {
            name,
            version,
            op_timeout,
        } => {
            let op = Downgrade {
                name,
                version,
                timeout_secs: op_timeout,
            };
            run_stream(client, &op, raw, json).await
        }
        Commands::RefreshKeyring => run_stream(client, &RefreshKeyring, raw, json).await,
        Commands::InitKeyring => run_stream(client, &InitKeyring, raw, json).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        backend = %config.backend_path,
        timeout_secs = config.timeout_secs,
        "Starting pacman client"
    );

    let client = BackendClient::new(&config);
    dispatch(&client, cli.command, cli.raw, cli.json).await
}
