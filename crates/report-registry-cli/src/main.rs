// crates/report-registry-cli/src/main.rs
// ============================================================================
// Module: Report Registry CLI Entry Point
// Description: Command dispatcher for report format administration.
// Purpose: Drive every lifecycle operation and the feed sync from a shell.
// Dependencies: clap, report-registry-config, report-registry-engine,
//               serde_json, thiserror, tracing, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `report-registry` binary loads `report-registry.toml`, opens the
//! resource store and asset tree under `state_dir`, and runs one command as
//! the user named by `--user`. Results are written to stdout (JSON for
//! reads), diagnostics to stderr through `tracing`.
//!
//! Security posture: command arguments and input files are untrusted and
//! size-limited before use.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use report_registry_config::RegistryConfig;
use report_registry_config::config_toml_example;
use report_registry_core::Authorizer;
use report_registry_core::RegistryError;
use report_registry_core::RequestContext;
use report_registry_core::ResourceUuid;
use report_registry_core::UserRef;
use report_registry_engine::AssetLayout;
use report_registry_engine::FeedConfig;
use report_registry_engine::FeedSyncReport;
use report_registry_engine::FeedSynchronizer;
use report_registry_engine::ModifyRequest;
use report_registry_engine::ParamUpdate;
use report_registry_engine::ProcessSignatureVerifier;
use report_registry_engine::ReportFormatRegistry;
use report_registry_engine::ScriptRenderer;
use report_registry_engine::SignatureDirectory;
use report_registry_engine::read_report_format_document;
use report_registry_store_sqlite::SqliteResourceStore;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a detached signature file.
const MAX_SIGNATURE_BYTES: usize = 64 * 1024;
/// Maximum size of a report XML passed to `apply`.
const MAX_REPORT_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "report-registry", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file (overrides `REPORT_REGISTRY_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Acting user, by uuid or name.
    #[arg(long, value_name = "USER", global = true)]
    user: Option<String>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the registry with the feed directory.
    SyncFeed {
        /// Update every known document regardless of modification time.
        #[arg(long)]
        rebuild: bool,
        /// Repeat every `feed.sync_interval_secs` until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Import a report format document.
    Import {
        /// Report format XML document.
        document: PathBuf,
        /// Detached signature overriding any embedded one.
        #[arg(long, value_name = "PATH")]
        signature: Option<PathBuf>,
    },
    /// Copy a report format.
    Copy {
        /// Source uuid.
        uuid: String,
        /// Name of the copy.
        #[arg(long)]
        name: Option<String>,
    },
    /// Modify a report format.
    Modify(ModifyCommand),
    /// Move a report format to the trash, or delete it ultimately.
    Delete {
        /// Report format uuid (trash uuid with `--ultimate`).
        uuid: String,
        /// Delete without passing through the trash.
        #[arg(long)]
        ultimate: bool,
    },
    /// Restore a trashed report format.
    Restore {
        /// Trash uuid.
        uuid: String,
    },
    /// Re-verify a report format signature.
    Verify {
        /// Report format uuid.
        uuid: String,
    },
    /// Render a report with a report format.
    Apply {
        /// Report format uuid.
        uuid: String,
        /// Report XML to render.
        #[arg(long, value_name = "PATH")]
        report: PathBuf,
        /// Directory receiving the rendered output.
        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,
    },
    /// Print one report format as JSON.
    Get {
        /// Report format uuid.
        uuid: String,
        /// Look in the trash.
        #[arg(long)]
        trash: bool,
    },
    /// List report formats as JSON.
    List {
        /// List the trash instead.
        #[arg(long)]
        trash: bool,
    },
    /// Check a candidate param value.
    ValidateParam {
        /// Report format uuid.
        uuid: String,
        /// Param name.
        name: String,
        /// Candidate value.
        value: String,
    },
    /// Delete every unused trashed report format of the acting user.
    EmptyTrash,
    /// User administration.
    User {
        /// Selected user subcommand.
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Role administration.
    Role {
        /// Selected role subcommand.
        #[command(subcommand)]
        command: RoleCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `modify`.
#[derive(Args, Debug)]
struct ModifyCommand {
    /// Report format uuid.
    uuid: String,
    /// New name.
    #[arg(long)]
    name: Option<String>,
    /// New summary.
    #[arg(long)]
    summary: Option<String>,
    /// New active flag.
    #[arg(long, value_name = "BOOL")]
    active: Option<bool>,
    /// Param value change as `NAME=VALUE`.
    #[arg(long, value_name = "NAME=VALUE", value_parser = parse_param_assignment)]
    param: Option<ParamUpdate>,
}

/// User subcommands.
#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Insert a user row.
    Add {
        /// User name.
        #[arg(long)]
        name: String,
        /// User uuid; generated when absent.
        #[arg(long)]
        uuid: Option<String>,
    },
}

/// Role subcommands.
#[derive(Subcommand, Debug)]
enum RoleCommand {
    /// Insert a role row.
    Add {
        /// Role name.
        #[arg(long)]
        name: String,
        /// Role uuid; generated when absent.
        #[arg(long)]
        uuid: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Validate,
    /// Print an example configuration.
    Example,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<RegistryError> for CliError {
    fn from(error: RegistryError) -> Self {
        Self::new(format!("{}: {error}", error.code()))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if let Commands::Config {
        command: ConfigCommand::Example,
    } = cli.command
    {
        write_stdout_line(config_toml_example().trim_end())?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = RegistryConfig::load(cli.config.as_deref()).map_err(|err| CliError::new(err.to_string()))?;
    init_logging(&config.logging.filter)?;
    let app = App::open(config)?;
    match cli.command {
        Commands::Config {
            command: ConfigCommand::Validate,
        } => {
            write_stdout_line("config ok")?;
        }
        Commands::Config {
            command: ConfigCommand::Example,
        } => {}
        Commands::User {
            command: UserCommand::Add {
                name,
                uuid,
            },
        } => app.add_user(&name, uuid)?,
        Commands::Role {
            command: RoleCommand::Add {
                name,
                uuid,
            },
        } => app.add_role(&name, uuid)?,
        Commands::SyncFeed {
            rebuild,
            watch,
        } => app.sync_feed(rebuild, watch)?,
        command => {
            let user = app.resolve_user(cli.user.as_deref())?;
            let ctx = RequestContext::new(&user, app.authorizer.as_ref());
            app.run_as_user(&ctx, command)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Installs the stderr `tracing` subscriber; `RUST_LOG` overrides `filter`.
fn init_logging(filter: &str) -> CliResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|err| CliError::new(format!("invalid log filter: {err}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| CliError::new(format!("logging init failed: {err}")))
}

// ============================================================================
// SECTION: Application
// ============================================================================

/// Registry wired from configuration.
struct App {
    /// Loaded configuration.
    config: RegistryConfig,
    /// Lifecycle engine.
    registry: ReportFormatRegistry,
    /// Configured authorization oracle.
    authorizer: Arc<dyn Authorizer>,
}

impl App {
    /// Opens the store and builds the registry.
    fn open(config: RegistryConfig) -> CliResult<Self> {
        let store = SqliteResourceStore::open(config.store_config())
            .map_err(|err| CliError::new(format!("failed to open resource store: {err}")))?;
        let layout = AssetLayout::new(&config.state_dir);
        let feed_signatures = config.feed.as_ref().map(report_registry_config::FeedSection::signatures_dir);
        let signatures = SignatureDirectory::new(feed_signatures, layout.signatures_dir());
        let verifier = ProcessSignatureVerifier::new(&config.signatures.verifier_program, config.keyring_path());
        let renderer = config
            .render
            .run_as()
            .map_or_else(ScriptRenderer::new, |(uid, gid)| ScriptRenderer::run_as(uid, gid));
        let registry =
            ReportFormatRegistry::new(Arc::new(store), layout, signatures, Arc::new(verifier), Arc::new(renderer));
        let authorizer = config.authorization.build();
        Ok(Self {
            config,
            registry,
            authorizer,
        })
    }

    /// Resolves the acting user by uuid, then by name.
    fn resolve_user(&self, user: Option<&str>) -> CliResult<UserRef> {
        let user = user.ok_or_else(|| CliError::new("this command requires --user".to_string()))?;
        let tx = self.registry.store().begin_read().map_err(store_error)?;
        let found = match tx.find_user(user).map_err(store_error)? {
            Some(found) => Some(found),
            None => tx.find_user_by_name(user).map_err(store_error)?,
        };
        found.ok_or_else(|| CliError::new(format!("unknown user: {user}")))
    }

    /// Inserts a user and prints its uuid.
    fn add_user(&self, name: &str, uuid: Option<String>) -> CliResult<()> {
        let uuid = checked_uuid(uuid)?;
        let tx = self.registry.store().begin().map_err(store_error)?;
        let user = tx.insert_user(uuid.as_str(), name).map_err(store_error)?;
        tx.commit().map_err(store_error)?;
        tracing::info!(uuid = %user.uuid, name, "user added");
        write_stdout_line(&user.uuid)
    }

    /// Inserts a role and prints its uuid.
    fn add_role(&self, name: &str, uuid: Option<String>) -> CliResult<()> {
        let uuid = checked_uuid(uuid)?;
        let tx = self.registry.store().begin().map_err(store_error)?;
        tx.insert_role(uuid.as_str(), name).map_err(store_error)?;
        tx.commit().map_err(store_error)?;
        tracing::info!(uuid = %uuid, name, "role added");
        write_stdout_line(uuid.as_str())
    }

    /// Runs one feed pass, or passes forever with `watch`.
    fn sync_feed(&self, rebuild: bool, watch: bool) -> CliResult<()> {
        let feed = self
            .config
            .feed
            .as_ref()
            .ok_or_else(|| CliError::new("no [feed] section configured".to_string()))?;
        let synchronizer = FeedSynchronizer::new(
            &self.registry,
            FeedConfig {
                dir: feed.dir.clone(),
                owner_uuid: feed.owner_uuid.clone(),
                import_roles: feed.import_roles.clone(),
            },
        );
        if !watch {
            let report = synchronizer.sync(rebuild)?;
            return write_stdout_line(&format_sync_report(&report));
        }
        let interval = Duration::from_secs(feed.sync_interval_secs);
        let mut first = true;
        loop {
            match synchronizer.sync(rebuild && first) {
                Ok(report) => write_stdout_line(&format_sync_report(&report))?,
                Err(err) => tracing::warn!(code = err.code(), error = %err, "feed sync pass failed"),
            }
            first = false;
            thread::sleep(interval);
        }
    }

    /// Runs a command that acts on behalf of a user.
    fn run_as_user(&self, ctx: &RequestContext<'_>, command: Commands) -> CliResult<()> {
        let registry = &self.registry;
        match command {
            Commands::Import {
                document,
                signature,
            } => {
                let mut request = read_report_format_document(&document).map_err(RegistryError::from)?;
                if let Some(path) = signature {
                    let bytes = read_bytes_with_limit(&path, MAX_SIGNATURE_BYTES)
                        .map_err(|err| read_error(&path, &err))?;
                    let text = String::from_utf8(bytes)
                        .map_err(|_| CliError::new(format!("{}: signature must be ascii armored", path.display())))?;
                    request.signature = Some(text);
                }
                let uuid = registry.create(ctx, &request)?;
                write_stdout_line(uuid.as_str())
            }
            Commands::Copy {
                uuid,
                name,
            } => {
                let copy = registry.copy(ctx, &uuid, name.as_deref())?;
                write_stdout_line(copy.as_str())
            }
            Commands::Modify(command) => {
                let request = ModifyRequest {
                    name: command.name,
                    summary: command.summary,
                    active: command.active,
                    param: command.param,
                };
                registry.modify(ctx, &command.uuid, &request)?;
                Ok(())
            }
            Commands::Delete {
                uuid,
                ultimate,
            } => Ok(registry.delete(ctx, &uuid, ultimate)?),
            Commands::Restore {
                uuid,
            } => Ok(registry.restore(ctx, &uuid)?),
            Commands::Verify {
                uuid,
            } => {
                let trust = registry.verify(ctx, &uuid)?;
                write_stdout_line(trust.as_str())
            }
            Commands::Apply {
                uuid,
                report,
                out_dir,
            } => {
                let xml = read_bytes_with_limit(&report, MAX_REPORT_BYTES).map_err(|err| read_error(&report, &err))?;
                match registry.apply(ctx, &uuid, &xml, &out_dir)? {
                    Some(output) => write_stdout_line(&output.display().to_string()),
                    None => write_stdout_line("report format has no generate script"),
                }
            }
            Commands::Get {
                uuid,
                trash,
            } => {
                if trash {
                    write_json(&registry.get_trashed(ctx, &uuid)?)
                } else {
                    write_json(&registry.get(ctx, &uuid)?)
                }
            }
            Commands::List {
                trash,
            } => {
                if trash {
                    write_json(&registry.list_trash(ctx)?)
                } else {
                    write_json(&registry.list(ctx)?)
                }
            }
            Commands::ValidateParam {
                uuid,
                name,
                value,
            } => {
                registry.validate_param(ctx, &uuid, &name, &value)?;
                write_stdout_line("valid")
            }
            Commands::EmptyTrash => {
                let removed = registry.empty_trash(ctx)?;
                write_stdout_line(&removed.to_string())
            }
            Commands::SyncFeed {
                ..
            }
            | Commands::User {
                ..
            }
            | Commands::Role {
                ..
            }
            | Commands::Config {
                ..
            } => Err(CliError::new("command does not act as a user".to_string())),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a `NAME=VALUE` param assignment.
fn parse_param_assignment(raw: &str) -> Result<ParamUpdate, String> {
    let (name, value) = raw.split_once('=').ok_or_else(|| "expected NAME=VALUE".to_string())?;
    if name.is_empty() {
        return Err("param name must be non-empty".to_string());
    }
    Ok(ParamUpdate {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Validates a supplied uuid or generates one.
fn checked_uuid(uuid: Option<String>) -> CliResult<ResourceUuid> {
    match uuid {
        Some(uuid) if ResourceUuid::is_well_formed(&uuid) => Ok(ResourceUuid::new(uuid)),
        Some(uuid) => Err(CliError::new(format!("not a uuid: {uuid}"))),
        None => Ok(ResourceUuid::generate()),
    }
}

/// Formats a feed pass summary line.
fn format_sync_report(report: &FeedSyncReport) -> String {
    format!(
        "created={} updated={} skipped={} failed={} removed_params={}",
        report.created, report.updated, report.skipped, report.failed, report.removed_params
    )
}

/// Maps a store failure to a CLI error.
fn store_error(err: report_registry_store_sqlite::SqliteStoreError) -> CliError {
    CliError::new(format!("resource store failure: {err}"))
}

/// Formats a bounded read failure.
fn read_error(path: &Path, err: &ReadLimitError) -> CliError {
    match err {
        ReadLimitError::Io(err) => CliError::new(format!("{}: {err}", path.display())),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!("{}: {size} bytes exceeds limit of {limit}", path.display())),
    }
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|err| CliError::new(format!("json output: {err}")))?;
    write_stdout_line(&text)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(format!("stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Reports a fatal error and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
