//! Command dispatch
//!
//! Thin glue: load settings, build the container, call one service, print.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::CommandFactory;
use clap_complete::generate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::services::ExperienceSystem;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, MigrationSettings, Settings};
use crate::domain::{MigrationSummary, OldRealmConfig, UserRecord, ValidationReport};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::stores::{InMemoryUserStore, JsonFileUserStore};
use crate::infrastructure::traits::UserStore;
use crate::infrastructure::InfraError;

/// Migration input document.
///
/// Missing old-scale fields fall back to the `[migration]` settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationInput {
    #[serde(default)]
    pub old_total_experience: Option<i64>,
    #[serde(default)]
    pub old_realm_thresholds: Option<Vec<i64>>,
    pub users: Vec<UserRecord>,
}

impl MigrationInput {
    pub fn old_realm_config(&self, defaults: &MigrationSettings) -> OldRealmConfig {
        let mut settings = defaults.clone();
        if let Some(max) = self.old_total_experience {
            settings.old_max_experience = max;
            // thresholds from settings belong to the settings' scale
            if self.old_realm_thresholds.is_none() && max != defaults.old_max_experience {
                settings.old_realm_thresholds = None;
            }
        }
        if let Some(thresholds) = &self.old_realm_thresholds {
            settings.old_realm_thresholds = Some(thresholds.clone());
        }
        settings.old_realm_config()
    }
}

#[derive(Serialize)]
struct MigrationReport<'a> {
    summary: &'a MigrationSummary,
    validation: &'a ValidationReport,
}

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        Cli::command()
            .print_help()
            .map_err(|e| InfraError::io("print help", e))?;
        return Ok(());
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => cmd_config(command),
        command => {
            let container = build_container()?;
            match command {
                Commands::Validate { nodes } => cmd_validate(&container, cli, nodes.as_deref()),
                Commands::Allocate { nodes, json } => {
                    cmd_allocate(&container, cli, nodes.as_deref(), *json)
                }
                Commands::Explain { nodes, node_id } => {
                    cmd_explain(&container, cli, nodes.as_deref(), node_id)
                }
                Commands::Summary { nodes } => cmd_summary(&container, cli, nodes.as_deref()),
                Commands::Progress { experience } => cmd_progress(&container, cli, *experience),
                Commands::Migrate {
                    input,
                    output,
                    report,
                    nodes,
                    dry_run,
                } => cmd_migrate(
                    &container,
                    cli,
                    MigrateArgs {
                        input,
                        output: output.as_deref(),
                        report: report.as_deref(),
                        nodes: nodes.as_deref(),
                        dry_run: *dry_run,
                    },
                ),
                Commands::Rollback {
                    migration_id,
                    output,
                } => cmd_rollback(&container, cli, migration_id, output),
                Commands::Backups => cmd_backups(&container),
                Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
            }
        }
    }
}

fn current_dir() -> CliResult<PathBuf> {
    Ok(std::env::current_dir().map_err(|e| InfraError::io("get current directory", e))?)
}

fn build_container() -> CliResult<ServiceContainer> {
    let settings = Settings::load(Some(&current_dir()?))?;
    debug!("build_container: settings={:?}", settings);
    Ok(ServiceContainer::new(settings))
}

fn load_system(
    container: &ServiceContainer,
    cli: &Cli,
    nodes: Option<&Path>,
) -> CliResult<ExperienceSystem> {
    Ok(container.experience_system(cli.config.as_deref(), nodes)?)
}

fn require_nodes(system: &ExperienceSystem) -> CliResult<()> {
    if system.registry().is_empty() {
        return Err(CliError::Usage(
            "no nodes loaded: pass --nodes or set nodes_file in settings".to_string(),
        ));
    }
    Ok(())
}

fn print_report(report: &ValidationReport) {
    for issue in report.errors.iter().chain(&report.warnings) {
        output::issue(issue);
    }
}

#[instrument(skip(container, cli))]
fn cmd_validate(container: &ServiceContainer, cli: &Cli, nodes: Option<&Path>) -> CliResult<()> {
    let system = load_system(container, cli, nodes)?;
    require_nodes(&system)?;

    // config errors already refused the load; only its warnings remain
    for issue in &system.validate_config().warnings {
        output::issue(issue);
    }
    let report = system.validate()?;
    output::header(&format!(
        "Validated {} nodes against {} total experience",
        system.registry().count(),
        system.config().total_experience
    ));
    print_report(&report);

    if report.valid {
        output::success("Allocation is valid");
        Ok(())
    } else {
        Err(CliError::Invalid(format!(
            "{} errors, {} warnings",
            report.errors.len(),
            report.warnings.len()
        )))
    }
}

#[instrument(skip(container, cli))]
fn cmd_allocate(
    container: &ServiceContainer,
    cli: &Cli,
    nodes: Option<&Path>,
    json: bool,
) -> CliResult<()> {
    let system = load_system(container, cli, nodes)?;
    require_nodes(&system)?;
    let allocation = system.allocations()?;

    if json {
        let rendered = serde_json::to_string_pretty(&allocation)
            .map_err(|e| InfraError::parse("render allocation", e))?;
        output::info(&rendered);
        return Ok(());
    }

    let width = allocation.iter().map(|(id, _)| id.len()).max().unwrap_or(0);
    for (node_id, experience) in allocation.iter() {
        output::info(&format!("{node_id:<width$}  {experience:>10}"));
    }
    output::action("Total", &allocation.total());
    Ok(())
}

fn cmd_explain(
    container: &ServiceContainer,
    cli: &Cli,
    nodes: Option<&Path>,
    node_id: &str,
) -> CliResult<()> {
    let system = load_system(container, cli, nodes)?;
    let explanation = system.explain(node_id);

    output::header(&explanation.node_id);
    for step in &explanation.steps {
        output::detail(step);
    }
    if let Some(allocated) = system.node_experience(node_id)? {
        output::action("Allocated", &allocated);
    }
    Ok(())
}

fn cmd_summary(container: &ServiceContainer, cli: &Cli, nodes: Option<&Path>) -> CliResult<()> {
    let system = load_system(container, cli, nodes)?;
    let summary = system.summary()?;

    output::header("Summary");
    output::detail(&format!(
        "nodes: {} ({} problems, {} treasures)",
        summary.node_count, summary.problem_count, summary.treasure_count
    ));
    output::detail(&format!(
        "allocated: {} of {}",
        summary.allocated_total, summary.total_experience
    ));
    output::detail(&format!(
        "per node: avg {:.1}, min {}, max {}",
        summary.average_experience, summary.min_experience, summary.max_experience
    ));
    if summary.valid {
        output::success_detail("valid");
    } else {
        output::failure("invalid (run `pathxp validate` for details)");
    }
    Ok(())
}

fn cmd_progress(container: &ServiceContainer, cli: &Cli, experience: i64) -> CliResult<()> {
    let system = load_system(container, cli, None)?;
    let p = system.progress(experience);

    output::header(&format!("{} experience", p.experience));
    output::detail(&format!(
        "realm {:>3} {} {:5.1}%, {} to next",
        p.realm,
        output::bar(p.realm_progress),
        p.realm_progress * 100.0,
        p.experience_to_next_realm
    ));
    output::detail(&format!(
        "level {:>3} {} {:5.1}%, {} to next",
        p.level,
        output::bar(p.level_progress),
        p.level_progress * 100.0,
        p.experience_to_next_level
    ));
    Ok(())
}

struct MigrateArgs<'a> {
    input: &'a Path,
    output: Option<&'a Path>,
    report: Option<&'a Path>,
    nodes: Option<&'a Path>,
    dry_run: bool,
}

#[instrument(skip_all)]
fn cmd_migrate(container: &ServiceContainer, cli: &Cli, args: MigrateArgs<'_>) -> CliResult<()> {
    let system = load_system(container, cli, args.nodes)?;

    let content = container
        .fs
        .read_to_string(args.input)
        .map_err(|e| InfraError::io(format!("read {}", args.input.display()), e))?;
    let input: MigrationInput = serde_json::from_str(&content)
        .map_err(|e| InfraError::parse(args.input.display().to_string(), e))?;
    let old = input.old_realm_config(&container.settings.migration);
    let valid_ids = (!system.registry().is_empty()).then(|| system.node_ids());

    let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
    let mut service = container.migration_service(&system, users, args.dry_run);
    let summary = service.migrate_all(&input.users, &old, valid_ids.as_ref())?;
    let validation = service.validate_migration(&summary.migration_id);

    output::header(&format!("Migration {}", summary.migration_id));
    output::detail(&format!(
        "{} users: {} migrated, {} adjusted to keep their realm, {} failed",
        summary.total_users,
        summary.successful,
        summary.adjusted_for_realm_preservation,
        summary.failed
    ));
    for error in &summary.errors {
        output::failure(&format!("{}: {}", error.user_id, error.error));
    }
    print_report(&validation);

    if let Some(path) = args.report {
        let report = MigrationReport {
            summary: &summary,
            validation: &validation,
        };
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| InfraError::parse("render migration report", e))?;
        container
            .fs
            .write(path, &rendered)
            .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
        output::action("Report", &path.display());
    }

    if args.dry_run {
        output::info("Dry run: no backup kept, no users written");
        return Ok(());
    }

    if let Some(path) = args.output {
        let store = JsonFileUserStore::new(container.fs.clone(), path);
        store
            .save_all(&summary.migrated_users(&input.users))
            .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
        output::action("Users", &path.display());
    }
    output::action(
        "Backup",
        &format!(
            "{} (pathxp rollback {} --output <users.json>)",
            container.settings.backup_dir.display(),
            summary.migration_id
        ),
    );

    if validation.valid {
        Ok(())
    } else {
        Err(CliError::Invalid(format!(
            "migration {} failed validation",
            summary.migration_id
        )))
    }
}

#[instrument(skip(container, cli))]
fn cmd_rollback(
    container: &ServiceContainer,
    cli: &Cli,
    migration_id: &str,
    output_path: &Path,
) -> CliResult<()> {
    let system = load_system(container, cli, None)?;
    let users: Arc<dyn UserStore> =
        Arc::new(JsonFileUserStore::new(container.fs.clone(), output_path));
    let mut service = container.migration_service(&system, users, false);

    let result = service.rollback(migration_id)?;

    output::action("Restored", &format!("{} users into {}", result.restored, output_path.display()));
    for error in &result.errors {
        output::failure(&format!("{}: {}", error.user_id, error.error));
    }
    if result.is_complete() {
        output::success(&format!("Backup {migration_id} discarded"));
        Ok(())
    } else {
        Err(CliError::Incomplete(format!(
            "{} users not restored, backup kept",
            result.errors.len()
        )))
    }
}

fn cmd_backups(container: &ServiceContainer) -> CliResult<()> {
    let ids = container
        .backups
        .list()
        .map_err(|e| InfraError::io("list backups", e))?;
    if ids.is_empty() {
        output::info("No backups");
    }
    for id in ids {
        output::info(&id);
    }
    Ok(())
}

fn cmd_config(command: &ConfigCommands) -> CliResult<()> {
    let cwd = current_dir()?;
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(&cwd))?;
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".to_string())
                })?
            } else {
                local_config_path(&cwd)
            };
            if path.exists() {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action("Created", &path.display());
            Ok(())
        }
        ConfigCommands::Path => {
            let marker = |p: &Path| if p.exists() { "" } else { " (not found)" };
            match global_config_path() {
                Some(p) => output::info(&format!("global: {}{}", p.display(), marker(&p))),
                None => output::info("global: <unavailable>"),
            }
            let local = local_config_path(&cwd);
            output::info(&format!("local:  {}{}", local.display(), marker(&local)));
            Ok(())
        }
    }
}
