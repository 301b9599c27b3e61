mod config;
mod display;

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use tanuki_core::context::OperationContext;
use tanuki_core::differ::create_plan;
use tanuki_core::effect::Effect;
use tanuki_core::interpreter::{ApplyResult, EffectOutcome, Interpreter};
use tanuki_core::plan::Plan;
use tanuki_core::provider::Provider;
use tanuki_core::resource::{ResourceId, State};
use tanuki_provider_gitlab::GitLabProvider;
use tanuki_state::{LockInfo, LockOperation, StateBackend, StateFile, create_backend};

use config::ConfigFile;

const PROVIDER: &str = "gitlab";

#[derive(Parser)]
#[command(name = "tanuki")]
#[command(about = "Manage GitLab objects declaratively", long_about = None)]
struct Cli {
    /// Log every API call
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file against the provider schemas
    Validate {
        #[arg(default_value = "tanuki.json")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        #[arg(default_value = "tanuki.json")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        #[arg(default_value = "tanuki.json")]
        file: PathBuf,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy every managed object declared in the configuration file
    Destroy {
        #[arg(default_value = "tanuki.json")]
        file: PathBuf,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Bring an existing GitLab object under management
    Import {
        /// Address in the form `type.name`
        address: String,
        /// Composite remote ID, e.g. `42:FOO:*`
        id: String,

        #[arg(long, short, default_value = "tanuki.json")]
        file: PathBuf,
    },
    /// Inspect the state file
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Describe resource and data source schemas
    Schema {
        /// Resource or data source type; lists all types when omitted
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List managed objects and their remote IDs
    List {
        #[arg(default_value = "tanuki.json")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = OperationContext::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted, cancelling in-flight operations");
            interrupt.cancel();
        }
    });

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&ctx, &file).await,
        Commands::Apply { file, auto_approve } => run_apply(&ctx, &file, auto_approve).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&ctx, &file, auto_approve).await,
        Commands::Import { address, id, file } => run_import(&ctx, &file, &address, &id).await,
        Commands::State { command } => match command {
            StateCommands::List { file } => run_state_list(&file).await,
        },
        Commands::Schema { name } => run_schema(name.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn load_validated(file: &Path) -> Result<ConfigFile, String> {
    let config = ConfigFile::load(file)?;
    config.validate(&tanuki_provider_gitlab::registry())?;
    Ok(config)
}

async fn connect(ctx: &OperationContext, config: &ConfigFile) -> Result<GitLabProvider, String> {
    GitLabProvider::connect(ctx, config.provider.clone())
        .await
        .map_err(|e| format!("Failed to configure provider: {}", e))
}

/// Re-read every object in `state`, dropping the ones that disappeared
async fn refresh(
    ctx: &OperationContext,
    provider: &GitLabProvider,
    state: &mut StateFile,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut current = HashMap::new();
    for (id, stored) in state.states() {
        let fresh = provider
            .read(ctx, &stored)
            .await
            .map_err(|e| format!("Failed to refresh {}: {}", id, e))?;
        if !fresh.exists {
            log::warn!("{} no longer exists in GitLab", id);
        }
        state.record(PROVIDER, &fresh);
        if fresh.exists {
            current.insert(id, fresh);
        }
    }
    Ok(current)
}

async fn persist(backend: &dyn StateBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend.write_state(state).await.map_err(|e| e.to_string())
}

async fn release(backend: &dyn StateBackend, lock: &LockInfo) {
    if let Err(e) = backend.release_lock(lock).await {
        log::error!("failed to release state lock {}: {}", lock.id, e);
    }
}

fn confirm(action: &str) -> Result<bool, String> {
    print!("Do you want to {}? Only 'yes' will be accepted: ", action);
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| e.to_string())?;
    Ok(answer.trim() == "yes")
}

/// Fold the outcome of each effect into the state file
fn record_outcomes(state: &mut StateFile, result: &ApplyResult) {
    for outcome in result.outcomes.iter().flatten() {
        match outcome {
            EffectOutcome::Created { state: s }
            | EffectOutcome::Updated { state: s }
            | EffectOutcome::Replaced { state: s } => state.record(PROVIDER, s),
            EffectOutcome::Deleted { id } => {
                state.remove_resource(&id.resource_type, &id.name);
            }
            EffectOutcome::Read { .. } | EffectOutcome::Skipped { .. } => {}
        }
    }
}

fn run_validate(file: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());
    let config = load_validated(file)?;
    let desired = config.desired();

    println!(
        "{}",
        format!("✓ {} declarations validated successfully.", desired.len())
            .green()
            .bold()
    );
    for resource in &desired {
        println!("  • {}", resource.id);
    }
    Ok(())
}

async fn run_plan(ctx: &OperationContext, file: &Path) -> Result<(), String> {
    let config = load_validated(file)?;
    let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;
    let mut state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();

    let provider = connect(ctx, &config).await?;
    let current = refresh(ctx, &provider, &mut state).await?;
    let plan = create_plan(&config.desired(), &current, &provider);
    display::print_plan(&plan, &provider);
    Ok(())
}

async fn run_apply(ctx: &OperationContext, file: &Path, auto_approve: bool) -> Result<(), String> {
    let config = load_validated(file)?;
    let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;
    let lock = backend.acquire_lock(LockOperation::Apply).await.map_err(|e| e.to_string())?;

    let result = apply_locked(ctx, &config, backend.as_ref(), auto_approve).await;
    release(backend.as_ref(), &lock).await;
    result
}

async fn apply_locked(
    ctx: &OperationContext,
    config: &ConfigFile,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();

    let provider = connect(ctx, config).await?;
    let current = refresh(ctx, &provider, &mut state).await?;
    let plan = create_plan(&config.desired(), &current, &provider);
    display::print_plan(&plan, &provider);

    if plan.mutation_count() == 0 {
        return persist(backend, &mut state).await;
    }
    execute(ctx, provider, plan, backend, &mut state, auto_approve, "apply these changes").await
}

/// Run `plan` after confirmation, saving state even when an effect fails
async fn execute(
    ctx: &OperationContext,
    provider: GitLabProvider,
    plan: Plan,
    backend: &dyn StateBackend,
    state: &mut StateFile,
    auto_approve: bool,
    action: &str,
) -> Result<(), String> {
    if !auto_approve && !confirm(action)? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    println!();
    let interpreter = Interpreter::new(provider);
    let result = interpreter.apply(ctx, &plan).await;
    record_outcomes(state, &result);
    persist(backend, state).await?;

    display::print_apply_result(&result);
    if result.is_success() {
        Ok(())
    } else {
        Err(format!("{} operation(s) failed", result.failure_count))
    }
}

async fn run_destroy(ctx: &OperationContext, file: &Path, auto_approve: bool) -> Result<(), String> {
    let config = load_validated(file)?;
    let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;
    let lock = backend.acquire_lock(LockOperation::Destroy).await.map_err(|e| e.to_string())?;

    let result = destroy_locked(ctx, &config, backend.as_ref(), auto_approve).await;
    release(backend.as_ref(), &lock).await;
    result
}

async fn destroy_locked(
    ctx: &OperationContext,
    config: &ConfigFile,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();

    let provider = connect(ctx, config).await?;
    let current = refresh(ctx, &provider, &mut state).await?;

    // Reverse declaration order
    let mut plan = Plan::new();
    for resource in config.desired().iter().rev() {
        if let Some(existing) = current.get(&resource.id)
            && !resource.is_data_source()
        {
            plan.add(Effect::Delete(existing.clone()));
        }
    }

    display::print_plan(&plan, &provider);
    if plan.is_empty() {
        return persist(backend, &mut state).await;
    }
    execute(ctx, provider, plan, backend, &mut state, auto_approve, "destroy these objects").await
}

async fn run_import(
    ctx: &OperationContext,
    file: &Path,
    address: &str,
    remote_id: &str,
) -> Result<(), String> {
    let (resource_type, name) = address
        .split_once('.')
        .ok_or_else(|| format!("Invalid address {:?}, expected type.name", address))?;
    let id = ResourceId::new(resource_type, name);

    let config = ConfigFile::load(file)?;
    let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;
    let lock = backend.acquire_lock(LockOperation::Import).await.map_err(|e| e.to_string())?;

    let result = import_locked(ctx, &config, backend.as_ref(), &id, remote_id).await;
    release(backend.as_ref(), &lock).await;
    result
}

async fn import_locked(
    ctx: &OperationContext,
    config: &ConfigFile,
    backend: &dyn StateBackend,
    id: &ResourceId,
    remote_id: &str,
) -> Result<(), String> {
    let mut state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    if let Some(existing) = state.find_resource(&id.resource_type, &id.name) {
        return Err(format!("{} is already managed as {}", id, existing.id));
    }

    let provider = connect(ctx, config).await?;
    let imported = provider
        .import(ctx, id, remote_id)
        .await
        .map_err(|e| e.to_string())?;
    state.record(PROVIDER, &imported);
    persist(backend, &mut state).await?;

    println!("{} {} ({})", "✓ imported".green(), id, remote_id);
    Ok(())
}

async fn run_state_list(file: &Path) -> Result<(), String> {
    let config = ConfigFile::load(file)?;
    let backend = create_backend(&config.backend).map_err(|e| e.to_string())?;
    let Some(state) = backend.read_state().await.map_err(|e| e.to_string())? else {
        println!("{}", "No state.".yellow());
        return Ok(());
    };

    let mut resources: Vec<_> = state.resources.iter().collect();
    resources.sort_by(|a, b| (&a.resource_type, &a.name).cmp(&(&b.resource_type, &b.name)));
    for resource in resources {
        println!(
            "{}.{}  {}",
            resource.resource_type.cyan(),
            resource.name,
            resource.id.dimmed()
        );
    }
    Ok(())
}

fn run_schema(name: Option<&str>) -> Result<(), String> {
    let registry = tanuki_provider_gitlab::registry();

    let Some(name) = name else {
        println!("{}", "Resources:".bold());
        for name in registry.resources().keys() {
            println!("  {}", name);
        }
        println!("{}", "Data sources:".bold());
        for name in registry.data_sources().keys() {
            println!("  {}", name);
        }
        return Ok(());
    };

    let mut found = false;
    if let Some(factory) = registry.resources().get(name) {
        println!("{}", "resource".dimmed());
        display::print_schema(&factory().schema());
        found = true;
    }
    if let Some(factory) = registry.data_sources().get(name) {
        println!("{}", "data source".dimmed());
        display::print_schema(&factory().schema());
        found = true;
    }

    if found {
        Ok(())
    } else {
        Err(format!("Unknown resource or data source type {}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tanuki_core::provider::ProviderError;

    #[test]
    fn outcomes_update_state_file() {
        let kept = ResourceId::new("gitlab_branch", "dev");
        let dropped = ResourceId::new("gitlab_project_variable", "foo");

        let mut file = StateFile::new();
        file.record(
            PROVIDER,
            &State::existing(dropped.clone(), HashMap::new()).with_identifier("42:FOO:*"),
        );

        let result = ApplyResult {
            outcomes: vec![
                Ok(EffectOutcome::Created {
                    state: State::existing(kept.clone(), HashMap::new()).with_identifier("42:dev"),
                }),
                Ok(EffectOutcome::Deleted {
                    id: dropped.clone(),
                }),
                Err(ProviderError::new("boom")),
            ],
            success_count: 2,
            failure_count: 1,
        };
        record_outcomes(&mut file, &result);

        assert!(file.find_resource("gitlab_branch", "dev").is_some());
        assert!(file.find_resource("gitlab_project_variable", "foo").is_none());
    }

    #[test]
    fn cli_parses_import() {
        let cli = Cli::parse_from(["tanuki", "-v", "import", "gitlab_project_variable.foo", "42:FOO:*"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Import { address, id, file } => {
                assert_eq!(address, "gitlab_project_variable.foo");
                assert_eq!(id, "42:FOO:*");
                assert_eq!(file, PathBuf::from("tanuki.json"));
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn unknown_schema_is_an_error() {
        assert!(run_schema(Some("gitlab_project_variable")).is_ok());
        assert!(run_schema(Some("gitlab_nope")).is_err());
    }
}
