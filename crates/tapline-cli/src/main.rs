mod config;
mod list_cmd;
mod run_cmd;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use tapline_core::lifecycle::XcodeToolchain;
use tapline_core::scenario::ScenarioRegistry;

use config::{CliOverrides, TaplineConfig};

#[derive(Parser)]
#[command(name = "tapline", about = "Drive UIAutomation scenarios against the iOS simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a tapline config file
    Init {
        /// Path to the Xcode project (skips the Spotlight search)
        #[arg(long)]
        project_path: Option<PathBuf>,
        /// Directory for result logs
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// List the available scenarios
    List,
    /// Run scenarios (all of them when none are named)
    Run {
        /// Scenario names, as shown by `tapline list`
        scenarios: Vec<String>,
        /// Path to the Xcode project (overrides TAPLINE_XCODE_PROJECT_PATH)
        #[arg(long)]
        project_path: Option<PathBuf>,
        /// Directory for result logs (overrides TAPLINE_LOG_DIR)
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Leave each session's workspace on disk
        #[arg(long)]
        keep_workspace: bool,
        /// Keep verbose entries in the result logs
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print a shell completion script
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Execute the `tapline init` command: write config file.
fn cmd_init(project_path: Option<PathBuf>, log_dir: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let log_dir = log_dir.unwrap_or_else(config::default_log_dir);
    let cfg = config::ConfigFile {
        xcode: config::XcodeSection {
            project_path: project_path.clone(),
            ..config::XcodeSection::default()
        },
        logging: config::LoggingSection {
            log_dir: Some(log_dir.clone()),
            ..config::LoggingSection::default()
        },
        ..config::ConfigFile::default()
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    match &project_path {
        Some(p) => println!("  xcode.project_path = {}", p.display()),
        None => println!("  xcode.project_path = (search for {})", tapline_core::SessionConfig::DEFAULT_PROJECT_FILE_NAME),
    }
    println!("  logging.log_dir = {}", log_dir.display());
    println!();
    println!("Next: run `tapline list` to see the available scenarios.");

    Ok(())
}

/// Execute the `tapline run` command. Returns whether every scenario passed.
async fn cmd_run(names: &[String], overrides: &CliOverrides) -> anyhow::Result<bool> {
    let resolved = TaplineConfig::resolve(overrides)?;
    let registry = ScenarioRegistry::builtin();
    let scenarios = run_cmd::select(&registry, names)?;

    // First signal stops after the current scenario, second force-exits.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let got_first_clone = Arc::clone(&got_first_signal);

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_clone.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nFinishing the current scenario (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    println!("Running {} scenario(s); logs under {}", scenarios.len(), resolved.log_dir.display());

    let toolchain = Arc::new(XcodeToolchain::new());
    let outcomes = run_cmd::run_scenarios(&scenarios, &resolved, toolchain, &cancel).await?;

    println!();
    print!("{}", run_cmd::render_summary(&outcomes));

    if cancel.is_cancelled() {
        println!("Run interrupted by signal.");
        std::process::exit(130);
    }
    Ok(outcomes.len() == scenarios.len() && outcomes.iter().all(|o| o.success))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            project_path,
            log_dir,
            force,
        } => {
            cmd_init(project_path, log_dir, force)?;
        }
        Commands::List => {
            list_cmd::run_list(&ScenarioRegistry::builtin());
        }
        Commands::Run {
            scenarios,
            project_path,
            log_dir,
            keep_workspace,
            verbose,
        } => {
            let overrides = CliOverrides {
                project_path,
                log_dir,
                keep_workspace,
                verbose,
            };
            if !cmd_run(&scenarios, &overrides).await? {
                std::process::exit(1);
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "tapline", &mut std::io::stdout());
        }
    }

    Ok(())
}
