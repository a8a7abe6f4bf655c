//! luxera CLI - thin driver around the core library
//!
//! The core is library-first; this binary only wires a few workflows
//! (demo project, run, import, agent intent) to the library and maps
//! errors to exit codes: 0 success, 2 user error, 3 internal error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use luxera::agent::{AgentRuntime, Approvals};
use luxera::import::{run_import_pipeline, ImportOptions};
use luxera::project::presets::rectangular_office;
use luxera::project::{load_project, save_project};
use luxera::runner::run_job;
use luxera::LuxeraError;

/// Deterministic lighting-design engine.
#[derive(Parser, Debug)]
#[command(name = "luxera")]
#[command(version = luxera::VERSION)]
#[command(about = "Luxera: deterministic lighting-design core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a demo project file
    Demo {
        /// Output project path
        path: PathBuf,
    },
    /// Run a job and print the result directory
    Run {
        /// Project file
        project: PathBuf,
        /// Job id
        job_id: String,
    },
    /// Run the import pipeline over a neutral geometry file
    Import {
        /// Neutral-document JSON file
        source: PathBuf,
        /// Continue past extreme geometry defects
        #[arg(long)]
        force_extreme: bool,
    },
    /// Execute an agent intent against a project
    Agent {
        /// Project file
        project: PathBuf,
        /// Intent text
        intent: String,
        /// Approve diff application
        #[arg(long)]
        approve_apply: bool,
        /// Approve job runs
        #[arg(long)]
        approve_run: bool,
    },
}

fn run(cli: Cli) -> Result<(), LuxeraError> {
    match cli.command {
        Command::Demo { path } => {
            let project = rectangular_office("demo");
            save_project(&project, &path)?;
            println!("{}", path.display());
        }
        Command::Run { project, job_id } => {
            let mut project = load_project(&project)?;
            let reference = run_job(&mut project, &job_id)?;
            if let Some(root) = &project.root_dir {
                let path = root.join("project.json");
                if path.exists() {
                    save_project(&project, &path)?;
                }
            }
            println!("{}", reference.result_dir);
        }
        Command::Import {
            source,
            force_extreme,
        } => {
            let options = ImportOptions {
                force_extreme,
                ..Default::default()
            };
            let result = run_import_pipeline(&source, &options)?;
            println!("{}", serde_json::to_string_pretty(&result.report)?);
            if result.geometry.is_none() {
                return Err(LuxeraError::PolicyBlocked {
                    message: "import blocked".to_string(),
                });
            }
        }
        Command::Agent {
            project,
            intent,
            approve_apply,
            approve_run,
        } => {
            let runtime = AgentRuntime::new();
            let approvals = Approvals {
                apply_diff: approve_apply,
                run_job: approve_run,
                selected_diff_ops: None,
            };
            let response = runtime.execute(&project, &intent, &approvals)?;
            for warning in &response.warnings {
                eprintln!("warning: {}", warning);
            }
            for artifact in &response.produced_artifacts {
                println!("{}", artifact);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            match err {
                LuxeraError::Validation { .. }
                | LuxeraError::ProjectNotFound { .. }
                | LuxeraError::PolicyBlocked { .. }
                | LuxeraError::Import { .. }
                | LuxeraError::ApprovalRequired { .. } => ExitCode::from(2),
                _ => ExitCode::from(3),
            }
        }
    }
}
