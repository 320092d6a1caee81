//! Vyper compiler plugin - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use vyper_plugin::util::{config, logger};
use vyper_plugin::{contract_sources, Project, Version, VyperCompiler, NAME, VERSION};

/// Compile, flatten and manage Vyper contracts
#[derive(Parser, Debug)]
#[command(name = "vyper-plugin")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Flatten a contract and its imports into a single file
    Flatten {
        /// Contract to flatten
        #[arg(value_name = "CONTRACT")]
        contract: PathBuf,

        /// File to write the flattened source to
        #[arg(value_name = "OUTFILE")]
        outfile: PathBuf,

        /// Project directory
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },

    /// Compile contracts (default: every contract of the project)
    Compile {
        /// Files to compile
        #[arg(value_name = "PATHS")]
        paths: Vec<PathBuf>,

        /// Project directory
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Print the contract types as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print compiler settings per version
    Settings {
        /// Files to inspect
        #[arg(value_name = "PATHS")]
        paths: Vec<PathBuf>,

        /// Project directory
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },

    /// Manage Vyper compiler versions
    Versions {
        #[command(subcommand)]
        command: VersionsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum VersionsCommand {
    /// List installed versions
    List {
        /// List installable versions instead
        #[arg(long)]
        available: bool,
    },

    /// Install a version
    Install {
        #[arg(value_name = "VERSION")]
        version: String,
    },
}

fn load_project(dir: &Path) -> Result<Project> {
    Project::load(dir).with_context(|| format!("Failed to load project: {}", dir.display()))
}

/// Given paths, made absolute against the working directory, or every
/// contract of the project.
fn resolve_paths(
    paths: &[PathBuf],
    project: &Project,
) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        return Ok(contract_sources(project));
    }
    paths
        .iter()
        .map(|p| std::path::absolute(p).with_context(|| format!("Invalid path: {}", p.display())))
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let user_config = config::load_user_config().unwrap_or_default();

    let level = if args.verbose {
        logger::LogLevel::Debug
    } else {
        user_config.log.level
    };
    logger::init_with_level(level);

    let compiler = VyperCompiler::with_vvm(&user_config);

    match args.command {
        Commands::Flatten {
            contract,
            outfile,
            project,
        } => {
            let project = load_project(&project)?;
            let contract = std::path::absolute(&contract)?;
            let flattened = compiler
                .flatten_contract(&contract, &project)
                .with_context(|| format!("Failed to flatten: {}", contract.display()))?;
            std::fs::write(&outfile, flattened)
                .with_context(|| format!("Failed to write: {}", outfile.display()))?;
        }
        Commands::Compile {
            paths,
            project,
            json,
        } => {
            let project = load_project(&project)?;
            let paths = resolve_paths(&paths, &project)?;
            let contract_types = compiler
                .compile(&paths, &project)
                .context("Compilation failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&contract_types)?);
            } else {
                for contract_type in &contract_types {
                    println!(
                        "{} ({})",
                        contract_type.contract_name.green(),
                        contract_type.source_id
                    );
                }
            }
        }
        Commands::Settings { paths, project } => {
            let project = load_project(&project)?;
            let paths = resolve_paths(&paths, &project)?;
            let settings = compiler.get_compiler_settings(&paths, &project)?;
            let output: Map<String, Value> = settings
                .into_iter()
                .map(|(version, by_key)| {
                    let by_key: Map<String, Value> = by_key.into_iter().collect();
                    (version.to_string(), Value::Object(by_key))
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Versions { command } => match command {
            VersionsCommand::List { available } => {
                let toolchain = compiler.toolchain();
                if available {
                    let versions = toolchain
                        .available_versions()
                        .context("Failed to list available versions")?;
                    for version in versions {
                        println!("{}", version);
                    }
                } else {
                    let package = toolchain.package_version();
                    for version in toolchain.installed_versions() {
                        if Some(&version) == package.as_ref() {
                            println!("{} {}", version.bold(), "(package)".cyan());
                        } else {
                            println!("{}", version);
                        }
                    }
                }
            }
            VersionsCommand::Install { version } => {
                let version = Version::parse(&version)?;
                compiler
                    .toolchain()
                    .install(&version)
                    .with_context(|| format!("Failed to install {}", version))?;
                println!("Installed {}", version.green());
            }
        },
    }

    Ok(())
}
