use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use bgp_policy::{PolicyCompiler, RouterConfig, StaticLookup};
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use tracing::info;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Rayhaan Jaufeerally <rayhaan@rayhaan.ch>",
    version = "0.1",
    about = "Compiles BGP peering policy into BIRD configuration"
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile writes the generated configuration.
    Compile {
        /// Path to the JSON router configuration.
        config: PathBuf,
        /// JSON file with resolved PeeringDB and IRR data.
        #[arg(long)]
        lookup: Option<PathBuf>,
        /// Output file, stdout when not set.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check validates the configuration without writing anything.
    Check {
        /// Path to the JSON router configuration.
        config: PathBuf,
        /// JSON file with resolved PeeringDB and IRR data.
        #[arg(long)]
        lookup: Option<PathBuf>,
    },
}

fn load(config: &Path, lookup: Option<&Path>) -> Result<PolicyCompiler> {
    let reader = BufReader::new(
        File::open(config).wrap_err_with(|| format!("Failed to open {}", config.display()))?,
    );
    let router_config = RouterConfig::from_reader(reader)
        .wrap_err_with(|| format!("Failed to parse {}", config.display()))?;

    let lookup = match lookup {
        Some(path) => {
            let reader = BufReader::new(
                File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?,
            );
            StaticLookup::from_reader(reader)
                .wrap_err_with(|| format!("Failed to parse {}", path.display()))?
        }
        None => StaticLookup::default(),
    };

    Ok(PolicyCompiler::new(router_config, &lookup)?)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match args.command {
        Commands::Compile {
            config,
            lookup,
            output,
        } => {
            let compiler = load(&config, lookup.as_deref())?;
            let text = compiler.compile()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote {}", path.display());
                }
                None => std::io::stdout().write_all(text.as_bytes())?,
            }
        }
        Commands::Check { config, lookup } => {
            let compiler = load(&config, lookup.as_deref())?;
            // Rendering exercises every peer, not only the validation.
            compiler.compile()?;
            info!(
                "{} is valid ({} peers)",
                config.display(),
                compiler.peers().len()
            );
        }
    }

    Ok(())
}
