//! # trellis-cli
//!
//! Command-line driver for the Trellis build resolver.
//!
//! Resolves the package tree rooted at the current directory and drives
//! the registered pipeline stages, writing their artifacts to the given
//! output directory. Exits non-zero on any fatal resolution or stage
//! failure; partial artifacts are not considered valid.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use trellis_core::manifest::PackageManifest;
use trellis_resolver::{PluginPipeline, ResolutionEngine, ResolvedStage};

/// Package-tree resolver driving the Trellis build pipeline
#[derive(Parser)]
#[command(name = "trellis", version, about = "Resolve a package tree and run the build pipeline")]
struct Cli {
    /// Directory where pipeline stages write their artifacts
    output_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run_cli(cli) {
        error!("There was an error resolving");
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    rt.block_on(async {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        check_project(&cwd)?;

        let output_dir = if cli.output_dir.is_absolute() {
            cli.output_dir.clone()
        } else {
            cwd.join(&cli.output_dir)
        };
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let pipeline = PluginPipeline::new().register(Box::new(ResolvedStage::new()));
        let mut engine = ResolutionEngine::new(pipeline);

        engine.resolve(&cwd).await?;
        info!("Resolved {} packages", engine.resolved().len());

        engine.run_post_resolvers(&output_dir)?;
        engine.run_writers(&output_dir)?;

        Ok(())
    })
}

/// Refuse to run from a directory whose manifest has no build config
fn check_project(cwd: &Path) -> Result<()> {
    let descriptor = cwd.join("package.json");
    let text = std::fs::read_to_string(&descriptor)
        .with_context(|| format!("Failed to read {}", descriptor.display()))?;
    let manifest = PackageManifest::from_json(&descriptor.to_string_lossy(), &text)?;

    if manifest.build.is_none() {
        bail!(
            "This project does not appear to be a Trellis build project. \
             Are you running this from the wrong directory?"
        );
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("trellis={level},trellis_resolver={level},trellis_core={level}"))
        .with_target(false)
        .init();
}
