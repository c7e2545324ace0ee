mod build;
mod config;
mod error;
mod extract;
mod generate;
mod install;
mod manifest;
mod paths;
mod progress;
mod range;
mod registry;
mod resolver;
mod sandbox;
mod scoped_path;
mod version;

use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{eyre, Context, Result};
use futures::future::try_join_all;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::read_config;
use crate::manifest::Manifest;
use crate::progress::{log_progress, PROGRESS_BAR};
use crate::resolver::Resolver;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Print verbose logs (including progress indicators)
    #[clap(short, long, global = true)]
    verbose: bool,
    /// Run in a custom working directory
    #[clap(long, global = true, alias = "cwd")]
    working_dir: Option<PathBuf>,
    #[clap(subcommand)]
    cmd: Subcommand,
}

#[derive(Parser, Debug, Clone)]
pub enum Subcommand {
    /// Resolve `dependencies` + `devDependencies` from `package.json` and
    /// install them into `.zepo/packages`
    Install,
    /// Generate build-system integration files from installed packages
    Generate {
        /// Target build system (currently only `cmake`)
        build_system: String,
        #[clap(allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },
}

async fn read_manifest(root: &Path) -> Result<Manifest> {
    let path = root.join("package.json");
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Manifest::parse(&text).with_context(|| format!("failed to parse {}", path.display()))
}

async fn install(root: &Path) -> Result<()> {
    let manifest = read_manifest(root).await?;
    let config = read_config().await?;

    log_progress("resolving dependencies");

    let resolver = Resolver::new(config.clone());
    try_join_all(
        manifest
            .requirements(true)
            .into_iter()
            .map(|(name, expr)| {
                let resolver = &resolver;
                let source = manifest.name.clone();
                async move { resolver.add_requirement(source, name, expr).await }
            }),
    )
    .await?;

    let selections = resolver.into_selections().await;
    log_progress(&format!("installing {} packages", selections.len()));

    install::install_all(config, selections).await?;

    PROGRESS_BAR.finish_and_clear();

    Ok(())
}

async fn generate(root: &Path, build_system: &str, args: &[String]) -> Result<()> {
    let manifest = read_manifest(root).await?;

    match build_system {
        "cmake" => generate::generate_cmake_directory(&manifest, args).await?,
        other => return Err(eyre!("unsupported build system \"{other}\"")),
    }

    PROGRESS_BAR.finish_and_clear();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .init();

    color_eyre::install()?;

    let root = match &args.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    paths::init(&root.join(".zepo")).await?;

    match &args.cmd {
        Subcommand::Install => install(&root).await?,
        Subcommand::Generate { build_system, args: extra } => {
            generate(&root, build_system, extra).await?
        }
    }

    Ok(())
}
