// src/main.rs

use a2_repack::Repackager;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Repackage third-party artifacts into an A2 component repository
#[derive(Parser)]
#[command(name = "a2-repack")]
#[command(author, version, about = "Repackage third-party artifacts into an A2 repository", long_about = None)]
struct Cli {
    /// A2 output directory
    a2_dir: PathBuf,
    /// Category paths, relative to the current descriptors directory
    #[arg(required = true)]
    categories: Vec<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let a2_base = std::path::absolute(&cli.a2_dir)?;
    let descriptors_base = std::env::current_dir()?;
    let repackager = Repackager::new(a2_base, descriptors_base)?;
    if repackager.sequential() {
        info!("Build will be sequential");
    }

    let failures = repackager.run(&cli.categories);

    // Summary
    println!("# License summary:");
    print!("{}", repackager.license_summary());

    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("Category {} failed: {}", failure.category.display(), failure.error);
        }
        std::process::exit(1);
    }
    Ok(())
}
