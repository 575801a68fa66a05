use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "oscf-cli")]
#[command(about = "Open Source Contribution Finder command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one digest pass: fetch candidates, rank per profile, notify.
    Digest,
    /// Insert the bundled sample profiles into the store.
    Seed,
    /// List stored profiles.
    Profiles,
    /// Serve the JSON API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Digest) {
        Commands::Digest => {
            let summary = oscf_digest::run_digest_once_from_env().await?;
            println!(
                "digest complete: run_id={} source={} profiles={} candidates={} notified={}",
                summary.run_id,
                summary.source_id,
                summary.profiles,
                summary.candidate_issues,
                summary.notified
            );
        }
        Commands::Seed => {
            let config = oscf_digest::DigestConfig::from_env();
            let mut store = oscf_store::JsonProfileStore::open(config.store_path).await;
            store.seed_samples().await?;
            println!(
                "seeded store: path={} profiles={}",
                store.path().display(),
                store.len()
            );
        }
        Commands::Profiles => {
            let config = oscf_digest::DigestConfig::from_env();
            let store = oscf_store::JsonProfileStore::open(config.store_path).await;
            for profile in store.all() {
                println!(
                    "{} level={:?} skills={} interests={}",
                    profile.email,
                    profile.experience_level,
                    profile.skills.join(","),
                    profile.interests.join(",")
                );
            }
        }
        Commands::Serve => {
            oscf_web::serve_from_env().await?;
        }
    }

    Ok(())
}
