use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

// `#[zbus::proxy]` generates `VerifierProxy` (async) and `VerifierProxyBlocking`.
#[zbus::proxy(
    interface = "org.likeness.Verifier1",
    default_service = "org.likeness.Verifier1",
    default_path = "/org/likeness/Verifier1"
)]
trait Verifier {
    async fn enroll(&self, name: &str, image_paths: Vec<String>) -> zbus::Result<String>;
    async fn verify(&self, name: &str, image_path: &str) -> zbus::Result<String>;
    async fn remove(&self, name: &str) -> zbus::Result<bool>;
    async fn list_profiles(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "likeness", about = "Likeness face enrollment and verification CLI")]
struct Cli {
    /// Talk to the daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a person from one or more photos (replaces any previous profile)
    Enroll {
        /// Person name
        name: String,
        /// Photo files
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Verify a photo against an enrolled person
    Verify {
        /// Claimed person name
        name: String,
        /// Photo file
        image: PathBuf,
    },
    /// Remove an enrolled person
    Remove {
        /// Person name
        name: String,
    },
    /// List enrolled people
    List,
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    };
    let conn = conn.context("connecting to D-Bus")?;
    let proxy = VerifierProxy::new(&conn)
        .await
        .context("likenessd is not reachable")?;

    match cli.command {
        Commands::Enroll { name, images } => {
            let paths = images
                .iter()
                .map(|p| absolute(p.as_path()))
                .collect::<Result<Vec<_>>>()?;
            tracing::debug!(name = %name, images = paths.len(), "enroll");
            print_json(&proxy.enroll(&name, paths).await?)?;
        }
        Commands::Verify { name, image } => {
            let path = absolute(&image)?;
            print_json(&proxy.verify(&name, &path).await?)?;
        }
        Commands::Remove { name } => {
            if proxy.remove(&name).await? {
                println!("Removed {name}");
            } else {
                println!("{name} is not registered");
            }
        }
        Commands::List => {
            print_json(&proxy.list_profiles().await?)?;
        }
        Commands::Status => {
            print_json(&proxy.status().await?)?;
        }
    }

    Ok(())
}

/// The daemon resolves paths in its own working directory, so send absolute ones.
fn absolute(path: &Path) -> Result<String> {
    let abs = std::fs::canonicalize(path)
        .with_context(|| format!("resolving {}", path.display()))?;
    Ok(abs.to_string_lossy().into_owned())
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw).context("daemon returned invalid JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
