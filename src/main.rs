use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use keystone_lib::{
    Launcher, LauncherError, LauncherPaths, LauncherResult, ProgressCallback, ProgressEvent,
    ProgressTracker,
};

#[derive(Parser, Debug)]
#[command(
    name = "keystone",
    author,
    version,
    about = "Installs and launches the modpack published by a Keystone server"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bring the install dir to the server's desired state.
    Install,
    /// Start the installed game.
    Launch {
        /// Offline player name; defaults to the saved profile.
        #[arg(long)]
        player: Option<String>,
    },
    /// Reconcile the mods folder only.
    SyncMods,
    /// Fetch the desired state and save it without installing.
    Refresh,
    /// Show the saved configuration.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,keystone_lib=debug")),
        )
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling...");
                cancel.cancel();
            }
        });
    }

    match run(cli.command, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, cancel: &CancellationToken) -> LauncherResult<()> {
    let launcher = Launcher::new(LauncherPaths::from_user_dirs())?;

    match command {
        Command::Install => {
            let config = launcher.install(&progress_logger(), cancel).await?;
            tracing::info!(
                "Ready: {} {} {}",
                config.game_version,
                config.loader,
                config.loader_version
            );
        }
        Command::Launch { player } => {
            let console = launcher.load_config()?.console_enabled;
            let mut child = launcher.launch(player.as_deref(), cancel).await?;
            tracing::info!("Game started (pid {:?})", child.id());
            if console {
                let status = child
                    .wait()
                    .await
                    .map_err(|e| LauncherError::Other(e.to_string()))?;
                tracing::info!("Game exited with {}", status);
            }
        }
        Command::SyncMods => launcher.sync_mods(&progress_logger(), cancel).await?,
        Command::Refresh => {
            let config = launcher.refresh_from_server(cancel).await?;
            tracing::info!(
                "Desired state: {} {} {}",
                config.game_version,
                config.loader,
                config.loader_version
            );
        }
        Command::Status => {
            let config = launcher.load_config()?;
            println!("config:      {}", launcher.paths().root().display());
            println!("install dir: {}", config.install_dir.display());
            println!("game:        {}", config.game_version);
            println!("loader:      {} {}", config.loader, config.loader_version);
            println!("memory:      {} MB", config.memory_mb);
            println!("installed:   {}", launcher.is_installed()?);
        }
    }
    Ok(())
}

fn progress_logger() -> Arc<ProgressTracker> {
    let callback: ProgressCallback = Arc::new(|event: &ProgressEvent| {
        tracing::info!(
            "[{:>3.0}%] {} {}/{}",
            event.fraction * 100.0,
            event.step,
            event.done,
            event.total
        );
    });
    ProgressTracker::new(Some(callback))
}
