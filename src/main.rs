// ABOUTME: Entry point for the crio-hook-installer CLI application.
// ABOUTME: Parses arguments, initialises tracing and dispatches to setup or detect.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use crio_hook_installer::config::{ConfigPaths, ConfigResolver};
use crio_hook_installer::diagnostics::Diagnostics;
use crio_hook_installer::error::Result;
use crio_hook_installer::fs::HostFs;
use crio_hook_installer::handler::RuntimeHandler;
use crio_hook_installer::output::{DetectReport, Output, OutputMode, SetupReport};
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(OutputMode::from(cli.output));
    output.start_timer();

    if let Err(e) = run(cli.command, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: &Output) -> Result<()> {
    match command {
        Commands::Setup {
            crio,
            hook,
            socket,
            node_name,
            wait,
        } => {
            let hook_config = hook.hook_configuration();
            let socket_link = socket.socket_link();
            let handler = RuntimeHandler::new(hook_config.clone())
                .with_config_paths(crio.config_paths())
                .with_socket_link(socket_link.clone());

            output.progress("Setting up CRI-O OCI hook...");

            // Setup is blocking filesystem work; keep it off the async workers.
            let handler = tokio::task::spawn_blocking(move || handler.setup()).await??;

            output.report(&SetupReport {
                runtime: handler.runtime().to_string(),
                node: node_name.unwrap_or_else(hostname),
                hook_script: hook_config.dest_script_path,
                hook_declaration: hook_config.dest_decl_path,
                socket: socket_link.container_path,
                warnings: warning_messages(handler.diagnostics()),
                completed_at: chrono::Utc::now(),
            });

            if wait {
                wait_for_shutdown().await?;
            }
            Ok(())
        }
        Commands::Detect { crio, node_name } => {
            let paths: ConfigPaths = crio.config_paths();
            let mut diagnostics = Diagnostics::default();
            let runtime = ConfigResolver::new(&HostFs, &paths).resolve(&mut diagnostics)?;

            output.report(&DetectReport {
                runtime: runtime.to_string(),
                node: node_name.unwrap_or_else(hostname),
                config_file: paths.main_file,
                drop_in_dir: paths.drop_in_dir,
                warnings: warning_messages(&diagnostics),
            });
            Ok(())
        }
    }
}

fn hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

fn warning_messages(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics
        .warnings()
        .iter()
        .map(|w| w.message.clone())
        .collect()
}

/// Block until SIGINT or SIGTERM.
async fn wait_for_shutdown() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tracing::info!("Setup complete, waiting for shutdown signal");
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    tracing::info!("Shutting down");
    Ok(())
}
