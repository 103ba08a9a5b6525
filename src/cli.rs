// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Every host path can be overridden by flag or environment variable.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crio_hook_installer::config::{CRIO_CONFIG_DROP_IN_PATH, CRIO_CONFIG_PATH, ConfigPaths};
use crio_hook_installer::hooks::{
    DEFAULT_DEST_DECL, DEFAULT_DEST_SCRIPT, DEFAULT_SOURCE_DECL, DEFAULT_SOURCE_SCRIPT,
    DEFAULT_STAGING_SCRIPT, HookConfiguration,
};
use crio_hook_installer::output::OutputMode;
use crio_hook_installer::socket::{CRIO_SOCKET_CONTAINER_PATH, CRIO_SOCKET_HOST_PATH, SocketLink};

#[derive(Parser)]
#[command(name = "crio-hook-installer")]
#[command(about = "Detect the CRI-O default OCI runtime and install a runtime-aware OCI hook")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Normal, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the default runtime, install the OCI hook and link the CRI-O socket
    Setup {
        #[command(flatten)]
        crio: CrioArgs,

        #[command(flatten)]
        hook: HookArgs,

        #[command(flatten)]
        socket: SocketArgs,

        /// Node name reported in the result (defaults to the hostname)
        #[arg(long, env = "NODE_NAME")]
        node_name: Option<String>,

        /// Keep running after setup until SIGINT or SIGTERM
        #[arg(long)]
        wait: bool,
    },

    /// Print the default runtime without modifying the host
    Detect {
        #[command(flatten)]
        crio: CrioArgs,

        /// Node name reported in the result (defaults to the hostname)
        #[arg(long, env = "NODE_NAME")]
        node_name: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Normal,
    Quiet,
    Json,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Normal => OutputMode::Normal,
            OutputFormat::Quiet => OutputMode::Quiet,
            OutputFormat::Json => OutputMode::Json,
        }
    }
}

#[derive(Args)]
pub struct CrioArgs {
    /// CRI-O main configuration file
    #[arg(long, env = "CRIO_CONFIG", default_value = CRIO_CONFIG_PATH)]
    pub crio_config: PathBuf,

    /// CRI-O drop-in configuration directory
    #[arg(long, env = "CRIO_CONFIG_DROP_IN", default_value = CRIO_CONFIG_DROP_IN_PATH)]
    pub crio_config_drop_in: PathBuf,
}

impl CrioArgs {
    pub fn config_paths(&self) -> ConfigPaths {
        ConfigPaths {
            main_file: self.crio_config.clone(),
            drop_in_dir: self.crio_config_drop_in.clone(),
        }
    }
}

#[derive(Args)]
pub struct HookArgs {
    /// Hook script template
    #[arg(long, env = "HOOK_SCRIPT_SOURCE", default_value = DEFAULT_SOURCE_SCRIPT)]
    pub hook_script_source: PathBuf,

    /// Installed hook script location
    #[arg(long, env = "HOOK_SCRIPT_DEST", default_value = DEFAULT_DEST_SCRIPT)]
    pub hook_script_dest: PathBuf,

    /// Hook declaration (hooks.d JSON) to install
    #[arg(long, env = "HOOK_DECL_SOURCE", default_value = DEFAULT_SOURCE_DECL)]
    pub hook_decl_source: PathBuf,

    /// Installed hook declaration location
    #[arg(long, env = "HOOK_DECL_DEST", default_value = DEFAULT_DEST_DECL)]
    pub hook_decl_dest: PathBuf,

    /// Scratch file for the patched script
    #[arg(long, env = "HOOK_STAGING_PATH", default_value = DEFAULT_STAGING_SCRIPT)]
    pub hook_staging_path: PathBuf,
}

impl HookArgs {
    pub fn hook_configuration(&self) -> HookConfiguration {
        HookConfiguration {
            source_script_path: self.hook_script_source.clone(),
            dest_script_path: self.hook_script_dest.clone(),
            source_decl_path: self.hook_decl_source.clone(),
            dest_decl_path: self.hook_decl_dest.clone(),
            staging_script_path: self.hook_staging_path.clone(),
        }
    }
}

#[derive(Args)]
pub struct SocketArgs {
    /// Socket path inside the agent container
    #[arg(long, env = "CRIO_SOCKET_CONTAINER", default_value = CRIO_SOCKET_CONTAINER_PATH)]
    pub crio_socket_container: PathBuf,

    /// Host CRI-O socket as mounted into the agent container
    #[arg(long, env = "CRIO_SOCKET_HOST", default_value = CRIO_SOCKET_HOST_PATH)]
    pub crio_socket_host: PathBuf,
}

impl SocketArgs {
    pub fn socket_link(&self) -> SocketLink {
        SocketLink {
            container_path: self.crio_socket_container.clone(),
            host_path: self.crio_socket_host.clone(),
        }
    }
}
