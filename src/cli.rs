// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the run and exec subcommands and their shared machine flags.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockproc")]
#[command(about = "Run a remote Docker container as if it were a local process")]
#[command(version)]
pub struct Cli {
    /// Log lifecycle steps to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an image to completion and print its output
    Run {
        /// Image to run (falls back to the config file)
        image: Option<String>,

        /// Container name (derived from the image by default)
        #[arg(long)]
        name: Option<String>,

        /// Mount as SOURCE:TARGET[:ro|rw]
        #[arg(short, long = "mount")]
        mounts: Vec<String>,

        /// Leave the container and image on the daemon
        #[arg(long)]
        keep: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Start an image and run one command inside it
    Exec {
        /// Image to start
        image: Option<String>,

        /// Shell command run with bash -c (falls back to the config file)
        #[arg(long, conflicts_with = "script")]
        inline: Option<String>,

        /// Local script uploaded into the container and run
        #[arg(long)]
        script: Option<PathBuf>,

        /// Interpreter for --script
        #[arg(long)]
        interpreter: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
pub struct CommonArgs {
    /// Environment entry KEY=VALUE (bare KEY copies the host value)
    #[arg(short, long = "env")]
    pub env: Vec<String>,

    /// Retry budget for image pull and exec creation
    #[arg(long)]
    pub retry: Option<u32>,

    /// Config file (defaults to dockproc.yml discovery)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Daemon endpoint (overrides DOCKER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// TLS certificate directory (overrides DOCKER_CERT_PATH)
    #[arg(long)]
    pub cert_path: Option<PathBuf>,

    /// Daemon API version as MAJOR.MINOR
    #[arg(long)]
    pub api_version: Option<String>,
}
