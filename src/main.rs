//! Command-line entry point of the course grabber
//!
//! # Usage
//!
//! ## Grab mode (default)
//! ```bash
//! xkfw-grab --course COMP30072701:major --course PHED10265003:physical
//! ```
//!
//! ## Check the login only
//! ```bash
//! xkfw-grab login --username 2201111111
//! ```
//!
//! ## Write a starter config
//! ```bash
//! xkfw-grab init
//! ```

use clap::{Parser, Subcommand};

use xkfw_grabber::{
    cli::{
        grab::{GrabArgs, run_grab_mode},
        init::{InitArgs, run_init_mode},
        login::{LoginArgs, run_login_mode},
    },
    types::ReservationTarget,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "xkfw-grab")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    // Grab mode options (when no subcommand is provided)
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Student number, overrides the configured account
    #[arg(short, long, value_name = "USERNAME")]
    username: Option<String>,

    /// Course to grab as CODE[:major|elective|physical|program]; repeatable
    #[arg(long = "course", value_name = "CODE:CATEGORY")]
    courses: Vec<ReservationTarget>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in once and print the resolved session
    Login {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,

        /// Student number, overrides the configured account
        #[arg(short, long)]
        username: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Write a configuration template
    Init {
        /// Where to write it (default: platform config directory)
        #[arg(value_name = "PATH")]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Login {
            config,
            username,
            verbose,
        }) => {
            let args = LoginArgs {
                config,
                username,
                verbose,
            };
            run_login_mode(args).await
        }
        Some(Commands::Init { path }) => run_init_mode(InitArgs { path }),
        None => {
            let args = GrabArgs {
                config: cli.config,
                username: cli.username,
                courses: cli.courses,
                verbose: cli.verbose,
            };
            run_grab_mode(args).await
        }
    }
}
