// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ssrkit_cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ssrkit")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Compile, prerender and serve server-side rendered views", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Directory containing ssrkit.toml
    #[arg(short = 'C', long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the configured pages, compiling views on demand
    Serve {
        /// Port to run the server on (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (overrides [server].host)
        #[arg(long)]
        host: Option<String>,
        /// Build each view once and reuse the output
        #[arg(long)]
        production: bool,
    },
    /// Compile every configured page without serving
    Prerender {
        /// Directory handler-relative views resolve against
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Print the compilation options for a view as JSON
    Inspect {
        /// View file, relative to the views folder
        view: String,
        /// Title requested for the render
        #[arg(short, long)]
        title: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            production,
        } => commands::serve::run(&cli.config_dir, host, port, production).await,
        Commands::Prerender { dir } => {
            commands::prerender::run(&cli.config_dir, dir.as_deref()).await.map(|_| ())
        }
        Commands::Inspect { view, title } => {
            commands::inspect::run(&cli.config_dir, &view, title).await
        }
    }
}
