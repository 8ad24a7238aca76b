//! Drawmirror CLI
//!
//! Command-line tools for running and operating a drawmirror instance.
//!
//! # Commands
//!
//! - `serve` - Serve the export endpoint and operator API
//! - `node` - Add, remove and list registered nodes
//! - `drawing` - Create, show, save and delete local drawings
//! - `pull` - Replace the local dataset with a node's export
//! - `export` / `import` - Move archives by hand
//! - `verify` / `info` - Check and describe archive files

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Drawmirror instance tools.
#[derive(Parser)]
#[command(name = "drawmirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the instance data directory
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the export endpoint and operator API
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:3002")]
        bind: SocketAddr,

        /// JSON file of nodes to register at startup
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Leave the node registry out of exports
        #[arg(long)]
        no_nodes: bool,
    },

    /// Manage registered nodes
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },

    /// Work with local drawings
    Drawing {
        #[command(subcommand)]
        action: DrawingAction,
    },

    /// Replace the local dataset with a node's export
    Pull {
        /// Name of the node to pull from
        name: String,

        /// Request timeout in seconds
        #[arg(short, long, default_value = "60")]
        timeout: u64,
    },

    /// Write the local dataset to an archive file
    Export {
        /// Output file
        #[arg(short, long)]
        out: PathBuf,

        /// Leave the node registry out of the archive
        #[arg(long)]
        no_nodes: bool,
    },

    /// Replace the local dataset with an archive file
    Import {
        /// Archive file
        file: PathBuf,
    },

    /// Verify an archive file
    Verify {
        /// Archive file
        file: PathBuf,
    },

    /// Describe an archive file
    Info {
        /// Archive file
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum NodeAction {
    /// Register a node
    Add {
        /// Unique node name
        name: String,
        /// Base URL, e.g. http://10.0.0.2:3002
        url: String,
    },
    /// Remove a node
    Remove {
        /// Node name
        name: String,
    },
    /// List registered nodes
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum DrawingAction {
    /// Create an empty drawing
    Create {
        /// Display name
        name: String,
    },
    /// List drawings
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print a drawing as JSON
    Show {
        /// Drawing ID
        id: String,
    },
    /// Apply an editor save from a JSON file
    Save {
        /// Drawing ID
        id: String,
        /// JSON file with `elements`, `appState`, `files` and/or `name`
        file: PathBuf,
    },
    /// Delete a drawing
    Delete {
        /// Drawing ID
        id: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            seed,
            no_nodes,
        } => {
            let path = cli.data_dir.ok_or("Data directory required for serve")?;
            commands::serve::run(&path, bind, seed.as_deref(), !no_nodes)?;
        }
        Commands::Node { action } => {
            let path = cli.data_dir.ok_or("Data directory required for node")?;
            match action {
                NodeAction::Add { name, url } => commands::node::add(&path, &name, &url)?,
                NodeAction::Remove { name } => commands::node::remove(&path, &name)?,
                NodeAction::List { format } => commands::node::list(&path, &format)?,
            }
        }
        Commands::Drawing { action } => {
            let path = cli.data_dir.ok_or("Data directory required for drawing")?;
            match action {
                DrawingAction::Create { name } => commands::drawing::create(&path, &name)?,
                DrawingAction::List { format } => commands::drawing::list(&path, &format)?,
                DrawingAction::Show { id } => commands::drawing::show(&path, &id)?,
                DrawingAction::Save { id, file } => commands::drawing::save(&path, &id, &file)?,
                DrawingAction::Delete { id } => commands::drawing::delete(&path, &id)?,
            }
        }
        Commands::Pull { name, timeout } => {
            let path = cli.data_dir.ok_or("Data directory required for pull")?;
            commands::pull::run(&path, &name, timeout)?;
        }
        Commands::Export { out, no_nodes } => {
            let path = cli.data_dir.ok_or("Data directory required for export")?;
            commands::transfer::export(&path, &out, !no_nodes)?;
        }
        Commands::Import { file } => {
            let path = cli.data_dir.ok_or("Data directory required for import")?;
            commands::transfer::import(&path, &file)?;
        }
        Commands::Verify { file } => {
            commands::inspect::verify(&file)?;
        }
        Commands::Info { file, format } => {
            commands::inspect::info(&file, &format)?;
        }
        Commands::Version => {
            println!("drawmirror CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("archive format v{}", drawmirror_core::ARCHIVE_VERSION);
        }
    }

    Ok(())
}
