use std::collections::BTreeMap;
use std::io::{self, Read};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use volumes::{ManagerConfig, PutEntry, RequestSurface, Result, VolumeManager, VolumePatchRequest};

/// Exercises a volume's LIST/PUT/PATCH operations in-process, playing the
/// role the out-of-scope HTTP transport otherwise would.
#[derive(Parser)]
#[command(name = "volumes-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive a volume's request surface from the command line", long_about = None)]
struct Cli {
    /// Directory holding each volume's durable store, one subdirectory
    /// per volume id.
    #[arg(long, default_value = ".")]
    data_dir: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List files under a path prefix.
    List {
        /// Volume id (an `ephemeral:`-prefixed id opens with no durable
        /// tier).
        volume: String,
        /// Path prefix to list under.
        #[arg(default_value = "/")]
        path: String,
        /// Content selector: `true`, `false`, or a prefix string.
        #[arg(long)]
        content: Option<String>,
    },
    /// Replace a volume's entire contents with `path=content` pairs.
    Put {
        /// Volume id.
        volume: String,
        /// One or more `path=content` pairs.
        entries: Vec<String>,
    },
    /// Apply a batch of patches read as a `VolumePatchRequest` JSON
    /// document from stdin.
    Patch {
        /// Volume id.
        volume: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let manager = Arc::new(VolumeManager::new(ManagerConfig::new(cli.data_dir)));
    let surface = RequestSurface::new(manager);

    match cli.command {
        Some(Commands::List { volume, path, content }) => {
            let response = surface.list(&volume, &path, content.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Some(Commands::Put { volume, entries }) => {
            let mut map = BTreeMap::new();
            for entry in entries {
                match entry.split_once('=') {
                    Some((path, content)) => {
                        map.insert(path.to_string(), PutEntry { content: content.to_string() });
                    }
                    None => {
                        eprintln!("invalid entry {entry:?}, expected path=content");
                        process::exit(1);
                    }
                }
            }
            surface.put(&volume, map)?;
        }
        Some(Commands::Patch { volume }) => {
            let mut body = String::new();
            io::stdin().read_to_string(&mut body)?;
            let request: VolumePatchRequest = serde_json::from_str(&body)?;
            let response = surface.patch(&volume, request)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        None => {
            process::exit(1);
        }
    }

    Ok(())
}
