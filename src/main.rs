use std::path::{Path, PathBuf};
use std::process;

use ascii_table::{Align, AsciiTable};
use clap::{Parser, Subcommand};
use log::info;

use shardsync::block::chunk_reader;
use shardsync::ring::{node_index, HashRing};
use shardsync::{BlockList, LocalIndex, SyncError};

/// Command-line interface for shardsync
#[derive(Parser, Debug)]
#[command(
    name = "shardsync",
    version,
    about = "A block-sharded, content-addressed directory synchronizer"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk a file and print which block-store node owns each block
    Locate {
        /// Total number of block-store servers
        num_servers: usize,
        /// Block size in bytes
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        block_size: u64,
        /// File to chunk
        input: PathBuf,
        /// Comma-separated indices of servers in a failed state
        #[arg(long, value_delimiter = ',')]
        down_servers: Vec<usize>,
    },
    /// Print the local index of a synchronized directory
    Index {
        /// Base directory
        dir: PathBuf,
    },
}

fn main() {
    // Initialize logging using env_logger and SHARDSYNC_LOG
    env_logger::Builder::from_env(env_logger::Env::new().filter("SHARDSYNC_LOG")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let result = match cli.command {
        Commands::Locate {
            num_servers,
            block_size,
            input,
            down_servers,
        } => locate(num_servers, block_size as usize, &input, &down_servers),
        Commands::Index { dir } => show_index(&dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn locate(
    num_servers: usize,
    block_size: usize,
    input: &Path,
    down_servers: &[usize],
) -> Result<(), SyncError> {
    info!("Total number of blockStore servers: {num_servers}");
    info!("Block size: {block_size}");
    info!("Processing input data filename: {}", input.display());
    if down_servers.is_empty() {
        info!("No servers are in a failed state");
    }
    for server in down_servers {
        info!("Server {server} is in a failed state");
    }

    let ring = HashRing::new(num_servers, down_servers);
    let file = std::fs::File::open(input)?;
    let mut pairs = Vec::new();
    for block in chunk_reader(file, block_size) {
        let block = block?;
        let addr = ring.responsible_server(&block.hash)?;
        let index = node_index(addr)
            .ok_or_else(|| SyncError::Other(format!("unexpected server name {addr}")))?;
        pairs.push(format!("{{{},{}}}", block.hash, index));
    }
    println!("{{{}}}", pairs.join(","));
    Ok(())
}

fn show_index(dir: &Path) -> Result<(), SyncError> {
    if !LocalIndex::path(dir).exists() {
        println!("No local index in {}", dir.display());
        return Ok(());
    }
    let index = LocalIndex::load(dir)?;

    let mut table = AsciiTable::default();
    table.column(0).set_header("File").set_align(Align::Left);
    table.column(1).set_header("Version").set_align(Align::Right);
    table.column(2).set_header("Blocks").set_align(Align::Right);
    table.column(3).set_header("First block").set_align(Align::Left);

    let rows: Vec<Vec<String>> = index
        .files
        .values()
        .map(|meta| {
            let (blocks, first) = match &meta.blocks {
                BlockList::Deleted => ("deleted".to_string(), String::new()),
                BlockList::Present(hashes) => (
                    hashes.len().to_string(),
                    hashes.first().map(|h| short_hash(h)).unwrap_or_default(),
                ),
            };
            vec![meta.filename.clone(), meta.version.to_string(), blocks, first]
        })
        .collect();
    table.print(rows);
    Ok(())
}

/// First 16 characters of a hash, for display.
fn short_hash(hash: &str) -> String {
    hash.chars().take(16).collect()
}
