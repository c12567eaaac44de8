//! # MinatoDB CLI
//!
//! Loads tab-separated key/value data into a single-holder local
//! cluster and scans it back out.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::Level;

use minato_core::TableConfig;
use minato_net::LocalCluster;
use minato_storage::{
    DiskTable, RecordStream, ShardCatalog, ShardFile, TableInfo, DEFAULT_MAX_BLOCK_SIZE,
};

#[derive(Parser)]
#[command(name = "minato")]
#[command(about = "MinatoDB - disk-backed partitioned key/value tables")]
struct Cli {
    /// Log at debug level instead of warn
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Load tab-separated key/value lines into a table
    Put {
        /// Directory the partition holder persists shards into
        #[arg(long)]
        dir: PathBuf,
        /// Table name
        #[arg(long)]
        table: String,
        /// Records written under one block number before rotation
        #[arg(long, default_value_t = DEFAULT_MAX_BLOCK_SIZE)]
        block_size: u64,
        /// Records per enqueued block
        #[arg(long, default_value_t = 128)]
        threshold: usize,
        /// Input file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print every record of a table as tab-separated lines
    Scan {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        table: String,
    },
    /// List a table's shards
    Ls {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        table: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Put {
            dir,
            table,
            block_size,
            threshold,
            input,
        } => put(dir, table, block_size, threshold, input).await,
        Commands::Scan { dir, table } => scan(dir, table).await,
        Commands::Ls { dir, table } => ls(dir, table),
    }
}

async fn put(
    dir: PathBuf,
    table: String,
    block_size: u64,
    threshold: usize,
    input: Option<PathBuf>,
) -> Result<()> {
    let cluster = LocalCluster::new();
    cluster.add_holder(&dir)?;
    let handle = Arc::new(cluster.handle());

    let mut info = TableInfo::new(table.as_str(), &dir);
    info.max_block_size = block_size;
    let config = TableConfig {
        write_enqueue_threshold: threshold,
        ..Default::default()
    };
    let disk_table = DiskTable::new(info, config)?;
    let metrics = disk_table.metrics();
    let mut writer = disk_table.into_writer(handle.clone(), handle);

    let input: Box<dyn BufRead> = match input {
        Some(path) => Box::new(std::io::BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };
    for line in input.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        // A line without a tab is a key with an empty value.
        let (key, value) = line.split_once('\t').unwrap_or((line.as_str(), ""));
        writer.put(key, value).await;
    }
    writer.finish().await?;

    let snap = metrics.snapshot();
    println!(
        "put {} records in {} blocks into table {}",
        snap.records_put, snap.blocks_sent, table
    );
    Ok(())
}

async fn scan(dir: PathBuf, table: String) -> Result<()> {
    let disk_table = DiskTable::new(
        TableInfo::new(table.as_str(), &dir),
        TableConfig::default(),
    )?;
    let mut reader = disk_table.into_reader().await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut records = 0u64;
    while let Some((key, value)) = reader.next_pair().await {
        out.write_all(&key)?;
        out.write_all(b"\t")?;
        out.write_all(&value)?;
        out.write_all(b"\n")?;
        records += 1;
    }
    out.flush()?;
    eprintln!("scanned {} records from table {}", records, table);
    Ok(())
}

fn ls(dir: PathBuf, table: String) -> Result<()> {
    let catalog = ShardCatalog::discover(&TableInfo::new(table.as_str(), &dir))?;
    if catalog.is_empty() {
        println!("no shards for table {} in {}", table, dir.display());
        return Ok(());
    }
    for shard in catalog.shards() {
        println!(
            "{:>12} bytes  {:>6} blocks  number {:>6}  {}",
            shard.len,
            count_blocks(shard, table.as_str()),
            shard.number,
            shard.path.display()
        );
    }
    Ok(())
}

/// Frames in one shard file; an unreadable shard lists as zero, the
/// same way the read pipeline skips it.
fn count_blocks(shard: &ShardFile, table: &str) -> usize {
    RecordStream::open(shard, table)
        .map(|stream| stream.count())
        .unwrap_or(0)
}
