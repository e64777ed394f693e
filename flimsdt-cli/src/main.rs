//! flimsdt CLI
//!
//! Inspects Becker & Hickl SDT files and extracts plane regions.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use flimsdt_core::Region;
use flimsdt_io::{PlaneWriter, ReaderConfig, SdtFileReader};
use log::{info, warn};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    FlimIo(#[from] flimsdt_io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Becker & Hickl SDT file inspector and plane extractor.
#[derive(Parser)]
#[command(name = "flimsdt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about an SDT file
    Info {
        /// Input SDT file
        input: PathBuf,

        /// Print the full property table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a region of one plane and write it out
    Extract {
        /// Input SDT file
        input: PathBuf,

        /// Plane (channel) index
        #[arg(short, long, default_value = "0")]
        plane: usize,

        /// Region as x,y,width,height (default: whole plane)
        #[arg(short, long, value_parser = parse_region)]
        region: Option<Region>,

        /// Sum each pixel's histogram into one intensity value
        #[arg(short, long)]
        merge: bool,

        /// Output file (.csv for text, anything else for raw bytes)
        #[arg(short, long)]
        output: PathBuf,

        /// Reader configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn parse_region(s: &str) -> std::result::Result<Region, String> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid region '{s}': {e}"))?;
    match parts.as_slice() {
        &[x, y, width, height] => Ok(Region::new(x, y, width, height)),
        _ => Err(format!(
            "invalid region '{s}': expected x,y,width,height"
        )),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default));
    builder.format_timestamp(None);
    builder.init();
}

fn print_info(input: &Path, as_json: bool) -> Result<()> {
    let reader = SdtFileReader::open(input)?;
    let header = reader.header();

    if as_json {
        let doc = json!({
            "file": input.display().to_string(),
            "size": reader.file_size(),
            "layout": header.layout.to_string(),
            "block_count": header.block_count,
            "compressed": header.is_compressed(),
            "shape": reader.shape(),
            "properties": reader.metadata(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("File: {}", input.display());
    println!(
        "Size: {} bytes ({:.2} MB)",
        reader.file_size(),
        reader.file_size() as f64 / 1_000_000.0
    );
    println!("Dimensions: {} x {}", header.width, header.height);
    println!("Time bins: {}", header.time_bins);
    println!("Channels: {}", header.channels);
    println!("Time base: {:.4} ns", header.time_base_ns);
    println!("Layout: {}", header.layout);
    println!("Data blocks: {}", header.block_count);
    println!("Compressed: {}", header.is_compressed());
    for (key, value) in &header.identification.entries {
        if !value.is_empty() {
            println!("{}: {}", key, value);
        }
    }
    Ok(())
}

fn extract(
    input: &Path,
    plane: usize,
    region: Option<Region>,
    merge: bool,
    output: &Path,
    config: Option<&Path>,
) -> Result<()> {
    let mut reader_config = match config {
        Some(path) => ReaderConfig::from_file(path)?,
        None => ReaderConfig::default(),
    };
    if merge {
        reader_config.merge_intensity = true;
    }

    let start = Instant::now();
    let reader = SdtFileReader::open_with_config(input, reader_config)?;
    let region = region.unwrap_or_else(|| reader.header().geometry.full_region());
    let decoded = reader.read_plane(plane, region)?;
    info!(
        "decoded plane {} region {:?} in {:.2?}",
        plane,
        region,
        start.elapsed()
    );

    let format = output
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or_else(|| "bin".to_string(), str::to_lowercase);
    let mut writer = PlaneWriter::create(output)?;
    match format.as_str() {
        "csv" => writer.write_csv(&decoded)?,
        "bin" | "raw" | "dat" => writer.write_raw(&decoded)?,
        other => {
            warn!("unknown extension '{}', writing raw bytes", other);
            writer.write_raw(&decoded)?;
        }
    }

    println!(
        "Wrote {} pixels ({} bytes) of plane {} to {}",
        decoded.pixel_count(),
        decoded.data.len(),
        plane,
        output.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { input, json } => print_info(&input, json),
        Commands::Extract {
            input,
            plane,
            region,
            merge,
            output,
            config,
        } => extract(&input, plane, region, merge, &output, config.as_deref()),
    }
}
