use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use orc_tail::{
    CompressionKind, FileVersion, LocalFile, Reader, ReaderOptions, StripeInfo, StripeStatistics,
    WriterVersion,
};
use serde::Serialize;

/// Print the tail of an ORC file: postscript, footer, schema and statistics.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the ORC file
    path: PathBuf,

    /// Treat the file as this many bytes long
    #[arg(long)]
    max_length: Option<u64>,

    /// Bytes read from the end of the file in the first request
    #[arg(long)]
    initial_read_size: Option<u64>,

    /// Comma separated root fields to estimate the raw data size of
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Also decode and print per-stripe statistics
    #[arg(long)]
    stripe_stats: bool,

    /// Print a JSON document instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    path: &'a PathBuf,
    file_length: u64,
    compression: CompressionKind,
    compression_block_size: u64,
    version: &'a [u32],
    file_version: FileVersion,
    writer_version: WriterVersion,
    number_of_rows: u64,
    content_length: u64,
    metadata_size: u64,
    tail_size: u64,
    row_index_stride: u32,
    schema: String,
    stripes: &'a [StripeInfo],
    user_metadata: Vec<&'a str>,
    raw_data_size: u64,
    columns_raw_data_size: Option<u64>,
    stripe_statistics: Option<Vec<StripeStatistics>>,
}

/// Metadata, footer, postscript and the length byte.
fn tail_size(reader: &Reader) -> u64 {
    let tail = reader.file_tail();
    if tail.file_length == 0 {
        return 0;
    }
    1 + tail.postscript_length as u64 + tail.postscript.footer_length + reader.metadata_size()
}

fn summarize<'a>(args: &'a Args, reader: &'a Reader) -> Result<Summary<'a>> {
    let stripe_statistics = if args.stripe_stats {
        let stats = reader
            .stripe_statistics()
            .context("Failed to decode stripe statistics")?;
        Some(stats.to_vec())
    } else {
        None
    };
    Ok(Summary {
        path: &args.path,
        file_length: reader.file_length(),
        compression: reader.compression(),
        compression_block_size: reader.compression_block_size(),
        version: reader.version_list(),
        file_version: reader.file_version(),
        writer_version: reader.writer_version(),
        number_of_rows: reader.number_of_rows(),
        content_length: reader.content_length(),
        metadata_size: reader.metadata_size(),
        tail_size: tail_size(reader),
        row_index_stride: reader.row_index_stride(),
        schema: reader.schema().to_string(),
        stripes: reader.stripes(),
        user_metadata: reader.metadata_keys(),
        raw_data_size: reader.raw_data_size(),
        columns_raw_data_size: (!args.columns.is_empty())
            .then(|| reader.raw_data_size_of_fields(args.columns.as_slice())),
        stripe_statistics,
    })
}

fn print_text(summary: &Summary<'_>) {
    println!("File: {}", summary.path.display());
    println!("Length: {} bytes", summary.file_length);
    println!(
        "Version: {:?} ({}), writer {:?}",
        summary.version, summary.file_version, summary.writer_version
    );
    println!(
        "Compression: {} with {} byte blocks",
        summary.compression, summary.compression_block_size
    );
    println!("Rows: {}", summary.number_of_rows);
    println!("Content length: {} bytes", summary.content_length);
    println!(
        "Tail size: {} bytes ({} of stripe statistics)",
        summary.tail_size, summary.metadata_size
    );
    println!("Row index stride: {}", summary.row_index_stride);
    println!("Schema: {}", summary.schema);
    println!("Stripes:");
    for (i, stripe) in summary.stripes.iter().enumerate() {
        println!(
            "  {i}: offset {} length {} rows {}",
            stripe.offset,
            stripe.total_length(),
            stripe.number_of_rows
        );
    }
    if !summary.user_metadata.is_empty() {
        println!("User metadata: {}", summary.user_metadata.join(", "));
    }
    println!("Raw data size: {} bytes", summary.raw_data_size);
    if let Some(size) = summary.columns_raw_data_size {
        println!("Raw data size of selected columns: {size} bytes");
    }
    if let Some(stats) = &summary.stripe_statistics {
        println!("Stripe statistics:");
        for (i, stripe) in stats.iter().enumerate() {
            let values = stripe
                .columns
                .iter()
                .map(|c| c.number_of_values.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {i}: values per column [{values}]");
        }
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let source = LocalFile::open(&args.path)
        .with_context(|| format!("Failed to open {}", args.path.display()))?;
    let mut options = ReaderOptions::new();
    if let Some(max_length) = args.max_length {
        options = options.with_max_length(max_length);
    }
    if let Some(initial_read_size) = args.initial_read_size {
        options = options.with_initial_read_size(initial_read_size);
    }
    let reader = Reader::open(Arc::new(source), options)
        .with_context(|| format!("Failed to read the ORC tail of {}", args.path.display()))?;
    info!(
        "Opened {} with {} stripes",
        args.path.display(),
        reader.stripes().len()
    );

    let summary = summarize(&args, &reader)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_text(&summary);
    }
    Ok(())
}
