pub mod buffer;
pub mod cli;
pub mod column;
pub mod data;
pub mod diagnostic;
pub mod error;
pub mod format;
pub mod inference;
pub mod input;
pub mod io_utils;
pub mod mapping;
pub mod parallel;
pub mod parser;
pub mod schema;
pub mod schema_reader;
pub mod settings;
pub mod table;

use std::{
    env,
    path::Path,
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    input::RowInputFormat,
    parser::RowParser,
    schema::Schema,
    schema_reader::SchemaReader,
    settings::FormatSettings,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("rowsplice", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

/// Code of the first [`error::FormatError`] in the context chain of `err`.
pub fn error_code(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<error::FormatError>())
        .map(error::FormatError::kind)
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Schema(args) => handle_schema(&args),
        Commands::Parse(args) => handle_parse(&args),
    }
}

fn load_settings(path: Option<&Path>, delimiter: Option<char>) -> Result<FormatSettings> {
    let mut settings = match path {
        Some(path) => FormatSettings::load(path)
            .with_context(|| format!("Loading settings from {path:?}"))?,
        None => FormatSettings::default(),
    };
    if let Some(delimiter) = delimiter {
        settings.csv_delimiter = delimiter;
    }
    debug!("Format settings: {settings:?}");
    Ok(settings)
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<()> {
    info!(
        "Reading schema of '{}' as {}",
        args.input.display(),
        args.format
    );
    let mut settings = load_settings(args.settings.as_deref(), args.delimiter)?;
    if let Some(rows) = args.sample_rows {
        settings.max_rows_to_read_for_schema_inference = rows;
    }
    let buffer = io_utils::read_input(&args.input)?;
    let schema = SchemaReader::for_format(args.format, buffer, settings)
        .read_target_schema()
        .with_context(|| format!("Reading schema from {:?}", args.input))?;

    match &args.output {
        Some(path) => {
            schema
                .save(path)
                .with_context(|| format!("Writing schema to {path:?}"))?;
            info!(
                "Schema for {} column(s) written to {:?}",
                schema.len(),
                path
            );
        }
        None => table::print_schema(&schema),
    }
    Ok(())
}

fn handle_parse(args: &cli::ParseArgs) -> Result<()> {
    info!(
        "Parsing '{}' as {} into schema {:?}",
        args.input.display(),
        args.format,
        args.schema
    );
    let settings = load_settings(args.settings.as_deref(), args.delimiter)?;
    let schema = Arc::new(
        Schema::load(&args.schema)
            .with_context(|| format!("Loading schema from {:?}", args.schema))?,
    );
    let buffer = io_utils::read_input(&args.input)?;

    let block = if args.threads > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build()
            .context("Building parser thread pool")?;
        pool.install(|| {
            parallel::read_parallel(
                buffer.into_inner(),
                Arc::clone(&schema),
                args.format,
                &settings,
                args.unit_bytes,
                args.block_rows,
            )
        })
    } else {
        let parser = RowParser::for_format(Arc::clone(&schema), args.format, buffer, settings);
        RowInputFormat::new(parser).read_all(args.block_rows)
    }
    .with_context(|| format!("Parsing {:?} as {}", args.input, args.format))?;

    let mut writer = io_utils::open_csv_writer(args.output.as_deref())?;
    io_utils::write_block(&mut writer, &schema, &block)?;
    info!(
        "Parsed {} row(s) into {} column(s)",
        block.num_rows(),
        schema.len()
    );
    Ok(())
}
