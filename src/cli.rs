use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::format::FormatName;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Parse delimited row formats into a fixed target schema",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Derive a schema from the headers or the first rows of an input
    Schema(SchemaArgs),
    /// Decode an input into a target schema and write it as CSV
    Parse(ParseArgs),
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Input file to inspect (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Input format, e.g. CSV, CSVWithNames, TSVWithNamesAndTypes, CustomSeparated
    #[arg(short = 'f', long = "format", value_parser = parse_format)]
    pub format: FormatName,
    /// YAML file with format settings
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Write the schema as YAML here instead of printing a table
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long)]
    pub sample_rows: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Input file to parse (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Input format, e.g. CSV, CSVWithNames, TSVWithNamesAndTypes, CustomSeparated
    #[arg(short = 'f', long = "format", value_parser = parse_format)]
    pub format: FormatName,
    /// Target schema YAML file
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,
    /// YAML file with format settings
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Parse units in parallel on this many threads (1 parses sequentially)
    #[arg(long, default_value_t = 1)]
    pub threads: usize,
    /// Minimum size of a parallel unit in bytes
    #[arg(long = "unit-bytes", default_value_t = 1 << 20)]
    pub unit_bytes: usize,
    /// Rows per block read from the parser
    #[arg(long = "block-rows", default_value_t = 65_536)]
    pub block_rows: usize,
}

pub fn parse_format(value: &str) -> Result<FormatName, String> {
    value.parse::<FormatName>().map_err(|err| err.to_string())
}

pub fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "tab" | "\t" => Ok('\t'),
        "comma" | "," => Ok(','),
        "|" | "pipe" => Ok('|'),
        ";" | "semicolon" => Ok(';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() || first == '"' || first == '\n' || first == '\r' {
                return Err(
                    "Delimiter must be an ASCII character other than a quote or newline"
                        .to_string(),
                );
            }
            Ok(first)
        }
    }
}
