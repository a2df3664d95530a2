//! Input loading and CSV output for the command-line surface.
//!
//! The `-` path convention routes through standard streams in both
//! directions.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use csv::QuoteStyle;

use crate::{buffer::ReadBuffer, input::Block, schema::Schema};

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn read_input(path: &Path) -> Result<ReadBuffer> {
    if is_dash(path) {
        return ReadBuffer::from_reader(io::stdin().lock()).context("Reading input from stdin");
    }
    ReadBuffer::from_path(path).with_context(|| format!("Reading input file {path:?}"))
}

pub fn open_csv_writer(path: Option<&Path>) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(b',')
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

/// Writes `block` as CSV with a header row in target-schema order. NULL
/// values are written as empty fields.
pub fn write_block<W: Write>(
    writer: &mut csv::Writer<W>,
    schema: &Schema,
    block: &Block,
) -> Result<()> {
    writer
        .write_record(schema.columns.iter().map(|column| column.name.as_str()))
        .context("Writing output header")?;
    for row in 0..block.num_rows() {
        let record = block.columns.iter().map(|column| {
            column
                .get(row)
                .map(|value| value.as_display())
                .unwrap_or_default()
        });
        writer
            .write_record(record)
            .with_context(|| format!("Writing output row {}", row + 1))?;
    }
    writer.flush().context("Flushing output")
}
