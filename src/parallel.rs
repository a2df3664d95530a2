//! Parallel parsing of one stream split into units.
//!
//! The data is cut at row boundaries into byte ranges. Unit 0 covers the
//! prefix (byte-order mark and headers) plus the first rows; it reads its
//! prefix before any other unit starts, and the resulting column mapping is
//! cloned into every other unit. Units then parse independently on the rayon
//! pool and their blocks are concatenated in unit order.

use std::{ops::Range, sync::Arc};

use log::debug;
use rayon::prelude::*;

use crate::{
    buffer::ReadBuffer,
    column::columns_for,
    error::FormatResult,
    format::{Delimiters, FormatName},
    input::{Block, RowInputFormat},
    parser::RowParser,
    schema::Schema,
    settings::{EscapingRule, FormatSettings},
};

/// Splits `data` into ranges of at least `min_unit_bytes` (except the last),
/// each ending right after a newline that is not inside a quoted or escaped
/// value. A quote opens a quoted value only at the start of a field, as the
/// CSV reader treats it.
pub fn segment_units(
    data: &[u8],
    min_unit_bytes: usize,
    delimiters: &Delimiters,
) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut idx = 0;
    while idx < data.len() {
        let byte = data[idx];
        if in_quotes {
            if byte == b'"' {
                if data.get(idx + 1) == Some(&b'"') {
                    idx += 1;
                } else {
                    in_quotes = false;
                }
            }
            idx += 1;
            continue;
        }

        if byte == b'\n' {
            if idx + 1 - start >= min_unit_bytes {
                units.push(start..idx + 1);
                start = idx + 1;
            }
            at_field_start = true;
            idx += 1;
        } else if !delimiters.field.is_empty() && data[idx..].starts_with(&delimiters.field) {
            at_field_start = true;
            idx += delimiters.field.len();
        } else if at_field_start
            && !delimiters.row_before.is_empty()
            && data[idx..].starts_with(&delimiters.row_before)
        {
            idx += delimiters.row_before.len();
        } else {
            match (delimiters.escaping, byte) {
                (EscapingRule::Csv, b'"') if at_field_start => in_quotes = true,
                (EscapingRule::Escaped, b'\\') => idx += 1,
                _ => {}
            }
            at_field_start = false;
            idx += 1;
        }
    }
    if start < data.len() || units.is_empty() {
        units.push(start..data.len());
    }
    units
}

/// Parses `data` with one parser per unit and returns all rows in input order.
pub fn read_parallel(
    data: Vec<u8>,
    schema: Arc<Schema>,
    format: FormatName,
    settings: &FormatSettings,
    min_unit_bytes: usize,
    block_rows: usize,
) -> FormatResult<Block> {
    let mut first = RowParser::for_format(
        Arc::clone(&schema),
        format,
        ReadBuffer::new(data),
        settings.clone(),
    );
    first.read_prefix()?;
    let mapping = first.column_mapping().clone();
    let prefix_end = first.reader().buffer().position();
    let data = first.set_read_buffer(ReadBuffer::new(Vec::new())).into_inner();

    let delimiters = Delimiters::for_dialect(format.dialect, settings);
    let mut ranges: Vec<Range<usize>> =
        segment_units(&data[prefix_end..], min_unit_bytes, &delimiters)
            .into_iter()
            .map(|range| range.start + prefix_end..range.end + prefix_end)
            .collect();
    ranges[0].start = 0;
    debug!(
        "Split {} byte(s) into {} unit(s), prefix ends at byte {prefix_end}",
        data.len(),
        ranges.len()
    );

    let mut ranges = ranges.into_iter();
    let mut units = Vec::with_capacity(ranges.len());
    if let Some(range) = ranges.next() {
        let mut buffer = ReadBuffer::new(data[range].to_vec());
        buffer.seek(prefix_end);
        first.set_read_buffer(buffer);
    }
    units.push(RowInputFormat::new(first));
    for (offset, range) in ranges.enumerate() {
        let parser = RowParser::for_format(
            Arc::clone(&schema),
            format,
            ReadBuffer::new(data[range].to_vec()),
            settings.clone(),
        )
        .with_unit_number(offset + 1)
        .with_column_mapping(mapping.clone());
        units.push(RowInputFormat::new(parser));
    }

    let blocks: Vec<FormatResult<Block>> = units
        .into_par_iter()
        .enumerate()
        .map(|(unit_number, mut unit)| {
            unit.read_all(block_rows)
                .map_err(|err| err.map_message(|message| format!("In unit {unit_number}: {message}")))
        })
        .collect();

    let mut result = Block::empty(columns_for(&schema.data_types()));
    for block in blocks {
        result.append(block?);
    }
    Ok(result)
}
