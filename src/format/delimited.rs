//! Delimited text dialects: CSV, TSV and custom separated.
//!
//! All three share one reader parametrised by a [`Delimiters`] set and an
//! [`EscapingRule`]. CSV and TSV are fixed delimiter sets; custom separated
//! takes all six delimiters from [`FormatSettings::custom`].

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};

use crate::{
    buffer::ReadBuffer,
    column::Column,
    data::parse_typed_value,
    error::{FormatError, FormatResult},
    format::{FormatReader, unexpected},
    schema::ColumnType,
    settings::{EscapingRule, FormatSettings},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Csv,
    Tsv,
    CustomSeparated,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Csv => "CSV",
            Dialect::Tsv => "TSV",
            Dialect::CustomSeparated => "CustomSeparated",
        }
    }
}

/// A dialect plus which headers precede the rows, e.g. `CSVWithNamesAndTypes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatName {
    pub dialect: Dialect,
    pub with_names: bool,
    pub with_types: bool,
}

impl FormatName {
    pub fn new(dialect: Dialect, with_names: bool, with_types: bool) -> Self {
        Self {
            dialect,
            with_names,
            with_types,
        }
    }

    pub fn create_reader(
        &self,
        buffer: ReadBuffer,
        settings: &FormatSettings,
    ) -> Box<dyn FormatReader> {
        let delimiters = Delimiters::for_dialect(self.dialect, settings);
        Box::new(DelimitedReader::new(buffer, delimiters, settings))
    }
}

impl fmt::Display for FormatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match (self.with_names, self.with_types) {
            (true, true) => "WithNamesAndTypes",
            (true, false) => "WithNames",
            (false, true) => "WithTypes",
            (false, false) => "",
        };
        write!(f, "{}{}", self.dialect.as_str(), suffix)
    }
}

impl FromStr for FormatName {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        let (base, with_names, with_types) =
            if let Some(base) = normalized.strip_suffix("withnamesandtypes") {
                (base, true, true)
            } else if let Some(base) = normalized.strip_suffix("withnames") {
                (base, true, false)
            } else if let Some(base) = normalized.strip_suffix("withtypes") {
                (base, false, true)
            } else {
                (normalized.as_str(), false, false)
            };
        let dialect = match base {
            "csv" => Dialect::Csv,
            "tsv" | "tabseparated" => Dialect::Tsv,
            "customseparated" => Dialect::CustomSeparated,
            _ => {
                return Err(anyhow!(
                    "Unknown format '{value}'. Supported: CSV, TSV, CustomSeparated, each optionally suffixed with WithNames or WithNamesAndTypes"
                ));
            }
        };
        Ok(FormatName::new(dialect, with_names, with_types))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub result_before: Vec<u8>,
    pub row_before: Vec<u8>,
    pub field: Vec<u8>,
    pub row_after: Vec<u8>,
    pub row_between: Vec<u8>,
    pub result_after: Vec<u8>,
    pub escaping: EscapingRule,
}

impl Delimiters {
    pub fn for_dialect(dialect: Dialect, settings: &FormatSettings) -> Self {
        match dialect {
            Dialect::Csv => Self::simple(
                settings.csv_delimiter.to_string().into_bytes(),
                EscapingRule::Csv,
            ),
            Dialect::Tsv => Self::simple(b"\t".to_vec(), EscapingRule::Escaped),
            Dialect::CustomSeparated => {
                let custom = &settings.custom;
                Self {
                    result_before: custom.result_before.clone().into_bytes(),
                    row_before: custom.row_before.clone().into_bytes(),
                    field: custom.field.clone().into_bytes(),
                    row_after: custom.row_after.clone().into_bytes(),
                    row_between: custom.row_between.clone().into_bytes(),
                    result_after: custom.result_after.clone().into_bytes(),
                    escaping: custom.escaping_rule,
                }
            }
        }
    }

    fn simple(field: Vec<u8>, escaping: EscapingRule) -> Self {
        Self {
            result_before: Vec::new(),
            row_before: Vec::new(),
            field,
            row_after: b"\n".to_vec(),
            row_between: Vec::new(),
            result_after: Vec::new(),
            escaping,
        }
    }

    /// Fails when fields could not be told apart with these delimiters.
    pub fn validate(&self) -> FormatResult<()> {
        if self.field.is_empty() {
            return Err(FormatError::incorrect("Field delimiter must not be empty"));
        }
        if self.escaping == EscapingRule::Csv && self.field.first() == Some(&b'"') {
            return Err(FormatError::incorrect(
                "Field delimiter must not start with a quote when values use CSV quoting",
            ));
        }
        Ok(())
    }

    fn row_ends_with_newline(&self) -> bool {
        self.row_after.first() == Some(&b'\n')
    }
}

struct RawField {
    text: Vec<u8>,
    /// Bytes as they appeared on the wire, before unescaping.
    wire: Vec<u8>,
    quoted: bool,
}

pub struct DelimitedReader {
    buffer: ReadBuffer,
    delimiters: Delimiters,
    null_representation: Vec<u8>,
    null_as_default: bool,
    empty_as_default: bool,
}

impl DelimitedReader {
    pub fn new(buffer: ReadBuffer, delimiters: Delimiters, settings: &FormatSettings) -> Self {
        Self {
            buffer,
            delimiters,
            null_representation: settings.null_representation.clone().into_bytes(),
            null_as_default: settings.null_as_default,
            empty_as_default: settings.empty_as_default,
        }
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    fn is_row_end_at(&self, pos: usize) -> bool {
        let d = &self.delimiters;
        if self.buffer.byte_at(pos).is_none() {
            return true;
        }
        if !d.row_after.is_empty() {
            return self.buffer.starts_with_at(pos, &d.row_after)
                || (d.row_ends_with_newline() && self.buffer.starts_with_at(pos, b"\r\n"));
        }
        (!d.row_between.is_empty() && self.buffer.starts_with_at(pos, &d.row_between))
            || (!d.result_after.is_empty() && self.buffer.starts_with_at(pos, &d.result_after))
    }

    fn at_value_end(&self, is_last_field: bool) -> bool {
        let pos = self.buffer.position();
        match self.buffer.peek() {
            None => true,
            Some(b'\n') => true,
            Some(b'\r') if is_last_field => self.is_row_end_at(pos),
            Some(_) => {
                self.buffer.starts_with(&self.delimiters.field)
                    || (!self.delimiters.row_after.is_empty()
                        && self.buffer.starts_with(&self.delimiters.row_after))
            }
        }
    }

    fn read_raw(&mut self, is_last_field: bool) -> FormatResult<RawField> {
        match self.delimiters.escaping {
            EscapingRule::Csv => self.read_csv_value(is_last_field),
            EscapingRule::Escaped => self.read_escaped_value(is_last_field),
        }
    }

    fn read_csv_value(&mut self, is_last_field: bool) -> FormatResult<RawField> {
        if self.buffer.peek() != Some(b'"') {
            let mut text = Vec::new();
            while !self.at_value_end(is_last_field) {
                if let Some(byte) = self.buffer.next_byte() {
                    text.push(byte);
                }
            }
            return Ok(RawField {
                wire: text.clone(),
                text,
                quoted: false,
            });
        }

        let start = self.buffer.position();
        self.buffer.advance(1);
        let mut text = Vec::new();
        loop {
            match self.buffer.next_byte() {
                None => {
                    return Err(FormatError::incorrect(format!(
                        "Quoted value starting at byte offset {start} is not closed"
                    )));
                }
                Some(b'"') if self.buffer.peek() == Some(b'"') => {
                    self.buffer.advance(1);
                    text.push(b'"');
                }
                Some(b'"') => break,
                Some(byte) => text.push(byte),
            }
        }
        Ok(RawField {
            wire: Vec::new(),
            text,
            quoted: true,
        })
    }

    fn read_escaped_value(&mut self, is_last_field: bool) -> FormatResult<RawField> {
        let mut text = Vec::new();
        let mut wire = Vec::new();
        while !self.at_value_end(is_last_field) {
            let Some(byte) = self.buffer.next_byte() else {
                break;
            };
            wire.push(byte);
            if byte != b'\\' {
                text.push(byte);
                continue;
            }
            let Some(escaped) = self.buffer.next_byte() else {
                return Err(unexpected(&self.buffer, "an escaped character after '\\'"));
            };
            wire.push(escaped);
            text.push(match escaped {
                b't' => b'\t',
                b'n' => b'\n',
                b'r' => b'\r',
                b'0' => b'\0',
                other => other,
            });
        }
        Ok(RawField {
            text,
            wire,
            quoted: false,
        })
    }

    fn is_null(&self, raw: &RawField) -> bool {
        !raw.quoted && !self.null_representation.is_empty() && raw.wire == self.null_representation
    }

    fn decode(&self, bytes: Vec<u8>, start: usize) -> FormatResult<String> {
        String::from_utf8(bytes).map_err(|err| {
            FormatError::incorrect(format!(
                "Invalid UTF-8 in value at byte offset {}",
                start + err.utf8_error().valid_up_to()
            ))
        })
    }

    fn expect_token(&mut self, token: &[u8], what: &str) -> FormatResult<()> {
        if token.is_empty() || self.buffer.check_token(token) {
            return Ok(());
        }
        Err(unexpected(
            &self.buffer,
            &format!("{what} \"{}\"", String::from_utf8_lossy(token)),
        ))
    }
}

impl FormatReader for DelimitedReader {
    fn buffer(&self) -> &ReadBuffer {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut ReadBuffer {
        &mut self.buffer
    }

    fn set_read_buffer(&mut self, buffer: ReadBuffer) -> ReadBuffer {
        std::mem::replace(&mut self.buffer, buffer)
    }

    fn check_delimiters(&self) -> FormatResult<()> {
        self.delimiters.validate()
    }

    fn skip_prefix_before_header(&mut self) -> FormatResult<()> {
        let token = self.delimiters.result_before.clone();
        self.expect_token(&token, "data prefix")
    }

    fn skip_row_start_delimiter(&mut self) -> FormatResult<()> {
        let token = self.delimiters.row_before.clone();
        self.expect_token(&token, "row start delimiter")
    }

    fn skip_field_delimiter(&mut self) -> FormatResult<()> {
        let token = self.delimiters.field.clone();
        self.expect_token(&token, "field delimiter")
    }

    fn skip_row_end_delimiter(&mut self) -> FormatResult<()> {
        if self.delimiters.row_ends_with_newline() {
            if self.buffer.eof() {
                return Ok(());
            }
            if self.buffer.starts_with(b"\r\n") {
                self.buffer.advance(1);
            }
        }
        let token = self.delimiters.row_after.clone();
        self.expect_token(&token, "row end delimiter")
    }

    fn skip_row_between_delimiter(&mut self) -> FormatResult<()> {
        let token = self.delimiters.row_between.clone();
        self.expect_token(&token, "delimiter between rows")
    }

    fn read_field_text(&mut self, is_last_field: bool) -> FormatResult<Option<String>> {
        let start = self.buffer.position();
        let raw = self.read_raw(is_last_field)?;
        if self.is_null(&raw) {
            return Ok(None);
        }
        self.decode(raw.text, start).map(Some)
    }

    fn is_at_row_end(&self) -> bool {
        self.is_row_end_at(self.buffer.position())
    }

    fn read_field(
        &mut self,
        column: &mut Column,
        is_last_field: bool,
        field_name: &str,
    ) -> FormatResult<bool> {
        let start = self.buffer.position();
        let raw = self.read_raw(is_last_field)?;
        let ty = column.datatype().clone();

        if self.is_null(&raw) {
            if ty.is_nullable() {
                column.push_null();
                return Ok(true);
            }
            if self.null_as_default {
                column.insert_default();
                return Ok(false);
            }
            return Err(FormatError::null_in_non_nullable(&ty.name()));
        }
        if !raw.quoted && raw.text.is_empty() && self.empty_as_default {
            column.insert_default();
            return Ok(false);
        }

        let text = self.decode(raw.text, start)?;
        let value = parse_typed_value(&text, &ty).map_err(|err| {
            FormatError::incorrect(format!(
                "Cannot parse value of column '{field_name}' as {ty} at byte offset {start}: {err:#}"
            ))
        })?;
        column.push(value);
        Ok(true)
    }

    fn skip_field(&mut self, _index: usize) -> FormatResult<()> {
        self.read_raw(false).map(|_| ())
    }

    fn check_null_value_for_non_nullable(&mut self, ty: &ColumnType) -> FormatResult<()> {
        if ty.is_nullable() || self.null_as_default {
            return Ok(());
        }
        let start = self.buffer.position();
        let raw = self.read_raw(false);
        self.buffer.seek(start);
        match raw {
            Ok(raw) if self.is_null(&raw) => Err(FormatError::null_in_non_nullable(&ty.name())),
            _ => Ok(()),
        }
    }

    fn is_garbage_after_field(&self, _index: usize, pos: usize) -> bool {
        !(self.is_row_end_at(pos) || self.buffer.starts_with_at(pos, &self.delimiters.field))
    }

    fn check_for_suffix(&mut self) -> FormatResult<bool> {
        let start = self.buffer.position();
        if !self.delimiters.result_after.is_empty() {
            self.buffer.skip_whitespace();
            let token = self.delimiters.result_after.clone();
            if self.buffer.check_token(&token) {
                self.buffer.skip_whitespace();
                if self.buffer.eof() {
                    return Ok(true);
                }
            }
            self.buffer.seek(start);
        }
        while matches!(self.buffer.peek(), Some(b'\r' | b'\n')) {
            self.buffer.advance(1);
        }
        if self.buffer.eof() {
            return Ok(true);
        }
        self.buffer.seek(start);
        Ok(false)
    }
}
