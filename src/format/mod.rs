//! The dialect capability the row parser and schema reader are written against.
//!
//! A [`FormatReader`] knows how one concrete dialect spells delimiters, quotes
//! and headers. The generic state machine in [`crate::parser`] only ever calls
//! these primitives, so a new dialect plugs in without touching it.
//!
//! Structural primitives fail with [`FormatError::IncorrectData`]. Their
//! `*_with_diagnostic_info` counterparts never fail: they describe the problem
//! into a text sink and return `false`.

pub mod delimited;

use std::fmt::Write as _;

use crate::{
    buffer::ReadBuffer,
    column::Column,
    error::{FormatError, FormatResult},
    schema::ColumnType,
};

pub use delimited::{Delimiters, DelimitedReader, Dialect, FormatName};

pub trait FormatReader: Send {
    fn buffer(&self) -> &ReadBuffer;

    fn buffer_mut(&mut self) -> &mut ReadBuffer;

    /// Rebinds the byte source, returning the previous one.
    fn set_read_buffer(&mut self, buffer: ReadBuffer) -> ReadBuffer;

    /// Binary dialects never carry a textual byte-order mark.
    /// Rejects delimiter settings no row could be split with.
    fn check_delimiters(&self) -> FormatResult<()> {
        Ok(())
    }

    fn is_binary(&self) -> bool {
        false
    }

    fn skip_prefix_before_header(&mut self) -> FormatResult<()> {
        Ok(())
    }

    fn skip_row_start_delimiter(&mut self) -> FormatResult<()> {
        Ok(())
    }

    fn skip_field_delimiter(&mut self) -> FormatResult<()> {
        Ok(())
    }

    fn skip_row_end_delimiter(&mut self) -> FormatResult<()> {
        Ok(())
    }

    fn skip_row_between_delimiter(&mut self) -> FormatResult<()> {
        Ok(())
    }

    /// Reads the text of the next field, `None` when it spells NULL.
    fn read_field_text(&mut self, is_last_field: bool) -> FormatResult<Option<String>>;

    fn is_at_row_end(&self) -> bool;

    /// Reads one value into `column`. Returns `false` when the type default
    /// was inserted instead of a value from the input.
    fn read_field(
        &mut self,
        column: &mut Column,
        is_last_field: bool,
        field_name: &str,
    ) -> FormatResult<bool>;

    fn skip_field(&mut self, _index: usize) -> FormatResult<()> {
        self.read_field_text(false).map(|_| ())
    }

    /// Fails when the next value spells NULL and `ty` cannot hold it.
    fn check_null_value_for_non_nullable(&mut self, _ty: &ColumnType) -> FormatResult<()> {
        Ok(())
    }

    /// True when the bytes at `pos`, right after field `index`, do not start
    /// a delimiter.
    fn is_garbage_after_field(&self, _index: usize, _pos: usize) -> bool {
        false
    }

    /// True (and the suffix consumed) when the input holds no more rows.
    fn check_for_suffix(&mut self) -> FormatResult<bool> {
        Ok(self.buffer().eof())
    }

    fn read_header_row(&mut self) -> FormatResult<Vec<String>> {
        self.skip_row_start_delimiter()?;
        let mut values = Vec::new();
        if !self.is_at_row_end() {
            loop {
                let start = self.buffer().position();
                values.push(self.read_field_text(true)?.unwrap_or_default());
                if self.is_at_row_end() {
                    break;
                }
                self.skip_field_delimiter()?;
                ensure_progress(self.buffer(), start)?;
            }
        }
        self.skip_row_end_delimiter()?;
        Ok(values)
    }

    fn read_names(&mut self) -> FormatResult<Vec<String>> {
        self.read_header_row()
    }

    fn read_types(&mut self) -> FormatResult<Vec<String>> {
        self.read_header_row()
    }

    fn skip_names(&mut self) -> FormatResult<()> {
        self.read_header_row().map(|_| ())
    }

    fn skip_types(&mut self) -> FormatResult<()> {
        self.read_header_row().map(|_| ())
    }

    /// Reads one row as raw text for type sampling; `None` once no rows remain.
    /// Field count is taken from the row itself.
    fn read_row_for_schema_inference(
        &mut self,
        skip_between_delimiter: bool,
    ) -> FormatResult<Option<Vec<Option<String>>>> {
        if self.check_for_suffix()? {
            return Ok(None);
        }
        if skip_between_delimiter {
            self.skip_row_between_delimiter()?;
        }
        self.skip_row_start_delimiter()?;
        let mut fields = Vec::new();
        loop {
            let start = self.buffer().position();
            fields.push(self.read_field_text(true)?);
            if self.is_at_row_end() {
                break;
            }
            self.skip_field_delimiter()?;
            ensure_progress(self.buffer(), start)?;
        }
        self.skip_row_end_delimiter()?;
        Ok(Some(fields))
    }

    fn try_parse_suffix_with_diagnostic_info(&mut self, out: &mut String) -> bool {
        match self.check_for_suffix() {
            Ok(false) => true,
            Ok(true) => {
                let _ = writeln!(out, "<End of data: no more rows after this point>");
                false
            }
            Err(err) => {
                let _ = writeln!(out, "ERROR: {err}");
                false
            }
        }
    }

    fn parse_row_start_with_diagnostic_info(&mut self, out: &mut String) -> bool {
        let result = self.skip_row_start_delimiter();
        report_delimiter(self.buffer(), out, "row start delimiter", result)
    }

    fn parse_field_delimiter_with_diagnostic_info(&mut self, out: &mut String) -> bool {
        let result = self.skip_field_delimiter();
        report_delimiter(self.buffer(), out, "field delimiter", result)
    }

    fn parse_row_end_with_diagnostic_info(&mut self, out: &mut String) -> bool {
        let result = self.skip_row_end_delimiter();
        report_delimiter(self.buffer(), out, "row end delimiter", result)
    }

    fn parse_row_between_delimiter_with_diagnostic_info(&mut self, out: &mut String) -> bool {
        let result = self.skip_row_between_delimiter();
        report_delimiter(self.buffer(), out, "delimiter between rows", result)
    }
}

fn report_delimiter(
    buffer: &ReadBuffer,
    out: &mut String,
    what: &str,
    result: FormatResult<()>,
) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            let pos = buffer.position();
            let _ = writeln!(
                out,
                "ERROR: There is no {what} at byte offset {pos}, found \"{}\" instead ({err})",
                escape_for_diagnostics(&buffer.snippet(pos, 16))
            );
            false
        }
    }
}

/// Makes control characters visible in diagnostic output.
pub fn escape_for_diagnostics(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => escaped.push_str("<LINE FEED>"),
            '\r' => escaped.push_str("<CARRIAGE RETURN>"),
            '\t' => escaped.push_str("<TAB>"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Fails when a field and its delimiter were read without consuming input.
pub(crate) fn ensure_progress(buffer: &ReadBuffer, start: usize) -> FormatResult<()> {
    if buffer.position() > start {
        return Ok(());
    }
    Err(FormatError::incorrect(format!(
        "No input consumed by a field at byte offset {start}; the field delimiter may be empty"
    )))
}

pub(crate) fn unexpected(buffer: &ReadBuffer, expected: &str) -> FormatError {
    let pos = buffer.position();
    let found = if buffer.eof() {
        "<end of input>".to_string()
    } else {
        format!("\"{}\"", escape_for_diagnostics(&buffer.snippet(pos, 16)))
    };
    FormatError::incorrect(format!(
        "Expected {expected} at byte offset {pos}, found {found}"
    ))
}
