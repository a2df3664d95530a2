//! Diagnostic re-parse of a single row.
//!
//! After [`RowParser::read_row`] fails, the caller rewinds the byte source to
//! the start of the failing row and calls
//! [`RowParser::parse_row_and_print_diagnostic_info`]. It walks the same
//! grammar field by field and writes one line per field into a text sink. It
//! never returns an error; `false` means the walk stopped at a problem (or at
//! the end of the data).

use std::fmt::Write as _;

use crate::{
    column::Column,
    error::FormatResult,
    format::escape_for_diagnostics,
    parser::RowParser,
    schema::ColumnType,
};

const SKIPPED_COLUMN_NAME: &str = "<SKIPPED COLUMN>";
const SNIPPET_LEN: usize = 32;

impl RowParser {
    /// Describes the row at the current position. `row_num` must still hold
    /// the number of the row being described.
    pub fn parse_row_and_print_diagnostic_info(
        &mut self,
        columns: &mut [Column],
        out: &mut String,
    ) -> bool {
        if self.reader.buffer().eof() {
            let _ = writeln!(out, "<End of stream>");
            return false;
        }
        if !self.reader.try_parse_suffix_with_diagnostic_info(out) {
            return false;
        }
        if self.needs_row_between_delimiter()
            && !self
                .reader
                .parse_row_between_delimiter_with_diagnostic_info(out)
        {
            return false;
        }
        if !self.reader.parse_row_start_with_diagnostic_info(out) {
            return false;
        }

        let name_width = self
            .column_mapping
            .column_indexes_for_input_fields
            .iter()
            .map(|index| match index {
                Some(index) => self.header.columns[*index].name.len(),
                None => SKIPPED_COLUMN_NAME.len(),
            })
            .max()
            .unwrap_or_default();

        let field_count = self.column_mapping.input_column_count();
        for file_column in 0..field_count {
            let target = self.column_mapping.column_indexes_for_input_fields[file_column];
            let described = match target {
                Some(index) => {
                    let name = self.header.columns[index].name.clone();
                    let ty = self.data_types[index].clone();
                    self.deserialize_field_and_print_diagnostic_info(
                        &name,
                        &ty,
                        &mut columns[index],
                        out,
                        file_column,
                        name_width,
                    )
                }
                None => {
                    let mut skipped = Column::new(ColumnType::Nothing);
                    self.deserialize_field_and_print_diagnostic_info(
                        SKIPPED_COLUMN_NAME,
                        &ColumnType::Nothing,
                        &mut skipped,
                        out,
                        file_column,
                        name_width,
                    )
                }
            };
            if !described {
                return false;
            }

            if file_column + 1 != field_count
                && !self.reader.parse_field_delimiter_with_diagnostic_info(out)
            {
                return false;
            }
        }

        self.reader.parse_row_end_with_diagnostic_info(out)
    }

    fn deserialize_field_and_print_diagnostic_info(
        &mut self,
        name: &str,
        ty: &ColumnType,
        column: &mut Column,
        out: &mut String,
        file_column: usize,
        name_width: usize,
    ) -> bool {
        let start = self.reader.buffer().position();
        let _ = write!(
            out,
            "Column {file_column}, name: {name:<name_width$}, type: {:<20}, ",
            ty.name()
        );

        let result = self.try_deserialize_field(ty, column, file_column);
        let end = self.reader.buffer().position();
        let parsed = self.reader.buffer().snippet(start, end - start);

        match result {
            Ok(()) => {
                let _ = writeln!(out, "parsed text: \"{}\"", escape_for_diagnostics(&parsed));
                if self.reader.is_garbage_after_field(file_column, end) {
                    let _ = writeln!(
                        out,
                        "ERROR: garbage after {ty} at byte offset {end}: \"{}\"",
                        escape_for_diagnostics(&self.reader.buffer().snippet(end, SNIPPET_LEN))
                    );
                    return false;
                }
                true
            }
            Err(err) => {
                if end == start {
                    let _ = writeln!(
                        out,
                        "ERROR: text \"{}\" at byte offset {start} is not like {ty}",
                        escape_for_diagnostics(&self.reader.buffer().snippet(start, SNIPPET_LEN))
                    );
                } else {
                    let _ = writeln!(out, "parsed text: \"{}\"", escape_for_diagnostics(&parsed));
                }
                let _ = writeln!(out, "ERROR: {err}");
                false
            }
        }
    }

    fn try_deserialize_field(
        &mut self,
        ty: &ColumnType,
        column: &mut Column,
        file_column: usize,
    ) -> FormatResult<()> {
        let mapping = &self.column_mapping;
        if mapping.column_indexes_for_input_fields[file_column].is_some() {
            self.reader.check_null_value_for_non_nullable(ty)?;
            let is_last_file_column = file_column + 1 == mapping.input_column_count();
            self.reader.read_field(
                column,
                is_last_file_column,
                &mapping.names_of_columns[file_column],
            )?;
        } else {
            self.reader.skip_field(file_column)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        buffer::ReadBuffer,
        parser::{RowParser, RowReadExtension},
        schema::{ColumnType, Schema},
        settings::FormatSettings,
    };

    fn parser(format: &str, input: &str, settings: FormatSettings) -> RowParser {
        let schema = Schema::from_pairs([("id", ColumnType::Integer), ("name", ColumnType::String)]);
        RowParser::for_format(
            Arc::new(schema),
            format.parse().unwrap(),
            ReadBuffer::new(input),
            settings,
        )
    }

    #[test]
    fn describes_every_field_of_a_good_row() {
        let mut parser = parser("CSV", "7,Ann\n", FormatSettings::default());
        parser.read_prefix().unwrap();
        parser.row_num = 1;
        let mut columns = parser.create_columns();
        let mut out = String::new();
        assert!(parser.parse_row_and_print_diagnostic_info(&mut columns, &mut out));
        assert!(out.contains("Column 0, name: id"), "{out}");
        assert!(out.contains("parsed text: \"7\""), "{out}");
        assert!(out.contains("parsed text: \"Ann\""), "{out}");
        assert!(!out.contains("ERROR"), "{out}");
    }

    #[test]
    fn reports_failing_field_without_erroring() {
        let mut parser = parser("CSV", "x7,Ann\n", FormatSettings::default());
        let mut columns = parser.create_columns();
        let mut ext = RowReadExtension::default();
        assert!(parser.read_row(&mut columns, &mut ext).is_err());

        parser.reader_mut().buffer_mut().seek(0);
        let mut scratch = parser.create_columns();
        let mut out = String::new();
        assert!(!parser.parse_row_and_print_diagnostic_info(&mut scratch, &mut out));
        assert!(out.contains("type: Integer"), "{out}");
        assert!(out.contains("ERROR: Incorrect data: Cannot parse value of column 'id'"), "{out}");
        assert!(!out.contains("name: name"), "{out}");
    }

    #[test]
    fn walks_skipped_columns_with_placeholder() {
        let settings = FormatSettings {
            skip_unknown_fields: true,
            ..FormatSettings::default()
        };
        let mut parser = parser("CSVWithNames", "id,extra,name\n1,zz,Ann\n", settings);
        parser.read_prefix().unwrap();
        parser.row_num = 1;
        let mut columns = parser.create_columns();
        let mut out = String::new();
        assert!(parser.parse_row_and_print_diagnostic_info(&mut columns, &mut out));
        assert!(out.contains("Column 1, name: <SKIPPED COLUMN>, type: Nothing"), "{out}");
        assert!(out.contains("parsed text: \"zz\""), "{out}");
    }

    #[test]
    fn reports_garbage_after_quoted_value() {
        let mut parser = parser("CSV", "1,\"Ann\"x\n", FormatSettings::default());
        parser.read_prefix().unwrap();
        parser.row_num = 1;
        let mut columns = parser.create_columns();
        let mut out = String::new();
        assert!(!parser.parse_row_and_print_diagnostic_info(&mut columns, &mut out));
        assert!(out.contains("ERROR: garbage after String at byte offset 7"), "{out}");
    }

    #[test]
    fn reports_missing_delimiter() {
        let mut parser = parser("TSV", "1,Ann\n", FormatSettings::default());
        parser.read_prefix().unwrap();
        parser.row_num = 1;
        let mut columns = parser.create_columns();
        let mut out = String::new();
        assert!(!parser.parse_row_and_print_diagnostic_info(&mut columns, &mut out));
        assert!(out.contains("ERROR"), "{out}");
    }

    #[test]
    fn end_of_stream_is_reported() {
        let mut parser = parser("CSV", "", FormatSettings::default());
        let mut columns = parser.create_columns();
        let mut out = String::new();
        assert!(!parser.parse_row_and_print_diagnostic_info(&mut columns, &mut out));
        assert_eq!(out, "<End of stream>\n");
    }
}
