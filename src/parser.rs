//! Row parser for formats with optional name and type headers.
//!
//! [`RowParser`] drives a [`FormatReader`] through the prefix phase (byte-order
//! mark, dialect preamble, name and type headers) and then one row per
//! [`RowParser::read_row`] call, routing each input field to its target column
//! through a [`ColumnMapping`].
//!
//! Several parsers may run over disjoint units of one stream. Only unit 0 owns
//! the real beginning of the data; every other unit starts at a row boundary
//! and maps columns by the target schema (or by a mapping handed over from
//! unit 0), never by re-reading a header.

use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    buffer::ReadBuffer,
    column::Column,
    error::{FormatError, FormatResult},
    format::{FormatName, FormatReader},
    mapping::ColumnMapping,
    schema::{ColumnType, Schema},
    settings::FormatSettings,
};

/// Per-row record of which target columns were read from the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowReadExtension {
    pub read_columns: Vec<bool>,
}

pub struct RowParser {
    pub(crate) reader: Box<dyn FormatReader>,
    pub(crate) header: Arc<Schema>,
    pub(crate) data_types: Vec<ColumnType>,
    column_indexes_by_names: HashMap<String, usize>,
    pub(crate) settings: FormatSettings,
    with_names: bool,
    with_types: bool,
    pub(crate) column_mapping: ColumnMapping,
    inherited_mapping: Option<ColumnMapping>,
    unit_number: usize,
    pub(crate) row_num: usize,
    end_of_stream: bool,
    prefix_read: bool,
    prefix_failed: bool,
}

impl RowParser {
    pub fn new(
        header: Arc<Schema>,
        reader: Box<dyn FormatReader>,
        with_names: bool,
        with_types: bool,
        settings: FormatSettings,
    ) -> Self {
        let data_types = header.data_types();
        let column_indexes_by_names = header.names_to_indexes();
        Self {
            reader,
            header,
            data_types,
            column_indexes_by_names,
            settings,
            with_names,
            with_types,
            column_mapping: ColumnMapping::new(),
            inherited_mapping: None,
            unit_number: 0,
            row_num: 0,
            end_of_stream: false,
            prefix_read: false,
            prefix_failed: false,
        }
    }

    /// Builds the dialect reader for `format` over `buffer`.
    pub fn for_format(
        header: Arc<Schema>,
        format: FormatName,
        buffer: ReadBuffer,
        settings: FormatSettings,
    ) -> Self {
        let reader = format.create_reader(buffer, &settings);
        Self::new(header, reader, format.with_names, format.with_types, settings)
    }

    pub fn with_unit_number(mut self, unit_number: usize) -> Self {
        self.unit_number = unit_number;
        self
    }

    /// Mapping to use instead of the identity mapping when this parser does
    /// not own the start of the stream.
    ///
    /// Units other than 0 otherwise map input columns 1:1 onto the target
    /// schema. A mapping handed over from unit 0 replaces that fallback, so
    /// every unit of a stream with a reordered name header routes fields the
    /// same way unit 0 does.
    pub fn with_column_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.inherited_mapping = Some(mapping);
        self
    }

    pub fn unit_number(&self) -> usize {
        self.unit_number
    }

    pub fn row_num(&self) -> usize {
        self.row_num
    }

    pub fn header(&self) -> &Schema {
        &self.header
    }

    pub fn column_mapping(&self) -> &ColumnMapping {
        &self.column_mapping
    }

    pub fn reader(&self) -> &dyn FormatReader {
        self.reader.as_ref()
    }

    pub fn reader_mut(&mut self) -> &mut dyn FormatReader {
        self.reader.as_mut()
    }

    pub fn create_columns(&self) -> Vec<Column> {
        crate::column::columns_for(&self.data_types)
    }

    /// Runs the header phase once; later calls are no-ops until a reset.
    /// After a failed header every call fails until [`RowParser::reset_parser`].
    pub fn read_prefix(&mut self) -> FormatResult<()> {
        if self.prefix_read {
            return Ok(());
        }
        if self.prefix_failed {
            return Err(FormatError::incorrect(
                "Cannot read rows after the header of this unit failed to parse",
            ));
        }
        match self.read_prefix_once() {
            Ok(()) => {
                self.prefix_read = true;
                Ok(())
            }
            Err(err) => {
                self.prefix_failed = true;
                self.column_mapping.reset();
                Err(err)
            }
        }
    }

    fn read_prefix_once(&mut self) -> FormatResult<()> {
        self.reader.check_delimiters()?;

        if self.unit_number != 0 {
            if !self.column_mapping.is_set {
                match &self.inherited_mapping {
                    Some(mapping) => self.column_mapping = mapping.clone(),
                    None => self.column_mapping.setup_by_header(&self.header),
                }
            }
            return Ok(());
        }

        // A name or type can never begin with a BOM, and neither can a value
        // of a type whose text is always valid UTF-8.
        let first_type_is_utf8_only = self
            .data_types
            .first()
            .is_some_and(ColumnType::text_can_contain_only_valid_utf8);
        if !self.reader.is_binary()
            && (self.with_names || self.with_types || first_type_is_utf8_only)
            && self.reader.buffer_mut().skip_bom_if_exists()
        {
            debug!("Skipped byte-order mark at start of unit 0");
        }

        self.reader.skip_prefix_before_header()?;

        if self.with_names {
            if self.settings.with_names_use_header {
                let column_names = self.reader.read_names()?;
                debug!("Read name header: {column_names:?}");
                self.column_mapping.add_columns(
                    &column_names,
                    &self.column_indexes_by_names,
                    self.data_types.len(),
                    &self.settings,
                )?;
            } else {
                self.column_mapping.setup_by_header(&self.header);
                self.reader.skip_names()?;
            }
        } else if !self.column_mapping.is_set {
            self.column_mapping.setup_by_header(&self.header);
        }

        if self.with_types {
            self.reader.skip_row_between_delimiter()?;
            if self.settings.with_types_use_header {
                let types = self.reader.read_types()?;
                self.check_declared_types(&types)?;
            } else {
                self.reader.skip_types()?;
            }
        }
        Ok(())
    }

    fn check_declared_types(&self, types: &[String]) -> FormatResult<()> {
        let indexes = &self.column_mapping.column_indexes_for_input_fields;
        if types.len() != indexes.len() {
            return Err(FormatError::incorrect(format!(
                "The number of data types ({}) differs from the number of column names in input data ({})",
                types.len(),
                indexes.len()
            )));
        }
        for (declared, index) in types.iter().zip(indexes) {
            let Some(index) = *index else {
                continue;
            };
            let expected = self.data_types[index].name();
            if expected != *declared {
                return Err(FormatError::incorrect(format!(
                    "Type of '{}' must be {}, not {}",
                    self.header.columns[index].name, expected, declared
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn needs_row_between_delimiter(&self) -> bool {
        self.row_num != 1 || (self.unit_number == 0 && (self.with_names || self.with_types))
    }

    /// Reads one row into `columns` (one container per target column).
    /// Returns `false` once the input holds no more rows.
    pub fn read_row(
        &mut self,
        columns: &mut [Column],
        ext: &mut RowReadExtension,
    ) -> FormatResult<bool> {
        self.read_prefix()?;

        if self.end_of_stream {
            return Ok(false);
        }
        if self.reader.check_for_suffix()? {
            self.end_of_stream = true;
            return Ok(false);
        }

        self.row_num += 1;
        if self.needs_row_between_delimiter() {
            self.reader.skip_row_between_delimiter()?;
        }
        self.reader.skip_row_start_delimiter()?;

        ext.read_columns.clear();
        ext.read_columns.resize(self.data_types.len(), false);

        let mapping = &self.column_mapping;
        let field_count = mapping.column_indexes_for_input_fields.len();
        for (file_column, column_index) in
            mapping.column_indexes_for_input_fields.iter().enumerate()
        {
            let is_last_file_column = file_column + 1 == field_count;
            match column_index {
                Some(index) => {
                    ext.read_columns[*index] = self.reader.read_field(
                        &mut columns[*index],
                        is_last_file_column,
                        &mapping.names_of_columns[file_column],
                    )?;
                }
                None => self.reader.skip_field(file_column)?,
            }
            if !is_last_file_column {
                self.reader.skip_field_delimiter()?;
            }
        }

        self.reader.skip_row_end_delimiter()?;

        mapping.insert_defaults_for_not_seen_columns(columns, &mut ext.read_columns);

        // Without format-level defaults, callers keep whatever they already
        // hold for omitted columns.
        if !self.settings.defaults_for_omitted_fields {
            ext.read_columns.fill(true);
        }
        Ok(true)
    }

    pub fn reset_parser(&mut self) {
        self.column_mapping.reset();
        self.end_of_stream = false;
        self.prefix_read = false;
        self.prefix_failed = false;
        self.row_num = 0;
    }

    pub fn is_garbage_after_field(&self, index: usize, pos: usize) -> bool {
        self.reader.is_garbage_after_field(index, pos)
    }

    pub fn set_read_buffer(&mut self, buffer: ReadBuffer) -> ReadBuffer {
        self.reader.set_read_buffer(buffer)
    }
}
