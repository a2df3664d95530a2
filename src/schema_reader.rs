//! Derives a `(name, type)` list from the headers of an input, sampling rows
//! only when the input carries no type header.

use std::collections::HashSet;

use log::debug;

use crate::{
    buffer::ReadBuffer,
    error::{FormatError, FormatResult},
    format::{FormatName, FormatReader},
    inference::infer_from_rows,
    schema::{ColumnType, Schema},
    settings::FormatSettings,
};

pub struct SchemaReader {
    reader: Box<dyn FormatReader>,
    with_names: bool,
    with_types: bool,
    settings: FormatSettings,
}

impl SchemaReader {
    pub fn new(
        reader: Box<dyn FormatReader>,
        with_names: bool,
        with_types: bool,
        settings: FormatSettings,
    ) -> Self {
        Self {
            reader,
            with_names,
            with_types,
            settings,
        }
    }

    pub fn for_format(format: FormatName, buffer: ReadBuffer, settings: FormatSettings) -> Self {
        let reader = format.create_reader(buffer, &settings);
        Self::new(reader, format.with_names, format.with_types, settings)
    }

    pub fn read_schema(&mut self) -> FormatResult<Vec<(String, ColumnType)>> {
        let columns = self.read_columns()?;
        let mut seen = HashSet::new();
        for (name, _) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(FormatError::incorrect(format!(
                    "Column name '{name}' appears more than once in the input header"
                )));
            }
        }
        Ok(columns)
    }

    fn read_columns(&mut self) -> FormatResult<Vec<(String, ColumnType)>> {
        self.reader.check_delimiters()?;
        if (self.with_names || self.with_types) && self.reader.buffer_mut().skip_bom_if_exists() {
            debug!("Skipped byte-order mark before header");
        }
        self.reader.skip_prefix_before_header()?;

        let names = if self.with_names {
            self.reader.read_names()?
        } else {
            Vec::new()
        };

        if self.with_types {
            self.reader.skip_row_between_delimiter()?;
            let types = self.reader.read_types()?;
            if names.len() != types.len() {
                return Err(FormatError::incorrect(format!(
                    "The number of column names {} differs with the number of types {}",
                    names.len(),
                    types.len()
                )));
            }
            return names
                .into_iter()
                .zip(types)
                .map(|(name, type_name)| {
                    let ty = type_name.parse::<ColumnType>().map_err(|err| {
                        FormatError::incorrect(format!(
                            "Unknown type '{type_name}' declared for column '{name}': {err}"
                        ))
                    })?;
                    Ok((name, ty))
                })
                .collect();
        }

        infer_from_rows(
            self.reader.as_mut(),
            names,
            self.with_names,
            &self.settings,
        )
    }

    /// Convenience wrapper producing a [`Schema`].
    pub fn read_target_schema(&mut self) -> FormatResult<Schema> {
        Ok(Schema::from_pairs(self.read_schema()?))
    }
}
