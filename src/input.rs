//! Block-at-a-time driver over a [`RowParser`].

use log::debug;

use crate::{
    column::Column,
    error::{FormatError, FormatResult},
    parser::{RowParser, RowReadExtension},
};

/// Parsed rows in target-schema column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub columns: Vec<Column>,
    /// Per target column, the block rows whose value was defaulted rather
    /// than read from the input.
    pub missing: Vec<Vec<usize>>,
    rows: usize,
}

impl Block {
    pub fn empty(columns: Vec<Column>) -> Self {
        let missing = vec![Vec::new(); columns.len()];
        Self {
            columns,
            missing,
            rows: 0,
        }
    }

    /// Wraps already filled columns; nothing is marked missing.
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let rows = columns.first().map(Column::len).unwrap_or_default();
        let missing = vec![Vec::new(); columns.len()];
        Self {
            columns,
            missing,
            rows,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn is_missing(&self, column: usize, row: usize) -> bool {
        self.missing
            .get(column)
            .is_some_and(|rows| rows.binary_search(&row).is_ok())
    }

    /// Moves the rows of `other` after the rows of `self`.
    pub fn append(&mut self, mut other: Block) {
        let offset = self.rows;
        for (column, tail) in self.columns.iter_mut().zip(other.columns.iter_mut()) {
            column.append(tail);
        }
        for (rows, tail) in self.missing.iter_mut().zip(other.missing) {
            rows.extend(tail.into_iter().map(|row| row + offset));
        }
        self.rows += other.rows;
    }
}

pub struct RowInputFormat {
    parser: RowParser,
}

impl RowInputFormat {
    pub fn new(parser: RowParser) -> Self {
        Self { parser }
    }

    pub fn parser(&self) -> &RowParser {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut RowParser {
        &mut self.parser
    }

    pub fn into_parser(self) -> RowParser {
        self.parser
    }

    /// Reads up to `max_rows` rows (`0` for no limit). `None` once the input
    /// is exhausted.
    pub fn read_block(&mut self, max_rows: usize) -> FormatResult<Option<Block>> {
        self.parser.read_prefix()?;

        let mut block = Block::empty(self.parser.create_columns());
        let mut ext = RowReadExtension::default();
        while max_rows == 0 || block.rows < max_rows {
            let row_start = self.parser.reader().buffer().position();
            match self.parser.read_row(&mut block.columns, &mut ext) {
                Ok(true) if self.parser.reader().buffer().position() == row_start => {
                    return Err(FormatError::incorrect(format!(
                        "Row {} at byte offset {row_start} consumed no input; check the row delimiters",
                        self.parser.row_num()
                    )));
                }
                Ok(true) => {
                    for (column, read) in ext.read_columns.iter().enumerate() {
                        if !read {
                            block.missing[column].push(block.rows);
                        }
                    }
                    block.rows += 1;
                }
                Ok(false) => break,
                Err(err) => return Err(self.explain_failure(err, &mut block, row_start)),
            }
        }

        if block.is_empty() {
            return Ok(None);
        }
        debug!(
            "Unit {} produced a block of {} row(s)",
            self.parser.unit_number(),
            block.rows
        );
        Ok(Some(block))
    }

    /// Reads every remaining row, `block_rows` at a time.
    pub fn read_all(&mut self, block_rows: usize) -> FormatResult<Block> {
        let mut result = Block::empty(self.parser.create_columns());
        while let Some(block) = self.read_block(block_rows)? {
            result.append(block);
        }
        Ok(result)
    }

    pub fn reset(&mut self) {
        self.parser.reset_parser();
    }

    fn explain_failure(
        &mut self,
        err: FormatError,
        block: &mut Block,
        row_start: usize,
    ) -> FormatError {
        for column in &mut block.columns {
            column.truncate(block.rows);
        }
        self.parser.reader_mut().buffer_mut().seek(row_start);

        let mut scratch = self.parser.create_columns();
        let mut trace = String::new();
        self.parser
            .parse_row_and_print_diagnostic_info(&mut scratch, &mut trace);

        let row = self.parser.row_num();
        if matches!(err, FormatError::Io(_)) {
            debug!("Diagnostic information for row {row}:\n{trace}");
        }
        err.map_message(|message| {
            format!("Cannot parse input at row {row}: {message}\n\nDiagnostic information:\n{trace}")
        })
    }
}
