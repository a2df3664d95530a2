#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowsplice::{
    buffer::ReadBuffer,
    column::Column,
    parser::{RowParser, RowReadExtension},
    schema::{ColumnType, Schema},
    settings::FormatSettings,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Target schema used across the integration tests: `id`, `name`, `age`.
pub fn people_schema() -> Schema {
    Schema::from_pairs([
        ("id", ColumnType::Integer),
        ("name", ColumnType::String),
        ("age", ColumnType::Integer),
    ])
}

pub fn parser(format: &str, schema: Schema, input: &str, settings: FormatSettings) -> RowParser {
    RowParser::for_format(
        Arc::new(schema),
        format.parse().expect("known format"),
        ReadBuffer::new(input),
        settings,
    )
}

/// Reads every row and returns the columns plus one extension per row.
pub fn read_all_rows(parser: &mut RowParser) -> (Vec<Column>, Vec<RowReadExtension>) {
    let mut columns = parser.create_columns();
    let mut extensions = Vec::new();
    loop {
        let mut ext = RowReadExtension::default();
        if !parser.read_row(&mut columns, &mut ext).expect("row parses") {
            break;
        }
        extensions.push(ext);
    }
    (columns, extensions)
}
