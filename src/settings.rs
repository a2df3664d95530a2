//! Parser configuration, loadable from YAML.
//!
//! Every field has a default so a settings file only needs to name what it
//! changes.

use std::{fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

/// How field values are quoted or escaped on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EscapingRule {
    /// Optional double quotes, quotes doubled inside a quoted value.
    #[default]
    Csv,
    /// Backslash escapes (`\t`, `\n`, `\\`), `\N` for NULL.
    Escaped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomDelimiters {
    pub result_before: String,
    pub row_before: String,
    pub field: String,
    pub row_after: String,
    pub row_between: String,
    pub result_after: String,
    pub escaping_rule: EscapingRule,
}

impl Default for CustomDelimiters {
    fn default() -> Self {
        Self {
            result_before: String::new(),
            row_before: String::new(),
            field: "\t".to_string(),
            row_after: "\n".to_string(),
            row_between: String::new(),
            result_after: String::new(),
            escaping_rule: EscapingRule::Escaped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    /// Build the column mapping from the name header instead of only skipping it.
    pub with_names_use_header: bool,
    /// Validate declared types against the target schema instead of only skipping them.
    pub with_types_use_header: bool,
    /// Treat input columns missing from the target schema as skippable.
    pub skip_unknown_fields: bool,
    /// Report omitted target columns as unread so callers may substitute their own defaults.
    pub defaults_for_omitted_fields: bool,
    /// Insert the type default when a non-nullable column receives NULL.
    pub null_as_default: bool,
    /// Insert the type default for an empty unquoted value.
    pub empty_as_default: bool,
    pub null_representation: String,
    pub csv_delimiter: char,
    pub custom: CustomDelimiters,
    pub max_rows_to_read_for_schema_inference: usize,
    pub schema_inference_make_columns_nullable: bool,
    /// Type used for sampled columns that only held NULLs.
    pub schema_inference_default_type: Option<String>,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            with_names_use_header: true,
            with_types_use_header: true,
            skip_unknown_fields: false,
            defaults_for_omitted_fields: true,
            null_as_default: true,
            empty_as_default: true,
            null_representation: "\\N".to_string(),
            csv_delimiter: ',',
            custom: CustomDelimiters::default(),
            max_rows_to_read_for_schema_inference: 25_000,
            schema_inference_make_columns_nullable: true,
            schema_inference_default_type: None,
        }
    }
}

impl FormatSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let settings: FormatSettings =
            serde_yaml::from_reader(BufReader::new(file)).context("Parsing settings YAML")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.csv_delimiter.is_ascii() {
            return Err(anyhow!(
                "CSV delimiter must be a single ASCII character, got '{}'",
                self.csv_delimiter
            ));
        }
        if self.custom.field.is_empty() {
            return Err(anyhow!("Custom field delimiter must not be empty"));
        }
        self.default_inference_type()?;
        Ok(())
    }

    pub fn default_inference_type(&self) -> Result<Option<ColumnType>> {
        self.schema_inference_default_type
            .as_deref()
            .map(ColumnType::from_str)
            .transpose()
            .context("Parsing schema_inference_default_type")
    }
}
