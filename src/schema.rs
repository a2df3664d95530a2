//! Target schema model and the column type system.
//!
//! This module owns the [`Schema`] struct (the ordered list of target columns
//! a parser populates) and the [`ColumnType`] enum with its canonical names.
//! Canonical names are what a type header on the wire must spell exactly for
//! a column to be accepted.
//!
//! ## Responsibilities
//!
//! - YAML schema loading and saving via `serde_yaml`
//! - Canonical type names and alias parsing
//! - Per-type default values used when a target column is omitted
//! - The "text can only be valid UTF-8" predicate used for BOM handling

use std::{collections::HashMap, fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow, ensure};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use uuid::Uuid;

use crate::data::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Guid,
    Nullable(Box<ColumnType>),
    /// Placeholder for input columns that have no target.
    Nothing,
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

impl ColumnType {
    /// Canonical name, compared verbatim against declared types in a type header.
    pub fn name(&self) -> String {
        match self {
            ColumnType::Nullable(inner) => format!("Nullable({})", inner.name()),
            other => other.base_name().to_string(),
        }
    }

    fn base_name(&self) -> &'static str {
        match self {
            ColumnType::String => "String",
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Boolean => "Boolean",
            ColumnType::Date => "Date",
            ColumnType::DateTime => "DateTime",
            ColumnType::Guid => "Guid",
            ColumnType::Nullable(_) => "Nullable",
            ColumnType::Nothing => "Nothing",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "String",
            "Integer",
            "Float",
            "Boolean",
            "Date",
            "DateTime",
            "Guid",
            "Nullable(<type>)",
        ]
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, ColumnType::Nullable(_) | ColumnType::Nothing)
    }

    pub fn make_nullable(self) -> ColumnType {
        match self {
            ColumnType::Nullable(_) | ColumnType::Nothing => self,
            other => ColumnType::Nullable(Box::new(other)),
        }
    }

    /// The type with any `Nullable` wrapper removed.
    pub fn base(&self) -> &ColumnType {
        match self {
            ColumnType::Nullable(inner) => inner.base(),
            other => other,
        }
    }

    /// True when every textual value of this type is necessarily well-formed
    /// UTF-8. A leading byte-order mark can then never be part of a value.
    pub fn text_can_contain_only_valid_utf8(&self) -> bool {
        match self {
            ColumnType::String => false,
            ColumnType::Nullable(inner) => inner.text_can_contain_only_valid_utf8(),
            _ => true,
        }
    }

    pub fn default_value(&self) -> Option<Value> {
        let value = match self {
            ColumnType::String => Value::String(String::new()),
            ColumnType::Integer => Value::Integer(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Boolean => Value::Boolean(false),
            ColumnType::Date => Value::Date(NaiveDate::default()),
            ColumnType::DateTime => Value::DateTime(NaiveDateTime::default()),
            ColumnType::Guid => Value::Guid(Uuid::nil()),
            ColumnType::Nullable(_) | ColumnType::Nothing => return None,
        };
        Some(value)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let normalized = trimmed.to_ascii_lowercase();
        if let Some(rest) = normalized.strip_prefix("nullable") {
            let rest = rest.trim();
            ensure!(
                rest.starts_with('(') && rest.ends_with(')'),
                "Nullable type must wrap an inner type, e.g. Nullable(Integer)"
            );
            let start = trimmed.find('(').unwrap_or(0);
            let inner = ColumnType::from_str(&trimmed[start + 1..trimmed.len() - 1])?;
            ensure!(
                !inner.is_nullable(),
                "Nested nullable type '{value}' is not supported"
            );
            return Ok(ColumnType::Nullable(Box::new(inner)));
        }
        match normalized.as_str() {
            "string" | "text" => Ok(ColumnType::String),
            "integer" | "int" | "int64" => Ok(ColumnType::Integer),
            "float" | "double" | "float64" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "date-time" | "timestamp" => Ok(ColumnType::DateTime),
            "guid" | "uuid" => Ok(ColumnType::Guid),
            "nothing" => Ok(ColumnType::Nothing),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type", alias = "datatype")]
    pub datatype: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, datatype: ColumnType) -> Self {
        Self {
            name: name.into(),
            datatype,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self { columns }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(name, datatype)| ColumnMeta::new(name, datatype))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn data_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.datatype.clone()).collect()
    }

    pub fn names_to_indexes(&self) -> HashMap<String, usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, column)| (column.name.clone(), idx))
            .collect()
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema to YAML string")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: Schema = serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashMap::new();
        for (idx, column) in self.columns.iter().enumerate() {
            if let Some(previous) = seen.insert(column.name.as_str(), idx) {
                return Err(anyhow!(
                    "Column '{}' is defined twice (positions {} and {})",
                    column.name,
                    previous + 1,
                    idx + 1
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_round_trip_through_from_str() {
        let nullable = ColumnType::Nullable(Box::new(ColumnType::Integer));
        assert_eq!(nullable.name(), "Nullable(Integer)");
        assert_eq!(ColumnType::from_str("Nullable(Integer)").unwrap(), nullable);
        assert_eq!(ColumnType::from_str(" nullable( int ) ").unwrap(), nullable);
        assert_eq!(ColumnType::from_str("uuid").unwrap(), ColumnType::Guid);
    }

    #[test]
    fn from_str_rejects_unknown_and_nested() {
        assert!(ColumnType::from_str("money").is_err());
        assert!(ColumnType::from_str("Nullable(Nullable(String))").is_err());
        assert!(ColumnType::from_str("Nullable").is_err());
    }

    #[test]
    fn utf8_predicate_only_false_for_raw_strings() {
        assert!(!ColumnType::String.text_can_contain_only_valid_utf8());
        assert!(
            !ColumnType::Nullable(Box::new(ColumnType::String)).text_can_contain_only_valid_utf8()
        );
        assert!(ColumnType::Integer.text_can_contain_only_valid_utf8());
        assert!(ColumnType::Date.text_can_contain_only_valid_utf8());
    }

    #[test]
    fn defaults_follow_type() {
        assert_eq!(ColumnType::Integer.default_value(), Some(Value::Integer(0)));
        assert_eq!(
            ColumnType::String.default_value(),
            Some(Value::String(String::new()))
        );
        assert_eq!(ColumnType::Integer.make_nullable().default_value(), None);
    }

    #[test]
    fn schema_yaml_uses_canonical_names() {
        let schema = Schema::from_pairs([
            ("id", ColumnType::Integer),
            ("name", ColumnType::String.make_nullable()),
        ]);
        let yaml = schema.to_yaml_string().unwrap();
        assert!(yaml.contains("type: Integer"));
        assert!(yaml.contains("type: Nullable(String)"));
        let parsed: Schema = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn names_to_indexes_maps_positions() {
        let schema = Schema::from_pairs([("a", ColumnType::String), ("b", ColumnType::Float)]);
        let map = schema.names_to_indexes();
        assert_eq!(map["a"], 0);
        assert_eq!(map["b"], 1);
        assert_eq!(schema.column_index("b"), Some(1));
        assert_eq!(schema.column_index("c"), None);
    }
}
