//! Row-sampling type inference.
//!
//! Reads up to `max_rows_to_read_for_schema_inference` rows and keeps one
//! [`TypeGuess`] per column. A guess only ever widens as more values are
//! seen: Integer widens to Float, Date widens to DateTime, and any other
//! mix (Boolean with Integer included) falls back to String.

use log::debug;
use uuid::Uuid;

use crate::{
    data::{parse_naive_date, parse_naive_datetime},
    error::{FormatError, FormatResult},
    format::FormatReader,
    schema::ColumnType,
    settings::FormatSettings,
};

#[derive(Debug, Clone, Default)]
pub struct TypeGuess {
    non_null: usize,
    nulls: usize,
    boolean_matches: usize,
    integer_matches: usize,
    float_matches: usize,
    date_matches: usize,
    datetime_matches: usize,
    guid_matches: usize,
    unclassified: usize,
}

impl TypeGuess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: Option<&str>) {
        let Some(trimmed) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            self.nulls += 1;
            return;
        };
        self.non_null += 1;

        let lowered = trimmed.to_ascii_lowercase();
        if matches!(
            lowered.as_str(),
            "true" | "false" | "t" | "f" | "yes" | "no" | "y" | "n"
        ) {
            self.boolean_matches += 1;
        } else if trimmed.parse::<i64>().is_ok() {
            self.integer_matches += 1;
        } else if trimmed.parse::<f64>().is_ok() {
            self.float_matches += 1;
        } else if parse_naive_datetime(trimmed).is_ok() {
            self.datetime_matches += 1;
        } else if parse_naive_date(trimmed).is_ok() {
            self.date_matches += 1;
        } else if Uuid::parse_str(trimmed.trim_matches(|c| matches!(c, '{' | '}'))).is_ok() {
            self.guid_matches += 1;
        } else {
            self.unclassified += 1;
        }
    }

    pub fn saw_nulls(&self) -> bool {
        self.nulls > 0
    }

    /// `None` while no non-null value has been seen.
    pub fn decide(&self) -> Option<ColumnType> {
        let all = |count: usize| count == self.non_null;
        let decided = if self.non_null == 0 {
            return None;
        } else if self.unclassified > 0 {
            ColumnType::String
        } else if all(self.boolean_matches) {
            ColumnType::Boolean
        } else if all(self.integer_matches) {
            ColumnType::Integer
        } else if all(self.integer_matches + self.float_matches) {
            ColumnType::Float
        } else if all(self.date_matches) {
            ColumnType::Date
        } else if all(self.date_matches + self.datetime_matches) {
            ColumnType::DateTime
        } else if all(self.guid_matches) {
            ColumnType::Guid
        } else {
            ColumnType::String
        };
        Some(decided)
    }
}

pub fn generate_column_names(count: usize) -> Vec<String> {
    (1..=count).map(|idx| format!("c{idx}")).collect()
}

/// Samples rows from `reader` and returns one `(name, type)` per column.
/// `names` is empty when the input carries no name header; synthetic names
/// are generated then.
pub fn infer_from_rows(
    reader: &mut dyn FormatReader,
    names: Vec<String>,
    header_present: bool,
    settings: &FormatSettings,
) -> FormatResult<Vec<(String, ColumnType)>> {
    let default_type = settings
        .default_inference_type()
        .map_err(|err| FormatError::incorrect(format!("{err:#}")))?;
    let limit = settings.max_rows_to_read_for_schema_inference;

    let mut expected_columns = (!names.is_empty()).then_some(names.len());
    let mut guesses: Vec<TypeGuess> = vec![TypeGuess::new(); names.len()];
    let mut rows_read = 0usize;

    while limit == 0 || rows_read < limit {
        let skip_between = rows_read > 0 || header_present;
        let Some(row) = reader.read_row_for_schema_inference(skip_between)? else {
            break;
        };
        rows_read += 1;
        let expected = *expected_columns.get_or_insert(row.len());
        if row.len() != expected {
            return Err(FormatError::incorrect(format!(
                "Row {rows_read} has {} field(s), expected {expected}",
                row.len()
            )));
        }
        if guesses.len() < expected {
            guesses.resize(expected, TypeGuess::new());
        }
        for (guess, value) in guesses.iter_mut().zip(&row) {
            guess.update(value.as_deref());
        }
    }

    let Some(column_count) = expected_columns else {
        return Err(FormatError::incorrect(
            "Cannot extract table structure: the data is empty",
        ));
    };
    let names = if names.is_empty() {
        generate_column_names(column_count)
    } else {
        names
    };
    debug!("Sampled {rows_read} row(s) to infer {column_count} column type(s)");

    names
        .into_iter()
        .zip(guesses)
        .map(|(name, guess)| {
            let ty = match guess.decide() {
                Some(ty) if settings.schema_inference_make_columns_nullable || guess.saw_nulls() => {
                    ty.make_nullable()
                }
                Some(ty) => ty,
                None => default_type.clone().ok_or_else(|| {
                    FormatError::incorrect(format!(
                        "Cannot determine type for column '{name}' by first {rows_read} row(s) of data, most likely this column contains only NULLs or empty values"
                    ))
                })?,
            };
            Ok((name, ty))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::ReadBuffer, format::FormatName};

    fn guess(values: &[Option<&str>]) -> Option<ColumnType> {
        let mut guess = TypeGuess::new();
        for value in values {
            guess.update(*value);
        }
        guess.decide()
    }

    #[test]
    fn guesses_widen_numeric_and_temporal_types() {
        assert_eq!(guess(&[Some("1"), Some("2")]), Some(ColumnType::Integer));
        assert_eq!(guess(&[Some("1"), Some("2.5")]), Some(ColumnType::Float));
        assert_eq!(guess(&[Some("1"), Some("x")]), Some(ColumnType::String));
        assert_eq!(
            guess(&[Some("2024-01-01"), Some("2024-01-02 10:00:00")]),
            Some(ColumnType::DateTime)
        );
        assert_eq!(guess(&[Some("yes"), Some("No")]), Some(ColumnType::Boolean));
        assert_eq!(guess(&[Some("true"), Some("7")]), Some(ColumnType::String));
        assert_eq!(guess(&[None, Some("")]), None);
    }

    #[test]
    fn synthetic_names_are_positional() {
        assert_eq!(generate_column_names(2), vec!["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    fn infer_from_rows_respects_row_limit() {
        let settings = FormatSettings {
            max_rows_to_read_for_schema_inference: 2,
            schema_inference_make_columns_nullable: false,
            ..FormatSettings::default()
        };
        let format: FormatName = "CSV".parse().unwrap();
        let mut reader = format.create_reader(ReadBuffer::new("1,a\n2,b\nx,c\n"), &settings);
        let schema = infer_from_rows(reader.as_mut(), Vec::new(), false, &settings).unwrap();
        assert_eq!(
            schema,
            vec![
                ("c1".to_string(), ColumnType::Integer),
                ("c2".to_string(), ColumnType::String)
            ]
        );
    }

    #[test]
    fn infer_from_rows_rejects_ragged_rows() {
        let settings = FormatSettings::default();
        let format: FormatName = "CSV".parse().unwrap();
        let mut reader = format.create_reader(ReadBuffer::new("1,a\n2\n"), &settings);
        let err = infer_from_rows(reader.as_mut(), Vec::new(), false, &settings).unwrap_err();
        assert!(err.to_string().contains("Row 2 has 1 field(s), expected 2"), "{err}");
    }

    #[test]
    fn all_null_column_needs_default_type() {
        let format: FormatName = "TSV".parse().unwrap();
        let settings = FormatSettings::default();
        let mut reader = format.create_reader(ReadBuffer::new("1\t\\N\n"), &settings);
        let err = infer_from_rows(reader.as_mut(), Vec::new(), false, &settings).unwrap_err();
        assert!(err.to_string().contains("column 'c2'"), "{err}");

        let settings = FormatSettings {
            schema_inference_default_type: Some("String".to_string()),
            ..FormatSettings::default()
        };
        let mut reader = format.create_reader(ReadBuffer::new("1\t\\N\n"), &settings);
        let schema = infer_from_rows(reader.as_mut(), Vec::new(), false, &settings).unwrap();
        assert_eq!(schema[0].1, ColumnType::Integer.make_nullable());
        assert_eq!(schema[1].1, ColumnType::String);
    }
}
