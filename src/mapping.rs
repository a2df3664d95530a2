//! Translation from input column positions to target schema positions.
//!
//! A [`ColumnMapping`] is established once per stream restart, either from a
//! name header ([`ColumnMapping::add_columns`]) or by assuming the input
//! matches the target schema 1:1 ([`ColumnMapping::setup_by_header`]).

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    column::Column,
    error::{FormatError, FormatResult},
    schema::Schema,
    settings::FormatSettings,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    /// One entry per input column: the target index, or `None` when the
    /// column has no target and must be skipped.
    pub column_indexes_for_input_fields: Vec<Option<usize>>,
    /// Input column names in input order.
    pub names_of_columns: Vec<String>,
    /// Target indexes never present in the input, ascending.
    pub not_presented_columns: Vec<usize>,
    pub is_set: bool,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the mapping from a name header. `target_len` is the number of
    /// target columns, which can exceed the name table when the target
    /// schema repeats a name. Nothing is changed unless the whole header maps.
    pub fn add_columns(
        &mut self,
        input_names: &[String],
        column_indexes_by_names: &HashMap<String, usize>,
        target_len: usize,
        settings: &FormatSettings,
    ) -> FormatResult<()> {
        let mut read_columns = vec![false; target_len];
        let mut indexes = Vec::with_capacity(input_names.len());

        for name in input_names {
            match column_indexes_by_names.get(name) {
                Some(&index) if index < target_len => {
                    if read_columns[index] {
                        return Err(FormatError::DuplicateColumn(name.clone()));
                    }
                    read_columns[index] = true;
                    indexes.push(Some(index));
                }
                _ => {
                    if !settings.skip_unknown_fields {
                        return Err(FormatError::UnknownColumn(name.clone()));
                    }
                    warn!("Skipping input column '{name}' absent from the target schema");
                    indexes.push(None);
                }
            }
        }

        self.column_indexes_for_input_fields = indexes;
        self.names_of_columns = input_names.to_vec();
        self.not_presented_columns = read_columns
            .iter()
            .enumerate()
            .filter(|(_, read)| !**read)
            .map(|(index, _)| index)
            .collect();
        self.is_set = true;
        debug!(
            "Mapped {} input column(s); {} target column(s) will be defaulted",
            self.column_indexes_for_input_fields.len(),
            self.not_presented_columns.len()
        );
        Ok(())
    }

    /// Identity mapping: input column `i` is target column `i`.
    pub fn setup_by_header(&mut self, target: &Schema) {
        self.column_indexes_for_input_fields = (0..target.len()).map(Some).collect();
        self.names_of_columns = target.names();
        self.not_presented_columns.clear();
        self.is_set = true;
    }

    pub fn insert_defaults_for_not_seen_columns(
        &self,
        columns: &mut [Column],
        read_columns: &mut [bool],
    ) {
        for &index in &self.not_presented_columns {
            columns[index].insert_default();
            read_columns[index] = false;
        }
    }

    pub fn input_column_count(&self) -> usize {
        self.column_indexes_for_input_fields.len()
    }

    pub fn reset(&mut self) {
        self.column_indexes_for_input_fields.clear();
        self.names_of_columns.clear();
        self.not_presented_columns.clear();
        self.is_set = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, schema::ColumnType};
    use proptest::prelude::*;

    fn target() -> Schema {
        Schema::from_pairs([
            ("id", ColumnType::Integer),
            ("name", ColumnType::String),
            ("age", ColumnType::Integer),
        ])
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn add_columns_reorders_and_tracks_missing() {
        let schema = target();
        let mut mapping = ColumnMapping::new();
        mapping
            .add_columns(
                &names(&["name", "id"]),
                &schema.names_to_indexes(),
                schema.len(),
                &FormatSettings::default(),
            )
            .unwrap();
        assert_eq!(mapping.column_indexes_for_input_fields, vec![Some(1), Some(0)]);
        assert_eq!(mapping.names_of_columns, names(&["name", "id"]));
        assert_eq!(mapping.not_presented_columns, vec![2]);
        assert!(mapping.is_set);
    }

    #[test]
    fn add_columns_rejects_unknown_in_strict_mode() {
        let schema = target();
        let mut mapping = ColumnMapping::new();
        let err = mapping
            .add_columns(
                &names(&["id", "email"]),
                &schema.names_to_indexes(),
                schema.len(),
                &FormatSettings::default(),
            )
            .unwrap_err();
        assert!(matches!(err, FormatError::UnknownColumn(name) if name == "email"));
    }

    #[test]
    fn add_columns_skips_unknown_when_allowed() {
        let schema = target();
        let settings = FormatSettings {
            skip_unknown_fields: true,
            ..FormatSettings::default()
        };
        let mut mapping = ColumnMapping::new();
        mapping
            .add_columns(
                &names(&["email", "id", "name", "age", "extra"]),
                &schema.names_to_indexes(),
                schema.len(),
                &settings,
            )
            .unwrap();
        assert_eq!(
            mapping.column_indexes_for_input_fields,
            vec![None, Some(0), Some(1), Some(2), None]
        );
        assert!(mapping.not_presented_columns.is_empty());
    }

    #[test]
    fn add_columns_rejects_duplicates() {
        let schema = target();
        let mut mapping = ColumnMapping::new();
        let err = mapping
            .add_columns(
                &names(&["id", "name", "id"]),
                &schema.names_to_indexes(),
                schema.len(),
                &FormatSettings::default(),
            )
            .unwrap_err();
        assert!(matches!(err, FormatError::DuplicateColumn(name) if name == "id"));
    }

    #[test]
    fn setup_by_header_is_identity() {
        let mut mapping = ColumnMapping::new();
        mapping.setup_by_header(&target());
        assert_eq!(
            mapping.column_indexes_for_input_fields,
            vec![Some(0), Some(1), Some(2)]
        );
        assert!(mapping.not_presented_columns.is_empty());
        mapping.reset();
        assert_eq!(mapping, ColumnMapping::default());
    }

    #[test]
    fn insert_defaults_marks_unread() {
        let schema = target();
        let mut mapping = ColumnMapping::new();
        mapping
            .add_columns(
                &names(&["id", "name"]),
                &schema.names_to_indexes(),
                schema.len(),
                &FormatSettings::default(),
            )
            .unwrap();
        let mut columns = crate::column::columns_for(&schema.data_types());
        let mut read = vec![true; 3];
        mapping.insert_defaults_for_not_seen_columns(&mut columns, &mut read);
        assert_eq!(read, vec![true, true, false]);
        assert_eq!(columns[2].get(0), Some(&Value::Integer(0)));
        assert!(columns[0].is_empty());
    }

    #[test]
    fn repeated_target_names_size_by_schema_length() {
        let schema = Schema::from_pairs([
            ("a", ColumnType::Integer),
            ("a", ColumnType::Integer),
            ("b", ColumnType::Integer),
        ]);
        let mut mapping = ColumnMapping::new();
        mapping
            .add_columns(
                &names(&["b"]),
                &schema.names_to_indexes(),
                schema.len(),
                &FormatSettings::default(),
            )
            .unwrap();
        assert_eq!(mapping.column_indexes_for_input_fields, vec![Some(2)]);
        assert_eq!(mapping.not_presented_columns, vec![0, 1]);
    }

    #[test]
    fn failed_header_leaves_mapping_untouched() {
        let schema = target();
        let mut mapping = ColumnMapping::new();
        let err = mapping
            .add_columns(
                &names(&["id", "nickname"]),
                &schema.names_to_indexes(),
                schema.len(),
                &FormatSettings::default(),
            )
            .unwrap_err();
        assert!(matches!(err, FormatError::UnknownColumn(_)));
        assert_eq!(mapping, ColumnMapping::default());
    }

    proptest! {
        #[test]
        fn mapping_partitions_target_columns(picks in proptest::sample::subsequence((0usize..8).collect::<Vec<_>>(), 0..=8)) {
            let schema = Schema::from_pairs((0..8).map(|i| (format!("c{i}"), ColumnType::String)));
            let mut input: Vec<String> = picks.iter().map(|i| format!("c{i}")).collect();
            input.reverse();
            let mut mapping = ColumnMapping::new();
            mapping.add_columns(&input, &schema.names_to_indexes(), schema.len(), &FormatSettings::default()).unwrap();

            let mut present: Vec<usize> = mapping.column_indexes_for_input_fields.iter().flatten().copied().collect();
            prop_assert_eq!(present.len(), input.len());
            prop_assert_eq!(mapping.names_of_columns.len(), mapping.column_indexes_for_input_fields.len());
            present.extend(mapping.not_presented_columns.iter().copied());
            present.sort_unstable();
            prop_assert_eq!(present, (0..8).collect::<Vec<_>>());
        }
    }
}
