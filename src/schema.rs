//! Schema snapshot used as read-only context for prompt assembly.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Source of the schema snapshot, queried once at startup.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn fetch_schema(&self) -> Result<SchemaMap>;
}

/// Table name -> column names in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaMap {
    tables: BTreeMap<String, Vec<String>>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(table, column)` pairs already ordered by ordinal position.
    pub fn from_rows<I, T, C>(rows: I) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: Into<String>,
        C: Into<String>,
    {
        let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (table, column) in rows {
            tables.entry(table.into()).or_default().push(column.into());
        }
        Self { tables }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tables
            .iter()
            .map(|(table, columns)| (table.as_str(), columns.as_slice()))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_keeps_column_order() {
        let schema = SchemaMap::from_rows([
            ("college_profiles", "id"),
            ("alumni_reviews", "id"),
            ("college_profiles", "college"),
            ("college_profiles", "state"),
            ("alumni_reviews", "college_id"),
        ]);

        assert_eq!(schema.table_names(), vec!["alumni_reviews", "college_profiles"]);
        assert_eq!(
            schema.columns("college_profiles").unwrap(),
            &["id".to_string(), "college".to_string(), "state".to_string()]
        );
        assert!(schema.columns("missing").is_none());
    }

    #[test]
    fn test_json_shape_is_plain_map() {
        let schema: SchemaMap =
            serde_json::from_str(r#"{"t": ["a", "b"]}"#).unwrap();
        assert_eq!(schema.len(), 1);
        assert_eq!(serde_json::to_string(&schema).unwrap(), r#"{"t":["a","b"]}"#);
    }
}
