//! Container catalog.
//!
//! Static container records in centimeters and kilograms, the unit system of
//! the front-end. A JSON file can replace the built-in ISO containers.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::{ContainerSpec, ValidationError};
use crate::units::LengthUnit;

/// A catalog entry. Lengths in cm, load in kg.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub max_load: f64,
}

impl ContainerRecord {
    fn new(id: &str, name: &str, length: f64, width: f64, height: f64, max_load: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            length,
            width,
            height,
            max_load,
        }
    }

    /// Converts the record into a validated container in millimeters.
    pub fn to_spec(&self) -> Result<ContainerSpec, ValidationError> {
        let cm = LengthUnit::Centimeter;
        ContainerSpec::new(
            cm.to_mm(self.length),
            cm.to_mm(self.width),
            cm.to_mm(self.height),
            self.max_load,
        )
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Cannot read catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid container '{id}': {source}")]
    InvalidRecord {
        id: String,
        #[source]
        source: ValidationError,
    },
    #[error("Duplicate container id '{0}'")]
    DuplicateId(String),
    #[error("Catalog contains no containers")]
    Empty,
}

/// Immutable set of container records, in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerCatalog {
    records: Vec<ContainerRecord>,
}

impl ContainerCatalog {
    /// The ISO containers shipped with the service.
    pub fn builtin() -> Self {
        Self {
            records: vec![
                ContainerRecord::new("20ft", "20' Standard", 590.0, 234.0, 239.0, 28_200.0),
                ContainerRecord::new("40ft", "40' Standard", 1203.0, 234.0, 239.0, 26_700.0),
                ContainerRecord::new("40ft-hc", "40' High Cube", 1203.0, 234.0, 270.0, 26_500.0),
            ],
        }
    }

    /// Builds a catalog after checking every record and the uniqueness of ids.
    pub fn from_records(records: Vec<ContainerRecord>) -> Result<Self, CatalogError> {
        if records.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(CatalogError::DuplicateId(record.id.clone()));
            }
            record.to_spec().map_err(|source| CatalogError::InvalidRecord {
                id: record.id.clone(),
                source,
            })?;
        }
        Ok(Self { records })
    }

    /// Parses a JSON array of records.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let records: Vec<ContainerRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Loads `path` if given, falling back to the built-in catalog on any error.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::load(path) {
            Ok(catalog) => {
                info!(
                    "📚 Loaded {} container(s) from {}",
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            Err(err) => {
                warn!("⚠️ {} - using built-in containers.", err);
                Self::builtin()
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ContainerRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn records(&self) -> &[ContainerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ContainerCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_catalog_has_iso_containers() {
        let catalog = ContainerCatalog::builtin();
        assert_eq!(catalog.len(), 3);
        let spec = catalog.get("20ft").unwrap().to_spec().unwrap();
        assert_eq!((spec.length, spec.width, spec.height), (5900.0, 2340.0, 2390.0));
        assert_eq!(catalog.get("40ft-hc").unwrap().height, 270.0);
        assert!(catalog.get("45ft").is_none());
    }

    #[test]
    fn json_catalog_is_parsed_in_order() {
        let json = r#"[
            {"id": "a", "name": "A", "length": 100, "width": 50, "height": 50, "max_load": 1000},
            {"id": "b", "name": "B", "length": 200, "width": 50, "height": 50, "max_load": 2000}
        ]"#;
        let catalog = ContainerCatalog::from_json_str(json).unwrap();
        let ids: Vec<&str> = catalog.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"[
            {"id": "a", "name": "A", "length": 100, "width": 50, "height": 50, "max_load": 1000},
            {"id": "a", "name": "B", "length": 200, "width": 50, "height": 50, "max_load": 2000}
        ]"#;
        assert!(matches!(
            ContainerCatalog::from_json_str(json),
            Err(CatalogError::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn invalid_records_are_rejected() {
        let json = r#"[{"id": "x", "name": "X", "length": 0, "width": 50, "height": 50, "max_load": 1}]"#;
        assert!(matches!(
            ContainerCatalog::from_json_str(json),
            Err(CatalogError::InvalidRecord { .. })
        ));
        assert!(matches!(ContainerCatalog::from_json_str("[]"), Err(CatalogError::Empty)));
        assert!(matches!(ContainerCatalog::from_json_str("{"), Err(CatalogError::Json(_))));
    }

    #[test]
    fn catalog_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "pallet", "name": "Pallet", "length": 120, "width": 80, "height": 180, "max_load": 1500}}]"#
        )
        .unwrap();

        let catalog = ContainerCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.get("pallet").unwrap().max_load, 1500.0);
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("containers.json");
        assert!(matches!(ContainerCatalog::load(&missing), Err(CatalogError::Io { .. })));
        assert_eq!(
            ContainerCatalog::load_or_builtin(Some(&missing)),
            ContainerCatalog::builtin()
        );
        assert_eq!(ContainerCatalog::load_or_builtin(None), ContainerCatalog::builtin());
    }
}
