use crate::error::{AppError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Presentational hint for a form input. Values are never validated against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Date,
}

impl FieldKind {
    /// The `type` attribute used for the browser form input.
    pub fn html_input_type(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
        }
    }

    pub fn prompt_hint(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Date => "date, e.g. 2024-01-31",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentType {
    pub title: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Deserialize, Serialize)]
struct DocumentEntry {
    fields: Vec<FieldSpec>,
}

/// The set of supported document types, in the order of the source file.
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    document_types: Vec<DocumentType>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::CatalogNotFound(path.to_path_buf()),
            _ => AppError::Io(e),
        })?;
        let catalog = Self::parse(&raw, path)?;
        info!(
            "Loaded {} document types from {}: {:?}",
            catalog.document_types.len(),
            path.display(),
            catalog.list_document_types()
        );
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Self::parse(raw, Path::new("<inline>"))
    }

    fn parse(raw: &str, path: &Path) -> Result<Self> {
        let parse_err = |source| AppError::CatalogParse {
            path: PathBuf::from(path),
            source,
        };

        // preserve_order keeps the map in file order
        let entries: Map<String, Value> = serde_json::from_str(raw).map_err(parse_err)?;

        let mut document_types = Vec::with_capacity(entries.len());
        for (title, value) in entries {
            let entry: DocumentEntry = serde_json::from_value(value).map_err(parse_err)?;
            let mut seen = HashSet::new();
            for field in &entry.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(AppError::DuplicateField {
                        document: title,
                        field: field.name.clone(),
                    });
                }
            }
            document_types.push(DocumentType {
                title,
                fields: entry.fields,
            });
        }

        Ok(Self { document_types })
    }

    pub fn list_document_types(&self) -> Vec<&str> {
        self.document_types.iter().map(|d| d.title.as_str()).collect()
    }

    pub fn get(&self, type_name: &str) -> Option<&DocumentType> {
        self.document_types.iter().find(|d| d.title == type_name)
    }

    pub fn get_fields(&self, type_name: &str) -> Option<&[FieldSpec]> {
        self.get(type_name).map(|d| d.fields.as_slice())
    }

    pub fn document_types(&self) -> &[DocumentType] {
        &self.document_types
    }

    /// Serializes back to the catalog file shape: `{title: {"fields": [...]}}`.
    pub fn to_json(&self) -> String {
        let mut map = Map::new();
        for doc in &self.document_types {
            let fields = serde_json::to_value(&doc.fields).unwrap_or(Value::Array(Vec::new()));
            let mut entry = Map::new();
            entry.insert("fields".to_string(), fields);
            map.insert(doc.title.clone(), Value::Object(entry));
        }
        Value::Object(map).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Visa Application": {"fields": [
            {"name": "fullName", "label": "Full Name", "type": "text"},
            {"name": "passportNumber", "label": "Passport Number", "type": "text"},
            {"name": "dateOfBirth", "label": "Date of Birth", "type": "date"},
            {"name": "stayDays", "label": "Length of Stay (days)", "type": "number"}
        ]},
        "General Power of Attorney": {"fields": [
            {"name": "principalName", "label": "Principal Name", "type": "text"},
            {"name": "agentName", "label": "Agent Name", "type": "text"}
        ]},
        "Antique Power of Attorney": {"fields": []}
    }"#;

    #[test]
    fn keeps_document_and_field_order() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        assert_eq!(
            catalog.list_document_types(),
            vec![
                "Visa Application",
                "General Power of Attorney",
                "Antique Power of Attorney"
            ]
        );

        let names: Vec<&str> = catalog
            .get_fields("Visa Application")
            .unwrap()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["fullName", "passportNumber", "dateOfBirth", "stayDays"]
        );
    }

    #[test]
    fn field_names_are_unique_per_document() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        for doc in catalog.document_types() {
            let unique: HashSet<&str> = doc.fields.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(unique.len(), doc.fields.len(), "{}", doc.title);
        }
    }

    #[test]
    fn parses_field_kinds() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        let fields = catalog.get_fields("Visa Application").unwrap();
        assert_eq!(fields[0].kind, FieldKind::Text);
        assert_eq!(fields[2].kind, FieldKind::Date);
        assert_eq!(fields[3].kind, FieldKind::Number);
    }

    #[test]
    fn unknown_document_type_has_no_fields() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        assert!(catalog.get_fields("Marriage Certificate").is_none());
    }

    #[test]
    fn rejects_duplicate_field_names() {
        let raw = r#"{"Visa Application": {"fields": [
            {"name": "fullName", "label": "Full Name", "type": "text"},
            {"name": "fullName", "label": "Name Again", "type": "text"}
        ]}}"#;
        match Catalog::from_json_str(raw) {
            Err(AppError::DuplicateField { document, field }) => {
                assert_eq!(document, "Visa Application");
                assert_eq!(field, "fullName");
            }
            other => panic!("expected duplicate field error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_field_kind() {
        let raw = r#"{"Visa Application": {"fields": [
            {"name": "photo", "label": "Photo", "type": "file"}
        ]}}"#;
        assert!(matches!(
            Catalog::from_json_str(raw),
            Err(AppError::CatalogParse { .. })
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Catalog::from_json_str("{\"Visa Application\": "),
            Err(AppError::CatalogParse { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(
            Catalog::load(&path),
            Err(AppError::CatalogNotFound(p)) if p == path
        ));
    }

    #[test]
    fn to_json_round_trips_in_order() {
        let catalog = Catalog::from_json_str(SAMPLE).unwrap();
        let again = Catalog::from_json_str(&catalog.to_json()).unwrap();
        assert_eq!(catalog, again);
        assert!(catalog.to_json().starts_with("{\"Visa Application\""));
    }
}
