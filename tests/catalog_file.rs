use poa_forms::catalog::Catalog;
use poa_forms::config::Letterhead;
use poa_forms::form::SubmissionValues;
use poa_forms::render::render_document;
use std::collections::HashSet;
use std::path::Path;

fn shipped_catalog() -> Catalog {
    Catalog::load(Path::new(env!("CARGO_MANIFEST_DIR")).join("poa_types.json")).unwrap()
}

#[test]
fn shipped_catalog_loads_with_unique_fields() {
    let catalog = shipped_catalog();
    assert_eq!(catalog.list_document_types()[0], "Visa Application");
    for title in catalog.list_document_types() {
        let fields = catalog.get_fields(title).unwrap();
        assert!(!fields.is_empty(), "{title}");
        let names: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names.len(), fields.len(), "{title}");
    }
}

#[test]
fn every_document_type_renders_one_line_per_field() {
    let catalog = shipped_catalog();
    let generated_at = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    for doc in catalog.document_types() {
        let rendered = render_document(
            &Letterhead::default(),
            doc,
            &SubmissionValues::new(),
            generated_at,
            Path::new("documents"),
        );
        // title, two subheadings, fields, timestamp
        assert_eq!(rendered.lines().len(), doc.fields.len() + 4);
        for field in &doc.fields {
            assert!(rendered.lines().contains(&format!("{}: ", field.label)));
        }
    }
}
