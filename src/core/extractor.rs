//! Schema-driven asset reference extraction.
//!
//! Walks a content document alongside its schema description and collects
//! every value held by an asset-reference field, at any depth. Pure: no I/O.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::domain::{scalar_key, FieldDescriptor, SchemaDescription};

/// Collect the asset ids referenced by `document` according to `schema`.
///
/// Fields declared nested but missing, null or wrongly shaped in the
/// document are skipped. Duplicate ids collapse.
pub fn extract(schema: &SchemaDescription, document: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    walk(schema, document, &mut found);
    found
}

/// Coerce an asset-reference field value into an asset id
pub fn asset_key(value: &Value) -> Option<String> {
    scalar_key(value)
}

fn walk(schema: &SchemaDescription, document: &Value, found: &mut BTreeSet<String>) {
    let Some(fields) = document.as_object() else {
        return;
    };

    for (name, descriptor) in schema.fields() {
        let Some(value) = fields.get(name) else {
            continue;
        };

        match descriptor {
            FieldDescriptor::Object(nested) => walk(nested, value, found),
            FieldDescriptor::ArrayOfObject(nested) => {
                if let Some(items) = value.as_array() {
                    for item in items {
                        walk(nested, item, found);
                    }
                }
            }
            FieldDescriptor::AssetRef => {
                if let Some(id) = asset_key(value) {
                    found.insert(id);
                }
            }
            FieldDescriptor::Scalar => {}
        }
    }
}
