//! Schema descriptions, reduced to what reference extraction needs.
//!
//! A content schema is a JSON schema whose properties may nest objects
//! (`properties`), arrays of objects (`items.properties`) or mark a field as an
//! asset reference (`_backboneForms: "Asset"` or `_backboneForms.type: "Asset"`).
//! Parsing classifies every field into exactly one [`FieldDescriptor`] variant so
//! the extractor never has to inspect attribute shapes itself.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Type tag that marks a field as an asset reference
pub const ASSET_TYPE_TAG: &str = "Asset";

/// Editor hint key carrying the asset type tag
const EDITOR_HINT_KEY: &str = "_backboneForms";

/// Field name to descriptor mapping for one (sub-)object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDescription(BTreeMap<String, FieldDescriptor>);

/// What a single schema field describes
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDescriptor {
    /// Opaque value; never recursed into
    Scalar,

    /// Sub-object described by a nested schema
    Object(SchemaDescription),

    /// Array whose elements are each described by a nested schema
    ArrayOfObject(SchemaDescription),

    /// Holds a single asset identifier; terminal
    AssetRef,
}

impl SchemaDescription {
    /// Create an empty description
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder style)
    pub fn with_field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.0.insert(name.into(), descriptor);
        self
    }

    /// Parse either a full schema (with a top-level `properties` map) or a
    /// bare property map.
    pub fn from_json(value: &Value) -> Self {
        match value.as_object() {
            Some(obj) if is_full_schema(obj) => obj
                .get("properties")
                .map(Self::from_properties)
                .unwrap_or_default(),
            Some(_) => Self::from_properties(value),
            None => Self::default(),
        }
    }

    /// Parse a property map (field name to raw descriptor)
    pub fn from_properties(value: &Value) -> Self {
        let fields = value
            .as_object()
            .map(|props| {
                props
                    .iter()
                    .map(|(name, raw)| (name.clone(), FieldDescriptor::classify(raw)))
                    .collect()
            })
            .unwrap_or_default();
        Self(fields)
    }

    /// Iterate fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.0.iter().map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FieldDescriptor {
    /// Classify a raw descriptor.
    ///
    /// Precedence: `properties`, then `items.properties`, then the asset tag.
    /// Anything else is a scalar.
    pub fn classify(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return FieldDescriptor::Scalar;
        };

        if let Some(props @ Value::Object(_)) = obj.get("properties") {
            return FieldDescriptor::Object(SchemaDescription::from_properties(props));
        }

        if let Some(props @ Value::Object(_)) = obj.get("items").and_then(|items| items.get("properties")) {
            return FieldDescriptor::ArrayOfObject(SchemaDescription::from_properties(props));
        }

        if is_asset_tagged(obj) {
            return FieldDescriptor::AssetRef;
        }

        FieldDescriptor::Scalar
    }
}

fn is_asset_tagged(obj: &Map<String, Value>) -> bool {
    match obj.get(EDITOR_HINT_KEY) {
        Some(Value::String(tag)) => tag == ASSET_TYPE_TAG,
        Some(Value::Object(hint)) => hint.get("type").and_then(Value::as_str) == Some(ASSET_TYPE_TAG),
        _ => false,
    }
}

// A top-level `properties` object is only the schema body when nothing else on
// the object looks like a field descriptor, or the object declares itself a
// JSON schema.
fn is_full_schema(obj: &Map<String, Value>) -> bool {
    if !matches!(obj.get("properties"), Some(Value::Object(_))) {
        return false;
    }
    if obj.get("type").and_then(Value::as_str) == Some("object") {
        return true;
    }
    obj.iter()
        .filter(|(key, _)| key.as_str() != "properties")
        .all(|(key, value)| key.starts_with('$') || !value.is_object())
}
