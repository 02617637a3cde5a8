use std::fmt;

use jsonschema::Validator;
use serde_json::Value as JsonValue;

use crate::error::SchemaLoadError;

/// A parsed, meta-validated and compiled JSON Schema.
pub struct SchemaDocument {
    id: String,
    raw: JsonValue,
    validator: Validator,
}

impl SchemaDocument {
    /// Parse `bytes` as the schema named `id`.
    pub fn parse(id: &str, bytes: &[u8]) -> Result<Self, SchemaLoadError> {
        let raw: JsonValue =
            serde_json::from_slice(bytes).map_err(|err| SchemaLoadError::Parse {
                id: id.to_string(),
                reason: err.to_string(),
            })?;
        Self::from_value(id, raw)
    }

    pub fn from_value(id: &str, raw: JsonValue) -> Result<Self, SchemaLoadError> {
        if !raw.is_object() && !raw.is_boolean() {
            return Err(SchemaLoadError::Invalid {
                id: id.to_string(),
                reason: "a schema must be a JSON object or boolean".to_string(),
            });
        }

        jsonschema::meta::validate(&raw).map_err(|err| SchemaLoadError::Invalid {
            id: id.to_string(),
            reason: err.to_string(),
        })?;

        let validator = jsonschema::validator_for(&raw).map_err(|err| SchemaLoadError::Invalid {
            id: id.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            id: id.to_string(),
            raw,
            validator,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn raw(&self) -> &JsonValue {
        &self.raw
    }

    pub(crate) fn validator(&self) -> &Validator {
        &self.validator
    }
}

impl fmt::Debug for SchemaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDocument")
            .field("id", &self.id)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_schema() {
        let doc = SchemaDocument::parse("Empty", br#"{"type": "object", "maxProperties": 0}"#)
            .unwrap();
        assert_eq!(doc.id(), "Empty");
        assert_eq!(doc.raw()["maxProperties"], 0);
    }

    #[test]
    fn rejects_invalid_json() {
        let err = SchemaDocument::parse("Broken", b"{ not json").unwrap_err();
        assert!(matches!(err, SchemaLoadError::Parse { ref id, .. } if id == "Broken"));
    }

    #[test]
    fn rejects_schema_violating_meta_schema() {
        let err = SchemaDocument::parse("BadType", br#"{"type": "banana"}"#).unwrap_err();
        assert!(matches!(err, SchemaLoadError::Invalid { .. }));
        assert!(err.to_string().contains("BadType"));
    }

    #[test]
    fn rejects_non_schema_values() {
        let err = SchemaDocument::parse("Number", b"42").unwrap_err();
        assert!(matches!(err, SchemaLoadError::Invalid { .. }));
    }
}
