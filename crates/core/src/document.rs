//! Schemaless documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{DocumentId, PrincipalId};

/// A document as returned by the store: an id plus free-form fields.
///
/// Collections have no enforced schema; ownership is expressed by whatever
/// field the writer happened to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

impl Document {
    pub fn new(id: DocumentId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(JsonValue::as_str)
    }

    /// True when the field holds the principal id as a string.
    pub fn field_equals(&self, name: &str, principal: &PrincipalId) -> bool {
        self.field_str(name) == Some(principal.as_str())
    }

    /// True when the document is keyed by the principal or any of `fields`
    /// holds the principal id.
    pub fn is_owned_by<'a>(
        &self,
        principal: &PrincipalId,
        mut fields: impl Iterator<Item = &'a str>,
    ) -> bool {
        self.id == *principal || fields.any(|f| self.field_equals(f, principal))
    }
}
