//! Generic addressable records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name under which every entity exposes its id.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Hashable, normalized form of a scalar used to join entities.
///
/// Strings, numbers and booleans normalize to their textual form so an
/// owner id stored as `7` matches a principal id `"7"`. Null, arrays and
/// objects have no key form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyValue(String);

impl KeyValue {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&EntityId> for KeyValue {
    fn from(id: &EntityId) -> Self {
        Self(id.0.clone())
    }
}

/// A record of some entity type, as handed out by the persistence layer.
///
/// Scalars and foreign-key values share `fields`; which of them act as
/// foreign keys is declared by the relation catalog, not by the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "__typename")]
    pub entity_type: String,
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Value of `name`, with `id` answered from the entity id.
    pub fn value(&self, name: &str) -> Option<Value> {
        if name == ID_FIELD {
            return Some(Value::String(self.id.0.clone()));
        }
        self.fields.get(name).cloned()
    }

    /// Join key held in `name`, if the field is present and scalar.
    pub fn key(&self, name: &str) -> Option<KeyValue> {
        if name == ID_FIELD {
            return Some(KeyValue::from(&self.id));
        }
        self.fields.get(name).and_then(KeyValue::from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_normalize_scalars() {
        assert_eq!(KeyValue::from_value(&json!(7)), Some(KeyValue::new("7")));
        assert_eq!(KeyValue::from_value(&json!("7")), Some(KeyValue::new("7")));
        assert_eq!(KeyValue::from_value(&json!(null)), None);
        assert_eq!(KeyValue::from_value(&json!([1])), None);
    }

    #[test]
    fn id_is_answered_from_the_entity() {
        let post = Entity::new("Post", "1").with_field("ownerId", 7);
        assert_eq!(post.key("id"), Some(KeyValue::new("1")));
        assert_eq!(post.key("ownerId"), Some(KeyValue::new("7")));
        assert_eq!(post.key("missing"), None);
        assert_eq!(post.value("id"), Some(json!("1")));
    }

    #[test]
    fn serializes_flat_with_typename() {
        let post = Entity::new("Post", "1").with_field("title", "hi");
        let v = serde_json::to_value(&post).unwrap();
        assert_eq!(v, json!({"__typename": "Post", "id": "1", "title": "hi"}));
    }
}
