//! Parsed request trees, as handed over by the schema/parsing front-end.

use dog_core::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One requested field. Relations carry a nested selection, scalars don't.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionSet>,
}

impl FieldRequest {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            selection: None,
        }
    }

    pub fn relation(name: impl Into<String>, selection: SelectionSet) -> Self {
        Self {
            name: name.into(),
            alias: None,
            selection: Some(selection),
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Key of this field in the assembled result.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet {
    pub fields: Vec<FieldRequest>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection of plain scalar fields.
    pub fn scalars<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names.into_iter().map(FieldRequest::scalar).collect(),
        }
    }

    pub fn field(mut self, field: FieldRequest) -> Self {
        self.fields.push(field);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Depth of the deepest nested selection; a flat selection is 1.
    pub fn depth(&self) -> usize {
        1 + self
            .fields
            .iter()
            .filter_map(|f| f.selection.as_ref())
            .map(SelectionSet::depth)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    /// Equality filter for collection fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

/// A request for one root field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub root_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub arguments: Arguments,
    #[serde(default)]
    pub selection: SelectionSet,
}

impl QueryRequest {
    pub fn new(root_field: impl Into<String>, selection: SelectionSet) -> Self {
        Self {
            root_field: root_field.into(),
            alias: None,
            arguments: Arguments::default(),
            selection,
        }
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.arguments.id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.arguments.data = Some(data);
        self
    }

    pub fn with_filter(mut self, filter: Map<String, Value>) -> Self {
        self.arguments.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.arguments.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.arguments.offset = Some(offset);
        self
    }

    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.root_field)
    }
}
