//! Store-side predicates.
//!
//! A `Predicate` is the only filtering vocabulary the engine speaks to a
//! store. Stores translate it into their own query language (a SQL
//! `WHERE`, a TypeQL `match`, ...) so filtering happens at the source;
//! [`Predicate::matches`] is the reference semantics used by
//! [`MemoryStore`](crate::memory::MemoryStore).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Entity, KeyValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Predicate {
    /// Matches every entity.
    Always,
    /// Matches no entity.
    Never,
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    And { all: Vec<Predicate> },
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::Always
    }
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().collect(),
        }
    }

    /// Conjunction, with `Always` as identity and `Never` absorbing.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Never, _) | (_, Predicate::Never) => Predicate::Never,
            (Predicate::Always, p) | (p, Predicate::Always) => p,
            (Predicate::And { mut all }, Predicate::And { all: rest }) => {
                all.extend(rest);
                Predicate::And { all }
            }
            (Predicate::And { mut all }, p) | (p, Predicate::And { mut all }) => {
                all.push(p);
                Predicate::And { all }
            }
            (a, b) => Predicate::And { all: vec![a, b] },
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Predicate::Never)
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Never => false,
            Predicate::Eq { field, value } => entity
                .value(field)
                .is_some_and(|actual| scalar_eq(&actual, value)),
            Predicate::In { field, values } => entity
                .value(field)
                .is_some_and(|actual| values.iter().any(|v| scalar_eq(&actual, v))),
            Predicate::And { all } => all.iter().all(|p| p.matches(entity)),
        }
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (KeyValue::from_value(a), KeyValue::from_value(b)) {
        (Some(ka), Some(kb)) => ka == kb,
        _ => false,
    }
}
