//! Change sets and their persisted shape
//!
//! A `ChangeSet` is what the diff engine produces for one event. The
//! `ChangePayload` is how that change set is stored on a log entry: an
//! ordered map from field name to either an `[old, new]` pair or a
//! relation change object.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// String-keyed map that keeps insertion order through serialization
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, keeping the original position on replace
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Direction of a multi-valued relation change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationOperation {
    Add,
    Remove,
}

impl fmt::Display for RelationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationOperation::Add => write!(f, "add"),
            RelationOperation::Remove => write!(f, "remove"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    M2m,
}

/// Stored form of a relation change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationPayload {
    #[serde(rename = "type")]
    pub kind: RelationKind,
    pub operation: RelationOperation,
    pub objects: Vec<String>,
    #[serde(default)]
    pub pks: Vec<String>,
}

/// One value in a change payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeValue {
    /// `[old, new]` for a scalar field
    Field(Value, Value),
    Relation(RelationPayload),
}

/// Persisted change map of a log entry, in field declaration order
pub type ChangePayload = OrderedMap<ChangeValue>;

/// Masked full-state snapshot attached to an entry
pub type StateSnapshot = OrderedMap<Value>;

/// A single field that changed, normalized and masked
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub label: String,
    pub old: Value,
    pub new: Value,
}

/// Members added to or removed from a multi-valued relation
#[derive(Debug, Clone, PartialEq)]
pub struct RelationChange {
    pub field: String,
    pub label: String,
    pub operation: RelationOperation,
    /// Human-readable representations of the affected related records
    pub objects: Vec<String>,
    pub pks: Vec<String>,
}

impl RelationChange {
    pub fn payload(&self) -> ChangePayload {
        let mut payload = ChangePayload::new();
        payload.insert(
            self.field.clone(),
            ChangeValue::Relation(RelationPayload {
                kind: RelationKind::M2m,
                operation: self.operation,
                objects: self.objects.clone(),
                pks: self.pks.clone(),
            }),
        );
        payload
    }
}

/// Diff result for one lifecycle event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
    full_state: Option<StateSnapshot>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, change: FieldChange) {
        self.changes.push(change);
    }

    pub(crate) fn set_full_state(&mut self, state: StateSnapshot) {
        self.full_state = Some(state);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.field.as_str())
    }

    pub fn full_state(&self) -> Option<&StateSnapshot> {
        self.full_state.as_ref()
    }

    pub fn take_full_state(&mut self) -> Option<StateSnapshot> {
        self.full_state.take()
    }

    pub fn payload(&self) -> ChangePayload {
        self.changes
            .iter()
            .map(|c| {
                (
                    c.field.clone(),
                    ChangeValue::Field(c.old.clone(), c.new.clone()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ordered_map_keeps_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert("zeta", 1);
        map.insert("alpha", 2);
        map.insert("mid", 3);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":2,"mid":3}"#);

        let back: OrderedMap<i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("a", 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().next(), Some(("a", &3)));
    }

    #[test]
    fn test_field_change_serializes_as_pair() {
        let mut set = ChangeSet::new();
        set.push(FieldChange {
            field: "title".into(),
            label: "title".into(),
            old: json!("A"),
            new: json!("B"),
        });
        let json = serde_json::to_value(set.payload()).unwrap();
        assert_eq!(json, json!({"title": ["A", "B"]}));
    }

    #[test]
    fn test_relation_payload_shape() {
        let change = RelationChange {
            field: "tags".into(),
            label: "tags".into(),
            operation: RelationOperation::Remove,
            objects: vec!["rust".into()],
            pks: vec!["3".into()],
        };
        let json = serde_json::to_value(change.payload()).unwrap();
        assert_eq!(
            json,
            json!({"tags": {"type": "m2m", "operation": "remove", "objects": ["rust"], "pks": ["3"]}})
        );

        let back: ChangePayload = serde_json::from_value(json).unwrap();
        assert!(matches!(back.get("tags"), Some(ChangeValue::Relation(_))));
    }

    #[test]
    fn test_pair_deserializes_as_field() {
        let back: ChangePayload = serde_json::from_str(r#"{"views":[1,2]}"#).unwrap();
        assert_eq!(
            back.get("views"),
            Some(&ChangeValue::Field(json!(1), json!(2)))
        );
    }
}
