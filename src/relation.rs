use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A relation field as the platform returns it: sometimes a bare identifier
/// string, sometimes the expanded document, occasionally a partial object
/// left behind by an older write. Deserialization never fails on a relation
/// field; anything that is neither a string nor a well-formed `T` lands in
/// `Raw` and still yields its identifier when one can be extracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationRef<T> {
    Id(String),
    Expanded(Box<T>),
    Raw(Value),
}

/// Documents that carry a platform identifier.
pub trait HasId {
    fn doc_id(&self) -> &str;
}

impl<T> RelationRef<T> {
    pub fn expanded(&self) -> Option<&T> {
        match self {
            RelationRef::Expanded(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self, RelationRef::Expanded(_))
    }
}

impl<T: HasId> RelationRef<T> {
    /// Canonical identifier of the referenced document, or `None` when the
    /// field is empty or malformed. Never panics.
    pub fn id(&self) -> Option<&str> {
        match self {
            RelationRef::Id(s) => non_empty(s),
            RelationRef::Expanded(t) => non_empty(t.doc_id()),
            RelationRef::Raw(v) => value_id(v),
        }
    }
}

impl<T> Default for RelationRef<T> {
    fn default() -> Self {
        RelationRef::Id(String::new())
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Identifier extraction from an untyped value: a bare string or an object
/// with an `$id` attribute. Everything else degrades to `None`.
pub fn value_id(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => non_empty(s),
        Value::Object(map) => map.get("$id").and_then(Value::as_str).and_then(non_empty),
        _ => None,
    }
}

/// Normalize a list of relation fields to identifier strings. Order is
/// preserved, empties are filtered out, duplicates are kept.
pub fn normalize_ids<T: HasId>(refs: &[RelationRef<T>]) -> Vec<String> {
    refs.iter().filter_map(|r| r.id().map(str::to_owned)).collect()
}

/// Like [`normalize_ids`] but deduplicated, keeping the first occurrence.
pub fn distinct_ids<T: HasId>(refs: &[RelationRef<T>]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    refs.iter()
        .filter_map(|r| r.id())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Stub(&'static str);
    impl HasId for Stub {
        fn doc_id(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn id_from_each_shape() {
        assert_eq!(RelationRef::<Stub>::Id("u1".into()).id(), Some("u1"));
        assert_eq!(RelationRef::Expanded(Box::new(Stub("u2"))).id(), Some("u2"));
        let raw: RelationRef<Stub> = RelationRef::Raw(json!({"$id": "u3", "name": "x"}));
        assert_eq!(raw.id(), Some("u3"));
    }

    #[test]
    fn malformed_degrades_to_none() {
        assert_eq!(RelationRef::<Stub>::Id(String::new()).id(), None);
        assert_eq!(RelationRef::<Stub>::Raw(json!(null)).id(), None);
        assert_eq!(RelationRef::<Stub>::Raw(json!(42)).id(), None);
        assert_eq!(RelationRef::<Stub>::Raw(json!({"name": "no id"})).id(), None);
        assert_eq!(RelationRef::<Stub>::Raw(json!({"$id": ""})).id(), None);
    }

    #[test]
    fn normalize_preserves_order_and_duplicates() {
        let refs: Vec<RelationRef<Stub>> = vec![
            RelationRef::Id("a".into()),
            RelationRef::Id(String::new()),
            RelationRef::Id("b".into()),
            RelationRef::Id("a".into()),
        ];
        assert_eq!(normalize_ids(&refs), vec!["a", "b", "a"]);
        assert_eq!(distinct_ids(&refs), vec!["a", "b"]);
    }
}
