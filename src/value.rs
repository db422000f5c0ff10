//! Runtime example values.
//!
//! A closed, tagged model of the values a schema is inferred from: scalars,
//! ordered sequences, sets, tuples, lazily produced iterators (sampled), and
//! mappings with arbitrary hashable keys. `Opaque` stands for an instance of a
//! runtime type the tree only knows by name; it needs a registry entry.
use indexmap::IndexMap;
use ordered_float::OrderedFloat;

/// How many elements of a lazy iterator are materialized by [`Value::sample`].
pub const ITERATOR_SAMPLE_LIMIT: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    FrozenSet(Vec<Value>),
    /// Insertion-ordered entries. Keys are expected to be unique; build through
    /// [`Value::dict`] to get that guarantee.
    Dict(Vec<(Value, Value)>),
    /// Bounded sample of a lazily produced sequence.
    Iterator(Vec<Value>),
    Opaque(String),
}

/// Discriminator the registry dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    None,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Tuple,
    Set,
    FrozenSet,
    Dict,
    Iterator,
    Opaque(String),
}

/// What a JSON array becomes when converting JSON documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayMode {
    #[default]
    List,
    Tuple,
    Set,
}

impl Value {
    /// Build a dict; a repeated key keeps its first position and its last value.
    pub fn dict<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let mut map = IndexMap::<Value, Value>::new();
        for (k, v) in entries {
            map.insert(k, v);
        }
        Value::Dict(map.into_iter().collect())
    }

    /// Materialize at most `limit` elements of a lazy sequence.
    pub fn sample<I>(iter: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Iterator(iter.into_iter().take(limit).collect())
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn float(f: f64) -> Self {
        Value::Float(OrderedFloat(f))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::None => ValueKind::None,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::List(_) => ValueKind::List,
            Value::Tuple(_) => ValueKind::Tuple,
            Value::Set(_) => ValueKind::Set,
            Value::FrozenSet(_) => ValueKind::FrozenSet,
            Value::Dict(_) => ValueKind::Dict,
            Value::Iterator(_) => ValueKind::Iterator,
            Value::Opaque(name) => ValueKind::Opaque(name.clone()),
        }
    }

    /// Runtime type name as the declaration language spells it.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Dict(_) => "dict",
            Value::Iterator(_) => "iterator",
            Value::Opaque(name) => name,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Text used to derive alias names from mapping keys.
    pub fn key_text(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.0.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::List(xs)
            | Value::Tuple(xs)
            | Value::Set(xs)
            | Value::FrozenSet(xs)
            | Value::Iterator(xs) => xs
                .iter()
                .map(Value::key_text)
                .collect::<Vec<_>>()
                .join("_"),
            Value::Dict(entries) => entries
                .iter()
                .map(|(k, _)| k.key_text())
                .collect::<Vec<_>>()
                .join("_"),
            Value::Opaque(name) => name.clone(),
        }
    }

    pub fn from_json(json: serde_json::Value, arrays: ArrayMode) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                // u64 beyond i64 and real floats both land here
                None => Value::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(xs) => {
                let items = xs
                    .into_iter()
                    .map(|x| Value::from_json(x, arrays))
                    .collect::<Vec<_>>();
                match arrays {
                    ArrayMode::List => Value::List(items),
                    ArrayMode::Tuple => Value::Tuple(items),
                    ArrayMode::Set => {
                        let mut unique = Vec::with_capacity(items.len());
                        for item in items {
                            if !unique.contains(&item) {
                                unique.push(item);
                            }
                        }
                        Value::Set(unique)
                    }
                }
            }
            Json::Object(map) => Value::Dict(
                map.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from_json(v, arrays)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json, ArrayMode::List)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_keep_key_order() {
        let v = Value::from(json!({"b": 1, "a": 2.5, "c": null}));
        let Value::Dict(entries) = v else { panic!("expected dict") };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.key_text()).collect();
        assert_eq!(keys, ["b", "a", "c"]);
        assert_eq!(entries[0].1, Value::Int(1));
        assert_eq!(entries[1].1, Value::float(2.5));
        assert_eq!(entries[2].1, Value::None);
    }

    #[test]
    fn arrays_follow_the_requested_mode() {
        let doc = json!([1, 1, "x"]);
        assert!(matches!(Value::from_json(doc.clone(), ArrayMode::Tuple), Value::Tuple(ref xs) if xs.len() == 3));
        let Value::Set(xs) = Value::from_json(doc, ArrayMode::Set) else { panic!("expected set") };
        assert_eq!(xs, vec![Value::Int(1), Value::str("x")]);
    }

    #[test]
    fn dict_constructor_dedups_keys() {
        let v = Value::dict([
            (Value::str("a"), Value::Int(1)),
            (Value::str("b"), Value::Int(2)),
            (Value::str("a"), Value::str("z")),
        ]);
        assert_eq!(
            v,
            Value::Dict(vec![
                (Value::str("a"), Value::str("z")),
                (Value::str("b"), Value::Int(2)),
            ])
        );
    }

    #[test]
    fn iterators_are_sampled() {
        let v = Value::sample((0..1_000).map(Value::Int), ITERATOR_SAMPLE_LIMIT);
        let Value::Iterator(xs) = v else { panic!("expected iterator") };
        assert_eq!(xs.len(), ITERATOR_SAMPLE_LIMIT);
    }

    #[test]
    fn type_names_and_kinds() {
        assert_eq!(Value::FrozenSet(vec![]).type_name(), "frozenset");
        assert_eq!(Value::Opaque("Decimal".into()).type_name(), "Decimal");
        assert_eq!(Value::Opaque("Decimal".into()).kind(), ValueKind::Opaque("Decimal".into()));
        assert_eq!(Value::Tuple(vec![Value::Int(1), Value::str("a")]).key_text(), "1_a");
    }
}
