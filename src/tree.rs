//! Type-tree inference.
//!
//! A [`TypeTree`] is built top-down from one example [`Value`]: the
//! [`TreeBuilder`] looks the value's kind up in its [`Registry`] and either
//! wraps it as a scalar leaf or hands it to a container constructor, which
//! instantiates every child through the same builder before the parent exists.
//!
//! Each node knows:
//! - its alias name (used if it is extracted as a standalone declaration),
//! - its height (scalar 0, container 1 + tallest child),
//! - a cached structural hash used for deduplication and equality checks.
//!
//! Rendering lives in [`crate::render`]; the per-kind pieces live next to the
//! constructors in [`record`], [`sequence`] and [`tuple`].
pub mod record;
pub mod registry;
pub mod sequence;
pub mod tuple;

use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use tracing::trace;

use crate::error::{TreeError, TreeResult};
use crate::naming::{self, ChildKey};
use crate::render::RenderSession;
use crate::strategies::{Strategies, TupleSizeStrategy};
use crate::value::Value;

pub use registry::{Constructor, Registry, Specialization};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Scalar { rendered: String, import: Option<String> },
    /// Mapping rendered as a `TypedDict`.
    Record(RecordProfile),
    /// Mapping rendered as `Dict[K, V]` / `Mapping[K, V]`.
    Mapping,
    List,
    Set { frozen: bool },
    /// Size policy is fixed at construction and drives both rendering and hashing.
    Tuple(TupleSizeStrategy),
    Iterator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordProfile {
    /// Some key is not an identifier: use `N = TypedDict("N", {...})`.
    pub functional_syntax: bool,
    /// Fields missing from some of the merged example records.
    pub optional: BTreeSet<String>,
    pub doc: Option<String>,
}

#[derive(Debug)]
pub enum Children<'v> {
    Leaf,
    Keyed(IndexMap<&'v Value, TypeTree<'v>>),
    Ordered(Vec<TypeTree<'v>>),
}

#[derive(Debug)]
pub struct TypeTree<'v> {
    pub(crate) name: String,
    pub(crate) value: &'v Value,
    pub(crate) kind: NodeKind,
    pub(crate) children: Children<'v>,
    pub(crate) strategies: Arc<Strategies>,
    pub(crate) height: usize,
    hash: OnceCell<u64>,
}

impl<'v> TypeTree<'v> {
    pub(crate) fn new(
        name: String,
        value: &'v Value,
        kind: NodeKind,
        children: Children<'v>,
        strategies: Arc<Strategies>,
    ) -> Self {
        let height = match &children {
            Children::Leaf => 0,
            Children::Keyed(map) => 1 + map.values().map(|c| c.height).max().unwrap_or(0),
            Children::Ordered(xs) => 1 + xs.iter().map(|c| c.height).max().unwrap_or(0),
        };
        Self { name, value, kind, children, strategies, height, hash: OnceCell::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &'v Value {
        self.value
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar { .. })
    }

    /// Children in declaration order. Restartable: each call starts over.
    pub fn children(&self) -> Box<dyn Iterator<Item = &TypeTree<'v>> + '_> {
        match &self.children {
            Children::Leaf => Box::new(std::iter::empty()),
            Children::Keyed(map) => Box::new(map.values()),
            Children::Ordered(xs) => Box::new(xs.iter()),
        }
    }

    pub(crate) fn children_mut(&mut self) -> Box<dyn Iterator<Item = &mut TypeTree<'v>> + '_> {
        match &mut self.children {
            Children::Leaf => Box::new(std::iter::empty()),
            Children::Keyed(map) => Box::new(map.values_mut()),
            Children::Ordered(xs) => Box::new(xs.iter_mut()),
        }
    }

    /// Child reached through mapping key `key`.
    pub fn field(&self, key: &Value) -> Option<&TypeTree<'v>> {
        match &self.children {
            Children::Keyed(map) => map.get(key),
            _ => None,
        }
    }

    /// Whether this node becomes a standalone named declaration instead of
    /// being inlined where it is used.
    pub fn permission_to_create_alias(&self) -> bool {
        match self.kind {
            NodeKind::Scalar { .. } => false,
            NodeKind::Record(_) => true,
            _ => self.height >= self.strategies.min_height_to_define_type_alias(),
        }
    }

    pub fn structural_hash(&self) -> u64 {
        *self.hash.get_or_init(|| self.compute_hash())
    }

    pub(crate) fn invalidate_hash(&mut self) {
        self.hash.take();
    }

    pub fn alias_name_for_child(&self, key: &ChildKey<'_>) -> String {
        naming::child_alias_name(&self.name, key)
    }

    /// Rename this node and every descendant whose alias derives from it.
    pub(crate) fn rename(&mut self, name: String) {
        let old = std::mem::replace(&mut self.name, name);
        let new = self.name.clone();
        for child in self.children_mut() {
            if let Some(suffix) = child.name.strip_prefix(old.as_str()) {
                let renamed = format!("{new}{suffix}");
                child.rename(renamed);
            }
        }
    }

    /// The declaration of this node, lvalue included.
    pub fn render_self(&self, session: &mut RenderSession) -> TreeResult<String> {
        match &self.kind {
            NodeKind::Record(profile) => record::render_typed_dict(self, profile, session),
            _ => Ok(format!("{} = {}", self.name, self.render_inline(session)?)),
        }
    }

    /// The type expression of this node as written at a use site.
    pub fn render_inline(&self, session: &mut RenderSession) -> TreeResult<String> {
        match &self.kind {
            NodeKind::Scalar { rendered, import } => {
                if let Some(symbol) = import {
                    session.require(symbol);
                }
                Ok(rendered.clone())
            }
            // never inlined: records always get an alias
            NodeKind::Record(_) => Ok(self.name.clone()),
            NodeKind::Mapping => record::render_mapping(self, session),
            NodeKind::List => sequence::render_list(self, session),
            NodeKind::Set { frozen } => sequence::render_set(self, *frozen, session),
            NodeKind::Iterator => sequence::render_iterator(self, session),
            NodeKind::Tuple(size) => tuple::render_tuple(self, *size, session),
        }
    }

    fn compute_hash(&self) -> u64 {
        let mut h = DefaultHasher::new();
        match &self.kind {
            NodeKind::Scalar { rendered, .. } => {
                "scalar".hash(&mut h);
                rendered.hash(&mut h);
            }
            NodeKind::Record(profile) => {
                "typed_dict".hash(&mut h);
                record::field_fingerprints(self, profile).hash(&mut h);
            }
            NodeKind::Mapping => {
                "mapping".hash(&mut h);
                record::key_type_set(self).hash(&mut h);
                self.unordered_child_hashes().hash(&mut h);
            }
            NodeKind::List => {
                "list".hash(&mut h);
                self.unordered_child_hashes().hash(&mut h);
            }
            NodeKind::Set { frozen } => {
                "set".hash(&mut h);
                frozen.hash(&mut h);
                self.unordered_child_hashes().hash(&mut h);
            }
            NodeKind::Iterator => {
                "iterator".hash(&mut h);
                self.unordered_child_hashes().hash(&mut h);
            }
            NodeKind::Tuple(TupleSizeStrategy::Fixed) => {
                "tuple".hash(&mut h);
                self.ordered_child_hashes().hash(&mut h);
            }
            NodeKind::Tuple(TupleSizeStrategy::AnySize) => {
                "tuple".hash(&mut h);
                self.unordered_child_hashes().hash(&mut h);
            }
        }
        h.finish()
    }

    fn ordered_child_hashes(&self) -> Vec<u64> {
        self.children().map(TypeTree::structural_hash).collect()
    }

    /// Distinct child hashes, with `int` absorbed by `float` the same way the
    /// rendered union absorbs it.
    fn unordered_child_hashes(&self) -> BTreeSet<u64> {
        let has_float = self.children().any(|c| c.is_scalar_named("float"));
        self.children()
            .filter(|c| !(has_float && c.is_scalar_named("int")))
            .map(TypeTree::structural_hash)
            .collect()
    }

    fn is_scalar_named(&self, name: &str) -> bool {
        matches!(&self.kind, NodeKind::Scalar { rendered, .. } if rendered == name)
    }
}

/// Dispatches values to node specializations.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    strategies: Arc<Strategies>,
    registry: Registry,
}

impl TreeBuilder {
    pub fn new(strategies: impl Into<Arc<Strategies>>) -> Self {
        Self::with_registry(strategies, Registry::default())
    }

    pub fn with_registry(strategies: impl Into<Arc<Strategies>>, registry: Registry) -> Self {
        Self { strategies: strategies.into(), registry }
    }

    pub fn strategies(&self) -> &Arc<Strategies> {
        &self.strategies
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Build the tree for a top-level value. `name` must be an identifier.
    pub fn build<'v>(&self, value: &'v Value, name: &str) -> TreeResult<TypeTree<'v>> {
        if !naming::is_identifier(name) {
            return Err(TreeError::InvalidIdentifier(name.to_string()));
        }
        self.instantiate(value, name.to_string())
    }

    /// Wrap `value` in the node kind registered for it.
    pub fn instantiate<'v>(&self, value: &'v Value, name: String) -> TreeResult<TypeTree<'v>> {
        let node = match self.registry.get(&value.kind()) {
            Some(Specialization::Scalar { rendered, import }) => TypeTree::new(
                name,
                value,
                NodeKind::Scalar { rendered: rendered.clone(), import: import.clone() },
                Children::Leaf,
                Arc::clone(&self.strategies),
            ),
            Some(Specialization::Container(constructor)) => constructor(self, value, name)?,
            None => return Err(TreeError::UnsupportedType(value.type_name().to_string())),
        };
        trace!(name = %node.name, kind = ?node.kind, height = node.height, "instantiated node");
        Ok(node)
    }

    /// Instantiate a child named after its parent and `key`.
    pub fn instantiate_child<'v>(
        &self,
        parent: &str,
        key: ChildKey<'_>,
        value: &'v Value,
    ) -> TreeResult<TypeTree<'v>> {
        let name = naming::child_alias_name(parent, &key);
        let valid = naming::is_identifier(&name);
        let node = self.instantiate(value, name)?;
        if !valid && node.permission_to_create_alias() {
            return Err(TreeError::InvalidIdentifier(key.describe()));
        }
        Ok(node)
    }
}

/// Infer the type tree of `value`, to be declared as `name`.
pub fn build_tree<'v>(
    value: &'v Value,
    name: &str,
    strategies: impl Into<Arc<Strategies>>,
) -> TreeResult<TypeTree<'v>> {
    TreeBuilder::new(strategies).build(value, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::DictStrategy;
    use serde_json::json;

    fn tree_of(value: &Value) -> TypeTree<'_> {
        build_tree(value, "Example", Strategies::default()).unwrap()
    }

    #[test]
    fn heights_and_alias_permission() {
        let value = Value::from(json!({"list": [1, 2, 3], "int": 10, "empty": []}));
        let tree = tree_of(&value);
        assert_eq!(tree.height(), 2);
        assert!(tree.permission_to_create_alias());

        let list = tree.field(&Value::str("list")).unwrap();
        assert_eq!(list.name(), "ExampleList");
        assert_eq!(list.height(), 1);
        assert!(list.permission_to_create_alias());

        let int = tree.field(&Value::str("int")).unwrap();
        assert!(int.is_scalar());
        assert_eq!(int.height(), 0);
        assert!(!int.permission_to_create_alias());

        assert_eq!(tree.field(&Value::str("empty")).unwrap().height(), 1);
    }

    #[test]
    fn min_height_controls_inlining_but_not_records() {
        let strategies = Strategies::builder().min_height_to_define_type_alias(3).build().unwrap();
        let value = Value::from(json!({"xs": [1], "inner": {"a": 1}}));
        let tree = build_tree(&value, "Example", strategies).unwrap();
        assert!(!tree.field(&Value::str("xs")).unwrap().permission_to_create_alias());
        assert!(tree.field(&Value::str("inner")).unwrap().permission_to_create_alias());
    }

    #[test]
    fn non_string_keys_fall_back_to_mapping() {
        let value = Value::dict([(Value::Int(1), Value::str("a"))]);
        let tree = tree_of(&value);
        assert_eq!(tree.kind(), &NodeKind::Mapping);

        let strategies = Strategies::builder().dict_strategy(DictStrategy::Mapping).build().unwrap();
        let value = Value::from(json!({"a": 1}));
        let tree = build_tree(&value, "Example", strategies).unwrap();
        assert_eq!(tree.kind(), &NodeKind::Mapping);
    }

    #[test]
    fn record_hash_ignores_field_order() {
        let a = Value::from(json!({"x": 1, "y": "s", "z": [1.5]}));
        let b = Value::from(json!({"z": [2.5], "x": 7, "y": "t"}));
        assert_eq!(tree_of(&a).structural_hash(), tree_of(&b).structural_hash());

        let c = Value::from(json!({"x": 1, "y": "s", "z": ["no"]}));
        assert_ne!(tree_of(&a).structural_hash(), tree_of(&c).structural_hash());
    }

    #[test]
    fn fixed_tuple_hash_is_positional() {
        let a = Value::Tuple(vec![Value::Int(1), Value::str("a")]);
        let b = Value::Tuple(vec![Value::str("a"), Value::Int(1)]);
        assert_ne!(tree_of(&a).structural_hash(), tree_of(&b).structural_hash());

        let any_size = Strategies::builder()
            .tuple_size_strategy(TupleSizeStrategy::AnySize)
            .build()
            .map(Arc::new)
            .unwrap();
        let ha = build_tree(&a, "Example", Arc::clone(&any_size)).unwrap().structural_hash();
        let hb = build_tree(&b, "Example", any_size).unwrap().structural_hash();
        assert_eq!(ha, hb);
    }

    #[test]
    fn set_hash_ignores_element_order() {
        let a = Value::Set(vec![Value::Int(1), Value::str("a"), Value::float(0.5)]);
        let b = Value::Set(vec![Value::float(0.5), Value::str("a"), Value::Int(1)]);
        assert_eq!(tree_of(&a).structural_hash(), tree_of(&b).structural_hash());
        let frozen = Value::FrozenSet(vec![Value::Int(1), Value::str("a"), Value::float(0.5)]);
        assert_ne!(tree_of(&a).structural_hash(), tree_of(&frozen).structural_hash());
    }

    #[test]
    fn repeated_elements_collapse_to_one_child() {
        let one = Value::from(json!([{"a": 1}]));
        let many = Value::from(json!([{"a": 1}, {"a": 2}, {"a": 3}]));
        let t_one = tree_of(&one);
        let t_many = tree_of(&many);
        assert_eq!(t_many.children().count(), 1);
        assert_eq!(t_one.structural_hash(), t_many.structural_hash());
    }

    #[test]
    fn mapping_hash_follows_the_rendered_key_and_value_unions() {
        let mapping = Arc::new(Strategies::builder().dict_strategy(DictStrategy::Mapping).build().unwrap());
        let hash = |v: serde_json::Value| {
            let value = Value::from(v);
            let tree = build_tree(&value, "Example", Arc::clone(&mapping)).unwrap();
            tree.structural_hash()
        };
        let small = hash(json!({"a": 3}));
        assert_eq!(hash(json!({"a": 1, "b": 2})), small);
        assert_eq!(hash(json!({"b": 4, "a": 5, "c": 6})), small);
        assert_ne!(hash(json!({"a": "x"})), small);
    }

    #[test]
    fn widened_sequences_hash_like_their_float_form() {
        let mixed = Value::from(json!([1, 2.5]));
        let floats = Value::from(json!([2.5]));
        let ints = Value::from(json!([1]));
        assert_eq!(tree_of(&mixed).structural_hash(), tree_of(&floats).structural_hash());
        assert_ne!(tree_of(&ints).structural_hash(), tree_of(&floats).structural_hash());

        let fixed_mixed = Value::Tuple(vec![Value::Int(1), Value::float(2.5)]);
        let fixed_floats = Value::Tuple(vec![Value::float(1.0), Value::float(2.5)]);
        assert_ne!(tree_of(&fixed_mixed).structural_hash(), tree_of(&fixed_floats).structural_hash());
    }

    #[test]
    fn hashes_are_deterministic() {
        let value = Value::from(json!({"a": [1, {"b": [null, 2.5]}], "c": "x"}));
        assert_eq!(tree_of(&value).structural_hash(), tree_of(&value).structural_hash());
    }

    #[test]
    fn root_name_must_be_an_identifier() {
        let value = Value::Int(1);
        for bad in ["not valid", "1st", "class", ""] {
            let err = build_tree(&value, bad, Strategies::default()).unwrap_err();
            assert_eq!(err, TreeError::InvalidIdentifier(bad.to_string()));
        }
    }

    #[test]
    fn unicode_and_symbol_keys_still_get_alias_names() {
        let value = Value::from(json!({"名前": {"a": 1}, "$": {"b": "x"}}));
        let tree = tree_of(&value);
        assert_eq!(tree.field(&Value::str("名前")).unwrap().name(), "Example名前");
        assert_eq!(tree.field(&Value::str("$")).unwrap().name(), "ExampleField2");
    }

    #[test]
    fn child_names_go_through_the_parent() {
        let value = Value::from(json!({"inner": {"a": [1]}}));
        let tree = tree_of(&value);
        let key = Value::str("inner");
        let inner = tree.field(&key).unwrap();
        assert_eq!(inner.name(), tree.alias_name_for_child(&ChildKey::Field(&key, 0)));
    }

    #[test]
    fn unregistered_kinds_are_rejected() {
        let value = Value::from(json!({"when": null}));
        let Value::Dict(mut entries) = value else { unreachable!() };
        entries[0].1 = Value::Opaque("datetime".into());
        let value = Value::Dict(entries);
        let err = build_tree(&value, "Example", Strategies::default()).unwrap_err();
        assert_eq!(err, TreeError::UnsupportedType("datetime".into()));
    }

    #[test]
    fn rename_carries_descendants() {
        let value = Value::from(json!({"inner": {"deep": [1]}}));
        let mut tree = tree_of(&value);
        tree.rename("Other".into());
        let inner = tree.field(&Value::str("inner")).unwrap();
        assert_eq!(inner.name(), "OtherInner");
        assert_eq!(inner.field(&Value::str("deep")).unwrap().name(), "OtherInnerDeep");
    }
}
