//! Ordered sequences, sets and sampled iterators.
//!
//! All three keep one representative per distinct element shape; near-identical
//! records among the representatives are merged (see [`record::try_merge`]).
use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::{TreeError, TreeResult};
use crate::naming::ChildKey;
use crate::render::{self, RenderSession};
use crate::strategies::ListStrategy;
use crate::tree::{Children, NodeKind, TreeBuilder, TypeTree, record};
use crate::value::Value;

pub(crate) fn build_list<'v>(
    builder: &TreeBuilder,
    value: &'v Value,
    name: String,
) -> TreeResult<TypeTree<'v>> {
    let Value::List(items) = value else {
        return Err(TreeError::UnsupportedType(value.type_name().to_string()));
    };
    build_deduplicated(builder, value, items, name, NodeKind::List)
}

pub(crate) fn build_set<'v>(
    builder: &TreeBuilder,
    value: &'v Value,
    name: String,
) -> TreeResult<TypeTree<'v>> {
    let (items, frozen) = match value {
        Value::Set(items) => (items, false),
        Value::FrozenSet(items) => (items, true),
        other => return Err(TreeError::UnsupportedType(other.type_name().to_string())),
    };
    build_deduplicated(builder, value, items, name, NodeKind::Set { frozen })
}

pub(crate) fn build_iterator<'v>(
    builder: &TreeBuilder,
    value: &'v Value,
    name: String,
) -> TreeResult<TypeTree<'v>> {
    let Value::Iterator(items) = value else {
        return Err(TreeError::UnsupportedType(value.type_name().to_string()));
    };
    build_deduplicated(builder, value, items, name, NodeKind::Iterator)
}

fn build_deduplicated<'v>(
    builder: &TreeBuilder,
    value: &'v Value,
    items: &'v [Value],
    name: String,
    kind: NodeKind,
) -> TreeResult<TypeTree<'v>> {
    let children = instantiate_elements(builder, &name, items, false)?;
    Ok(TypeTree::new(name, value, kind, Children::Ordered(children), builder.strategies().clone()))
}

/// Wrap every element. Unless `allow_repeated`, only the first element of each
/// structural shape is kept and similar records are merged.
pub(crate) fn instantiate_elements<'v>(
    builder: &TreeBuilder,
    parent: &str,
    items: &'v [Value],
    allow_repeated: bool,
) -> TreeResult<Vec<TypeTree<'v>>> {
    let mut children = Vec::with_capacity(items.len());
    for item in items {
        children.push(builder.instantiate_child(parent, ChildKey::Element(item), item)?);
    }
    if !allow_repeated {
        children = dedup(children);
        children = merge_similar_records(children, builder.strategies().merge_similarity_threshold());
    }
    disambiguate(&mut children);
    Ok(children)
}

fn dedup(children: Vec<TypeTree<'_>>) -> Vec<TypeTree<'_>> {
    let mut seen = HashSet::new();
    children
        .into_iter()
        .filter(|child| {
            let fresh = seen.insert(child.structural_hash());
            if !fresh {
                trace!(name = %child.name, "dropped repeated element shape");
            }
            fresh
        })
        .collect()
}

fn merge_similar_records(children: Vec<TypeTree<'_>>, threshold: u32) -> Vec<TypeTree<'_>> {
    let before = children.len();
    let mut out: Vec<TypeTree<'_>> = Vec::with_capacity(before);
    'next: for mut child in children {
        for target in out.iter_mut() {
            match record::try_merge(target, child, threshold) {
                Ok(()) => continue 'next,
                Err(rejected) => child = rejected,
            }
        }
        out.push(child);
    }
    if out.len() != before {
        debug!(before, after = out.len(), threshold, "merged similar records");
    }
    // merging can make two representatives identical
    dedup(out)
}

/// Siblings sharing an alias but not a shape get `2`, `3`, ... suffixes.
fn disambiguate(children: &mut [TypeTree<'_>]) {
    let mut seen: HashMap<String, Vec<u64>> = HashMap::new();
    for child in children.iter_mut() {
        if !child.permission_to_create_alias() {
            continue;
        }
        let hash = child.structural_hash();
        let hashes = seen.entry(child.name.clone()).or_default();
        let ordinal = match hashes.iter().position(|h| *h == hash) {
            Some(i) => i,
            None => {
                hashes.push(hash);
                hashes.len() - 1
            }
        };
        if ordinal > 0 {
            let name = format!("{}{}", child.name, ordinal + 1);
            child.rename(name);
        }
    }
}

pub(crate) fn render_list(node: &TypeTree<'_>, session: &mut RenderSession) -> TreeResult<String> {
    let container = match node.strategies.list_strategy() {
        ListStrategy::List => "List",
        ListStrategy::Sequence => "Sequence",
    };
    session.require(container);
    Ok(format!("{container}[{}]", element_union(node, session)?))
}

pub(crate) fn render_set(
    node: &TypeTree<'_>,
    frozen: bool,
    session: &mut RenderSession,
) -> TreeResult<String> {
    let container = if frozen { "FrozenSet" } else { "Set" };
    session.require(container);
    Ok(format!("{container}[{}]", element_union(node, session)?))
}

pub(crate) fn render_iterator(node: &TypeTree<'_>, session: &mut RenderSession) -> TreeResult<String> {
    session.require("Iterator");
    Ok(format!("Iterator[{}]", element_union(node, session)?))
}

fn element_union(node: &TypeTree<'_>, session: &mut RenderSession) -> TreeResult<String> {
    let types = render::child_types(node, session, true)?;
    Ok(render::format_union(&types, session))
}
