//! Mappings: `TypedDict` records and generic `Dict`/`Mapping` fallbacks.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{TreeError, TreeResult};
use crate::naming::{self, ChildKey};
use crate::render::{self, RenderSession, TAB};
use crate::strategies::DictStrategy;
use crate::tree::{Children, NodeKind, RecordProfile, TreeBuilder, TypeTree};
use crate::value::Value;

pub(crate) fn build_dict<'v>(
    builder: &TreeBuilder,
    value: &'v Value,
    name: String,
) -> TreeResult<TypeTree<'v>> {
    let Value::Dict(entries) = value else {
        return Err(TreeError::UnsupportedType(value.type_name().to_string()));
    };
    let mut fields = IndexMap::with_capacity(entries.len());
    for (position, (key, item)) in entries.iter().enumerate() {
        let child = builder.instantiate_child(&name, ChildKey::Field(key, position), item)?;
        fields.insert(key, child);
    }
    let strategies = builder.strategies();
    let string_keys = entries.iter().all(|(k, _)| matches!(k, Value::Str(_)));
    let kind = if strategies.dict_strategy() == DictStrategy::TypedDict && string_keys {
        let doc_key = strategies.key_used_as_doc();
        let doc = entries
            .iter()
            .find(|(k, _)| !doc_key.is_empty() && k.as_str() == Some(doc_key))
            .and_then(|(_, v)| v.as_str())
            .map(str::to_string);
        NodeKind::Record(RecordProfile {
            functional_syntax: entries.iter().any(|(k, _)| !k.as_str().is_some_and(naming::is_identifier)),
            optional: BTreeSet::new(),
            doc,
        })
    } else {
        NodeKind::Mapping
    };
    Ok(TypeTree::new(name, value, kind, Children::Keyed(fields), strategies.clone()))
}

fn fields<'a, 'v>(node: &'a TypeTree<'v>) -> impl Iterator<Item = (&'v Value, &'a TypeTree<'v>)> + 'a {
    let map = match &node.children {
        Children::Keyed(map) => Some(map),
        _ => None,
    };
    map.into_iter().flat_map(|m| m.iter().map(|(k, c)| (*k, c)))
}

/// Sorted `(field, required, hash)` triples; field order does not matter.
pub(crate) fn field_fingerprints(node: &TypeTree<'_>, profile: &RecordProfile) -> Vec<(String, bool, u64)> {
    let mut out: Vec<_> = fields(node)
        .map(|(key, child)| {
            let key = key.key_text();
            let required = !profile.optional.contains(&key);
            (key, required, child.structural_hash())
        })
        .collect();
    out.sort();
    out
}

pub(crate) fn key_type_set(node: &TypeTree<'_>) -> BTreeSet<String> {
    fields(node).map(|(key, _)| key.type_name().to_string()).collect()
}

pub(crate) fn render_typed_dict(
    node: &TypeTree<'_>,
    profile: &RecordProfile,
    session: &mut RenderSession,
) -> TreeResult<String> {
    session.require("TypedDict");
    let read_only = node.strategies.typed_dict_read_only_values();
    let mut rows = Vec::new();
    for (key, child) in fields(node) {
        let key = key.key_text();
        let mut ty = session.type_ref(child)?;
        if read_only {
            session.require("ReadOnly");
            ty = format!("ReadOnly[{ty}]");
        }
        if profile.optional.contains(&key) {
            session.require("NotRequired");
            ty = format!("NotRequired[{ty}]");
        }
        rows.push((key, ty));
    }

    let name = &node.name;
    let mut out = String::new();
    if profile.functional_syntax {
        out.push_str(&format!("{name} = TypedDict(\n{TAB}\"{name}\",\n{TAB}{{\n"));
        for (key, ty) in &rows {
            out.push_str(&format!("{TAB}{TAB}\"{}\": {ty},\n", escape(key)));
        }
        out.push_str(&format!("{TAB}}},\n)"));
        return Ok(out);
    }

    out.push_str(&format!("class {name}(TypedDict):"));
    if let Some(doc) = &profile.doc {
        out.push_str(&format!("\n{TAB}\"\"\"{}\"\"\"", escape(doc)));
    }
    for (key, ty) in &rows {
        out.push_str(&format!("\n{TAB}{key}: {ty}"));
    }
    if rows.is_empty() && profile.doc.is_none() {
        out.push_str(&format!("\n{TAB}pass"));
    }
    Ok(out)
}

/// Python string-literal escaping, valid inside both `"..."` and `"""..."""`.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn render_mapping(node: &TypeTree<'_>, session: &mut RenderSession) -> TreeResult<String> {
    let container = match node.strategies.dict_strategy() {
        DictStrategy::Mapping => "Mapping",
        DictStrategy::TypedDict | DictStrategy::Dict => "Dict",
    };
    session.require(container);
    let keys = render::collect_types(fields(node).map(|(k, _)| k.type_name().to_string()), true, session);
    let keys = render::format_union(&keys, session);
    let values = render::child_types(node, session, true)?;
    let values = render::format_union(&values, session);
    Ok(format!("{container}[{keys}, {values}]"))
}

fn field_names(node: &TypeTree<'_>) -> BTreeSet<String> {
    fields(node).map(|(k, _)| k.key_text()).collect()
}

fn mergeable(target: &TypeTree<'_>, other: &TypeTree<'_>, threshold: u32) -> bool {
    if !matches!(target.kind, NodeKind::Record(_)) || !matches!(other.kind, NodeKind::Record(_)) {
        return false;
    }
    let (Children::Keyed(left), Children::Keyed(right)) = (&target.children, &other.children) else {
        return false;
    };
    let mut shared = 0usize;
    for (key, child) in left {
        if let Some(theirs) = right.get(key) {
            if theirs.structural_hash() != child.structural_hash() {
                return false;
            }
            shared += 1;
        }
    }
    let union = left.len() + right.len() - shared;
    union > 0 && shared * 100 >= threshold as usize * union
}

/// Fold `other` into `target` when their field sets overlap enough and agree on
/// every shared field. Hands `other` back untouched otherwise.
pub(crate) fn try_merge<'v>(
    target: &mut TypeTree<'v>,
    other: TypeTree<'v>,
    threshold: u32,
) -> Result<(), TypeTree<'v>> {
    if !mergeable(target, &other, threshold) {
        return Err(other);
    }
    let left_names = field_names(target);
    let right_names = field_names(&other);
    let TypeTree { name: other_name, kind: other_kind, children: other_children, height: other_height, .. } = other;
    let (NodeKind::Record(theirs), Children::Keyed(their_fields)) = (other_kind, other_children) else {
        return Ok(());
    };
    let (NodeKind::Record(ours), Children::Keyed(our_fields)) = (&mut target.kind, &mut target.children) else {
        return Ok(());
    };

    ours.optional.extend(theirs.optional);
    ours.optional.extend(left_names.symmetric_difference(&right_names).cloned());
    ours.functional_syntax |= theirs.functional_syntax;
    if ours.doc.is_none() {
        ours.doc = theirs.doc;
    }
    for (key, mut child) in their_fields {
        if our_fields.contains_key(key) {
            continue;
        }
        if other_name != target.name {
            if let Some(suffix) = child.name.strip_prefix(other_name.as_str()) {
                let renamed = format!("{}{suffix}", target.name);
                child.rename(renamed);
            }
        }
        our_fields.insert(key, child);
    }
    let field_count = our_fields.len();
    target.height = target.height.max(other_height);
    target.invalidate_hash();
    debug!(name = %target.name, fields = field_count, "merged record shapes");
    Ok(())
}
