use crate::error::{TreeError, TreeResult};
use crate::render::{self, RenderSession};
use crate::strategies::TupleSizeStrategy;
use crate::tree::{Children, NodeKind, TreeBuilder, TypeTree, sequence};
use crate::value::Value;

pub(crate) fn build_tuple<'v>(
    builder: &TreeBuilder,
    value: &'v Value,
    name: String,
) -> TreeResult<TypeTree<'v>> {
    let Value::Tuple(items) = value else {
        return Err(TreeError::UnsupportedType(value.type_name().to_string()));
    };
    build_positional(builder, value, items, name)
}

/// Tuple node over `items`. Under the fixed size strategy every position keeps
/// its own child; otherwise elements are deduplicated like a list's.
pub fn build_positional<'v>(
    builder: &TreeBuilder,
    value: &'v Value,
    items: &'v [Value],
    name: String,
) -> TreeResult<TypeTree<'v>> {
    let size = builder.strategies().tuple_size_strategy();
    let allow_repeated = size == TupleSizeStrategy::Fixed;
    let children = sequence::instantiate_elements(builder, &name, items, allow_repeated)?;
    Ok(TypeTree::new(
        name,
        value,
        NodeKind::Tuple(size),
        Children::Ordered(children),
        builder.strategies().clone(),
    ))
}

pub(crate) fn render_tuple(
    node: &TypeTree<'_>,
    size: TupleSizeStrategy,
    session: &mut RenderSession,
) -> TreeResult<String> {
    session.require("Tuple");
    let types = render::child_types(node, session, size == TupleSizeStrategy::AnySize)?;
    let inner = match (size, types.as_slice()) {
        // an empty example says nothing about the size
        _ if node.children().next().is_none() => "Any, ...".to_string(),
        (TupleSizeStrategy::Fixed, _) => types.join(", "),
        (TupleSizeStrategy::AnySize, [only]) => format!("{only}, ..."),
        (TupleSizeStrategy::AnySize, _) => format!("{}, ...", render::format_union(&types, session)),
    };
    Ok(format!("Tuple[{inner}]"))
}
