//! Declaration rendering.
//!
//! Rendering is a post-order walk: every aliased descendant is declared before
//! the declaration that refers to it, and the root is always declared last.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{TreeError, TreeResult};
use crate::imports::{DEFAULT_LINE_LENGTH, ImportManager};
use crate::tree::TypeTree;

pub const HEADER: &str = "# Class automatically generated. DO NOT MODIFY.";
pub const TAB: &str = "    ";

/// Output of [`render`]: the declarations plus the symbols they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Declarations in dependency order, separated by one blank line.
    pub declarations: String,
    /// Unresolved import symbols (`List`, `decimal.Decimal`, ...).
    pub imports: BTreeSet<String>,
}

impl Rendered {
    pub fn format_imports(&self, line_length: usize) -> String {
        let mut manager = ImportManager::new();
        manager.extend(self.imports.iter().cloned());
        manager.format(line_length)
    }

    /// Complete module text: header, imports, declarations.
    pub fn to_module(&self) -> String {
        let imports = self.format_imports(DEFAULT_LINE_LENGTH);
        let mut out = String::with_capacity(HEADER.len() + imports.len() + self.declarations.len() + 4);
        out.push_str(HEADER);
        out.push('\n');
        if !imports.is_empty() {
            out.push_str(&imports);
            out.push_str("\n\n");
        }
        out.push_str(&self.declarations);
        out.push('\n');
        out
    }
}

/// Mutable state of one rendering pass.
#[derive(Debug, Default)]
pub struct RenderSession {
    imports: BTreeSet<String>,
    declared: IndexMap<String, u64>,
    blocks: Vec<String>,
}

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&mut self, symbol: &str) {
        if !self.imports.contains(symbol) {
            self.imports.insert(symbol.to_string());
        }
    }

    /// Declare every aliased node under `node`, then `node` itself if it is
    /// aliased or `force` is set.
    pub fn declare(&mut self, node: &TypeTree<'_>, force: bool) -> TreeResult<()> {
        for child in node.children() {
            self.declare(child, false)?;
        }
        if !force && !node.permission_to_create_alias() {
            return Ok(());
        }
        let hash = node.structural_hash();
        match self.declared.get(node.name()) {
            Some(seen) if *seen == hash => {
                trace!(name = node.name(), "alias already declared");
                return Ok(());
            }
            Some(_) => return Err(TreeError::NameConflict { name: node.name().to_string() }),
            None => {}
        }
        let block = node.render_self(self)?;
        self.declared.insert(node.name().to_string(), hash);
        self.blocks.push(block);
        Ok(())
    }

    /// How `node` is spelled where it is used.
    pub fn type_ref(&mut self, node: &TypeTree<'_>) -> TreeResult<String> {
        if node.permission_to_create_alias() {
            Ok(node.name().to_string())
        } else {
            node.render_inline(self)
        }
    }

    pub fn finish(self) -> Rendered {
        Rendered { declarations: self.blocks.join("\n\n"), imports: self.imports }
    }
}

/// Render every declaration `tree` needs. The root is always declared, even when
/// it is a scalar.
pub fn render(tree: &TypeTree<'_>) -> TreeResult<Rendered> {
    let mut session = RenderSession::new();
    session.declare(tree, true)?;
    Ok(session.finish())
}

pub fn render_module(tree: &TypeTree<'_>) -> TreeResult<String> {
    Ok(render(tree)?.to_module())
}

/// Use-site spellings of `node`'s children.
pub(crate) fn child_types(
    node: &TypeTree<'_>,
    session: &mut RenderSession,
    remove_repeated: bool,
) -> TreeResult<Vec<String>> {
    let mut names = Vec::new();
    for child in node.children() {
        names.push(session.type_ref(child)?);
    }
    Ok(collect_types(names, remove_repeated, session))
}

/// Empty becomes `Any`. With `remove_repeated` the result is sorted, unique and
/// `int` is absorbed by `float`.
pub(crate) fn collect_types(
    names: impl IntoIterator<Item = String>,
    remove_repeated: bool,
    session: &mut RenderSession,
) -> Vec<String> {
    let mut names: Vec<String> = names.into_iter().collect();
    if remove_repeated {
        let mut unique: BTreeSet<String> = names.into_iter().collect();
        if unique.contains("float") {
            unique.remove("int");
        }
        names = unique.into_iter().collect();
    }
    if names.is_empty() {
        session.require("Any");
        names.push("Any".to_string());
    }
    names
}

pub(crate) fn format_union(types: &[String], session: &mut RenderSession) -> String {
    match types {
        [] => {
            session.require("Any");
            "Any".to_string()
        }
        [single] => single.clone(),
        _ => {
            session.require("Union");
            format!("Union[{}]", types.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{Strategies, TupleSizeStrategy};
    use crate::tree::{TreeBuilder, build_tree};
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn module_layout() {
        let value = Value::from(json!({"list": [1, 2, 3], "int": 10}));
        let tree = build_tree(&value, "Example", Strategies::default()).unwrap();
        assert_eq!(
            render_module(&tree).unwrap(),
            "# Class automatically generated. DO NOT MODIFY.\n\
             from typing import List, TypedDict\n\n\
             ExampleList = List[int]\n\n\
             class Example(TypedDict):\n    list: ExampleList\n    int: int\n"
        );
    }

    #[test]
    fn scalar_root_is_still_declared() {
        let value = Value::Int(3);
        let tree = build_tree(&value, "Example", Strategies::default()).unwrap();
        let rendered = render(&tree).unwrap();
        assert_eq!(rendered.declarations, "Example = int");
        assert!(rendered.imports.is_empty());
        assert_eq!(
            rendered.to_module(),
            "# Class automatically generated. DO NOT MODIFY.\nExample = int\n"
        );
    }

    #[test]
    fn tuples_follow_the_size_strategy() {
        let value = Value::Tuple(vec![Value::float(1.5), Value::Int(2)]);
        let tree = build_tree(&value, "Example", Strategies::default()).unwrap();
        assert_eq!(render(&tree).unwrap().declarations, "Example = Tuple[float, int]");

        let any_size = Strategies::builder().tuple_size_strategy(TupleSizeStrategy::AnySize).build().unwrap();
        let tree = build_tree(&value, "Example", any_size).unwrap();
        assert_eq!(render(&tree).unwrap().declarations, "Example = Tuple[float, ...]");
    }

    #[test]
    fn identical_shapes_under_one_alias_are_declared_once() {
        let value = Value::from(json!([[{"a": 1}], [{"a": 2}]]));
        let tree = build_tree(&value, "Example", Strategies::default()).unwrap();
        let rendered = render(&tree).unwrap();
        assert_eq!(
            rendered.declarations,
            "class ExampleListDict(TypedDict):\n    a: int\n\n\
             ExampleList = List[ExampleListDict]\n\n\
             Example = List[ExampleList]"
        );
    }

    #[test]
    fn min_height_inlines_shallow_containers() {
        let strategies = Strategies::builder().min_height_to_define_type_alias(2).build().unwrap();
        let value = Value::from(json!({"xs": [1], "grid": [[1.5]]}));
        let tree = build_tree(&value, "Example", strategies).unwrap();
        assert_eq!(
            render(&tree).unwrap().declarations,
            "ExampleGrid = List[List[float]]\n\n\
             class Example(TypedDict):\n    xs: List[int]\n    grid: ExampleGrid"
        );
    }

    #[test]
    fn same_alias_for_different_shapes_is_a_conflict() {
        // `a_b` and `aB` camel-case to the same alias
        let value = Value::from(json!({"a_b": {"x": 1}, "aB": {"y": "s"}}));
        let tree = build_tree(&value, "Example", Strategies::default()).unwrap();
        assert_eq!(render(&tree).unwrap_err(), TreeError::NameConflict { name: "ExampleAB".into() });

        let value = Value::from(json!({"a_b": {"x": 1}, "aB": {"x": 2}}));
        let tree = build_tree(&value, "Example", Strategies::default()).unwrap();
        assert_eq!(
            render(&tree).unwrap().declarations,
            "class ExampleAB(TypedDict):\n    x: int\n\n\
             class Example(TypedDict):\n    a_b: ExampleAB\n    aB: ExampleAB"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let value = Value::from(json!({"a": [1, "x", null, {"k": [true]}], "b": {"c": [1.5, 2]}}));
        let builder = TreeBuilder::new(Strategies::default());
        let first = render(&builder.build(&value, "Example").unwrap()).unwrap();
        for _ in 0..5 {
            assert_eq!(render(&builder.build(&value, "Example").unwrap()).unwrap(), first);
        }
    }

    #[test]
    fn union_spelling() {
        let mut session = RenderSession::new();
        assert_eq!(format_union(&["int".to_string()], &mut session), "int");
        assert!(session.finish().imports.is_empty());

        let mut session = RenderSession::new();
        let types = collect_types(["str", "int", "float", "str"].map(String::from), true, &mut session);
        assert_eq!(types, ["float", "str"]);
        assert_eq!(format_union(&types, &mut session), "Union[float, str]");
        assert!(session.finish().imports.contains("Union"));

        let mut session = RenderSession::new();
        assert_eq!(collect_types(Vec::new(), true, &mut session), ["Any"]);
    }
}
