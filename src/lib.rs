//! Infer type declarations from example values.
//!
//! ```text
//! Value ──TreeBuilder──▶ TypeTree ──render──▶ declarations + imports ──StubStore──▶ <Class>.pyi
//! ```
//!
//! A [`Value`] is wrapped into a [`TypeTree`] whose nodes know their alias
//! names, heights and structural hashes. [`render`] turns the tree into a
//! dependency-ordered list of `TypedDict` classes and type aliases, and
//! [`StubStore`] keeps a directory of generated modules consistent across runs.
pub mod error;
pub mod imports;
pub mod naming;
pub mod path_de;
pub mod render;
pub mod store;
pub mod strategies;
pub mod tree;
pub mod value;

pub use error::{TreeError, TreeResult};
pub use imports::ImportManager;
pub use render::{Rendered, render, render_module};
pub use store::{IfExists, Outcome, StoreError, Stub, StubStore};
pub use strategies::{DictStrategy, ListStrategy, Strategies, StrategiesBuilder, TupleSizeStrategy};
pub use tree::{NodeKind, Registry, TreeBuilder, TypeTree, build_tree};
pub use value::{ArrayMode, Value, ValueKind};
