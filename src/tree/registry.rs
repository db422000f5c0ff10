use std::collections::HashMap;

use crate::error::TreeResult;
use crate::tree::{TreeBuilder, TypeTree, record, sequence, tuple};
use crate::value::{Value, ValueKind};

/// Builds the node for one container value. Children are instantiated through
/// the given builder so they get the same dispatch as the root.
pub type Constructor = for<'v> fn(&TreeBuilder, &'v Value, String) -> TreeResult<TypeTree<'v>>;

#[derive(Clone)]
pub enum Specialization {
    /// Leaf rendered as `rendered`, optionally requiring an import symbol.
    Scalar { rendered: String, import: Option<String> },
    Container(Constructor),
}

impl std::fmt::Debug for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Specialization::Scalar { rendered, import } => f
                .debug_struct("Scalar")
                .field("rendered", rendered)
                .field("import", import)
                .finish(),
            Specialization::Container(_) => f.write_str("Container(..)"),
        }
    }
}

/// Value kind → node specialization. New kinds must be registered here; there
/// is no fallback introspection.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: HashMap<ValueKind, Specialization>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (kind, rendered) in [
            (ValueKind::None, "None"),
            (ValueKind::Bool, "bool"),
            (ValueKind::Int, "int"),
            (ValueKind::Float, "float"),
            (ValueKind::Str, "str"),
            (ValueKind::Bytes, "bytes"),
        ] {
            registry.register(kind, Specialization::Scalar { rendered: rendered.into(), import: None });
        }
        registry
            .register_container(ValueKind::Dict, record::build_dict)
            .register_container(ValueKind::List, sequence::build_list)
            .register_container(ValueKind::Set, sequence::build_set)
            .register_container(ValueKind::FrozenSet, sequence::build_set)
            .register_container(ValueKind::Iterator, sequence::build_iterator)
            .register_container(ValueKind::Tuple, tuple::build_tuple);
        registry
    }
}

impl Registry {
    /// A registry that knows no kinds at all.
    pub fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn register(&mut self, kind: ValueKind, specialization: Specialization) -> &mut Self {
        self.entries.insert(kind, specialization);
        self
    }

    pub fn register_container(&mut self, kind: ValueKind, constructor: Constructor) -> &mut Self {
        self.register(kind, Specialization::Container(constructor))
    }

    /// Teach the registry an opaque runtime type, e.g.
    /// `register_scalar("Decimal", "Decimal", Some("decimal.Decimal"))`.
    pub fn register_scalar(
        &mut self,
        type_name: &str,
        rendered: &str,
        import: Option<&str>,
    ) -> &mut Self {
        self.register(
            ValueKind::Opaque(type_name.to_string()),
            Specialization::Scalar { rendered: rendered.to_string(), import: import.map(str::to_string) },
        )
    }

    pub fn unregister(&mut self, kind: &ValueKind) -> Option<Specialization> {
        self.entries.remove(kind)
    }

    pub fn get(&self, kind: &ValueKind) -> Option<&Specialization> {
        self.entries.get(kind)
    }
}
