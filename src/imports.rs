//! Import statement formatting.
use std::collections::{BTreeMap, BTreeSet};

use crate::render::TAB;

pub const DEFAULT_LINE_LENGTH: usize = 88;

/// Collects the symbols a module refers to and prints them as grouped
/// `from <module> import ...` lines.
#[derive(Debug, Clone, Default)]
pub struct ImportManager {
    set: BTreeSet<String>,
}

impl ImportManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: impl Into<String>) -> &mut Self {
        self.set.insert(symbol.into());
        self
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, symbols: I) -> &mut Self {
        self.set.extend(symbols);
        self
    }

    pub fn symbols(&self) -> &BTreeSet<String> {
        &self.set
    }

    /// One statement per module, modules and names sorted. Empty when nothing
    /// was added.
    pub fn format(&self, line_length: usize) -> String {
        let mut by_module: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for symbol in &self.set {
            let (module, name) = resolve(symbol);
            by_module.entry(module).or_default().insert(name);
        }
        by_module
            .into_iter()
            .map(|(module, names)| format_single_package(module, names, line_length))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Module a symbol is imported from and the name it is imported as.
fn resolve(symbol: &str) -> (&str, &str) {
    match symbol {
        "list" => ("typing", "List"),
        "tuple" => ("typing", "Tuple"),
        "dict" => ("typing", "Dict"),
        "set" => ("typing", "Set"),
        "frozenset" => ("typing", "FrozenSet"),
        "MappingProxyType" => ("types", "MappingProxyType"),
        "NotRequired" | "ReadOnly" => ("typing_extensions", symbol),
        _ => symbol.rsplit_once('.').unwrap_or(("typing", symbol)),
    }
}

pub fn format_single_package<'a>(
    module: &str,
    names: impl IntoIterator<Item = &'a str>,
    line_length: usize,
) -> String {
    let names: BTreeSet<&str> = names.into_iter().collect();
    let line = format!("from {module} import {}", names.iter().copied().collect::<Vec<_>>().join(", "));
    if line.len() <= line_length {
        return line;
    }
    let mut out = format!("from {module} import (\n");
    for name in names {
        out.push_str(&format!("{TAB}{name},\n"));
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_chainable() {
        let mut manager = ImportManager::new();
        manager.add("list").add("tuple").add("dict");
        let symbols: Vec<_> = manager.symbols().iter().map(String::as_str).collect();
        assert_eq!(symbols, ["dict", "list", "tuple"]);
    }

    #[test]
    fn single_package_fits_on_one_line() {
        assert_eq!(
            format_single_package("typing", ["List", "Tuple", "Dict"], 80),
            "from typing import Dict, List, Tuple"
        );
    }

    #[test]
    fn single_package_wraps_long_lines() {
        assert_eq!(
            format_single_package("typing", ["List", "Tuple", "Dict"], 30),
            "from typing import (\n    Dict,\n    List,\n    Tuple,\n)"
        );
    }

    #[test]
    fn modules_are_grouped_and_sorted() {
        let mut manager = ImportManager::new();
        manager.add("list").add("tuple").add("dict").add("MappingProxyType");
        assert_eq!(
            manager.format(120),
            "from types import MappingProxyType\nfrom typing import Dict, List, Tuple"
        );
        assert_eq!(
            manager.format(35),
            "from types import MappingProxyType\nfrom typing import (\n    Dict,\n    List,\n    Tuple,\n)"
        );
    }

    #[test]
    fn extension_and_dotted_symbols() {
        let mut manager = ImportManager::new();
        manager
            .add("TypedDict")
            .add("NotRequired")
            .add("ReadOnly")
            .add("decimal.Decimal")
            .add("Union");
        assert_eq!(
            manager.format(DEFAULT_LINE_LENGTH),
            "from decimal import Decimal\n\
             from typing import TypedDict, Union\n\
             from typing_extensions import NotRequired, ReadOnly"
        );
    }

    #[test]
    fn nothing_to_import() {
        assert_eq!(ImportManager::new().format(80), "");
    }
}
