//! Identifier validity and alias-name synthesis.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_\p{XID_Start}]\p{XID_Continue}*$").expect("identifier regex"));

/// Anything that cannot continue an identifier, plus `_`.
static WORD_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:[^\p{XID_Continue}]|_)+").expect("separator regex"));

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Whether `s` can be used as a field or type identifier.
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s) && !KEYWORDS.contains(&s)
}

/// `nested_dict` → `NestedDict`, `2 3` → `23`, `名前` → `名前`. Only the first
/// letter of each word changes case.
pub fn to_upper_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in WORD_SEPARATOR.split(s) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// What a child is reached through from its parent.
#[derive(Debug, Clone, Copy)]
pub enum ChildKey<'a> {
    /// Mapping key and its position among the mapping's entries.
    Field(&'a Value, usize),
    /// Element of a sequence, set, tuple or iterator; named after its type.
    Element(&'a Value),
}

impl ChildKey<'_> {
    /// The case-normalized part appended to the parent's name. Never empty: a
    /// key with nothing nameable in it is named after its position (`Field1`).
    pub fn suffix(&self) -> String {
        let camel = match self {
            ChildKey::Field(key, _) => to_upper_camel(&key.key_text()),
            ChildKey::Element(value) => to_upper_camel(value.type_name()),
        };
        if !camel.is_empty() {
            return camel;
        }
        match self {
            ChildKey::Field(_, position) => format!("Field{}", position + 1),
            ChildKey::Element(_) => "Element".to_string(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ChildKey::Field(key, _) => key.key_text(),
            ChildKey::Element(value) => value.type_name().to_string(),
        }
    }
}

pub fn child_alias_name(parent: &str, key: &ChildKey<'_>) -> String {
    format!("{parent}{}", key.suffix())
}
