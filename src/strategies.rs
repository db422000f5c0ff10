//! Rendering strategies shared (read-only) by every node of a tree.
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ListStrategy {
    #[default]
    #[serde(rename = "list")]
    List,
    #[serde(rename = "Sequence")]
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TupleSizeStrategy {
    #[default]
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "any size")]
    AnySize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DictStrategy {
    #[default]
    TypedDict,
    Mapping,
    #[serde(rename = "dict")]
    Dict,
}

macro_rules! literal_enum {
    ($ty:ident, $field:literal, { $($lit:literal => $variant:ident),+ $(,)? }) => {
        impl $ty {
            pub const ALLOWED: &'static [&'static str] = &[$($lit),+];

            pub fn as_str(self) -> &'static str {
                match self { $($ty::$variant => $lit),+ }
            }
        }

        impl FromStr for $ty {
            type Err = TreeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($lit => Ok($ty::$variant),)+
                    other => Err(TreeError::invalid_config(
                        $field,
                        format!("expected any of ({}) but got `{other}`", Self::ALLOWED.join(", ")),
                    )),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

literal_enum!(ListStrategy, "list_strategy", { "list" => List, "Sequence" => Sequence });
literal_enum!(TupleSizeStrategy, "tuple_size_strategy", { "fixed" => Fixed, "any size" => AnySize });
literal_enum!(DictStrategy, "dict_strategy", { "TypedDict" => TypedDict, "Mapping" => Mapping, "dict" => Dict });

/// Immutable, validated strategy set. Build through [`StrategiesBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Strategies {
    list_strategy: ListStrategy,
    tuple_size_strategy: TupleSizeStrategy,
    dict_strategy: DictStrategy,
    min_height_to_define_type_alias: usize,
    key_used_as_doc: String,
    merge_different_typed_dicts_if_similarity_above: u32,
    typed_dict_read_only_values: bool,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            list_strategy: ListStrategy::List,
            tuple_size_strategy: TupleSizeStrategy::Fixed,
            dict_strategy: DictStrategy::TypedDict,
            min_height_to_define_type_alias: 1,
            key_used_as_doc: String::new(),
            merge_different_typed_dicts_if_similarity_above: 50,
            typed_dict_read_only_values: false,
        }
    }
}

impl Strategies {
    pub fn builder() -> StrategiesBuilder {
        StrategiesBuilder::default()
    }

    /// Load from a JSON document; missing fields take their defaults.
    pub fn from_json_str(src: &str) -> TreeResult<Self> {
        let builder: StrategiesBuilder = crate::path_de::from_str_with_path(src)
            .map_err(|e| TreeError::invalid_config(e.path, e.message))?;
        builder.build()
    }

    pub fn list_strategy(&self) -> ListStrategy {
        self.list_strategy
    }
    pub fn tuple_size_strategy(&self) -> TupleSizeStrategy {
        self.tuple_size_strategy
    }
    pub fn dict_strategy(&self) -> DictStrategy {
        self.dict_strategy
    }
    pub fn min_height_to_define_type_alias(&self) -> usize {
        self.min_height_to_define_type_alias
    }
    /// Empty when no key is used as a docstring.
    pub fn key_used_as_doc(&self) -> &str {
        &self.key_used_as_doc
    }
    pub fn merge_similarity_threshold(&self) -> u32 {
        self.merge_different_typed_dicts_if_similarity_above
    }
    pub fn typed_dict_read_only_values(&self) -> bool {
        self.typed_dict_read_only_values
    }
}

/// Unvalidated strategy fields; also the shape of a strategies JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategiesBuilder {
    pub list_strategy: ListStrategy,
    pub tuple_size_strategy: TupleSizeStrategy,
    pub dict_strategy: DictStrategy,
    pub min_height_to_define_type_alias: i64,
    pub key_used_as_doc: String,
    pub merge_different_typed_dicts_if_similarity_above: i64,
    pub typed_dict_read_only_values: bool,
}

impl Default for StrategiesBuilder {
    fn default() -> Self {
        let d = Strategies::default();
        Self {
            list_strategy: d.list_strategy,
            tuple_size_strategy: d.tuple_size_strategy,
            dict_strategy: d.dict_strategy,
            min_height_to_define_type_alias: d.min_height_to_define_type_alias as i64,
            key_used_as_doc: d.key_used_as_doc,
            merge_different_typed_dicts_if_similarity_above: d
                .merge_different_typed_dicts_if_similarity_above
                as i64,
            typed_dict_read_only_values: d.typed_dict_read_only_values,
        }
    }
}

impl StrategiesBuilder {
    pub fn list_strategy(mut self, v: ListStrategy) -> Self {
        self.list_strategy = v;
        self
    }
    pub fn tuple_size_strategy(mut self, v: TupleSizeStrategy) -> Self {
        self.tuple_size_strategy = v;
        self
    }
    pub fn dict_strategy(mut self, v: DictStrategy) -> Self {
        self.dict_strategy = v;
        self
    }
    pub fn min_height_to_define_type_alias(mut self, v: i64) -> Self {
        self.min_height_to_define_type_alias = v;
        self
    }
    pub fn key_used_as_doc(mut self, v: impl Into<String>) -> Self {
        self.key_used_as_doc = v.into();
        self
    }
    pub fn merge_different_typed_dicts_if_similarity_above(mut self, v: i64) -> Self {
        self.merge_different_typed_dicts_if_similarity_above = v;
        self
    }
    pub fn typed_dict_read_only_values(mut self, v: bool) -> Self {
        self.typed_dict_read_only_values = v;
        self
    }

    pub fn build(self) -> TreeResult<Strategies> {
        let min_height = usize::try_from(self.min_height_to_define_type_alias).map_err(|_| {
            TreeError::invalid_config(
                "min_height_to_define_type_alias",
                "must be greater or equal than 0",
            )
        })?;
        let similarity = self.merge_different_typed_dicts_if_similarity_above;
        if similarity <= 0 {
            return Err(TreeError::invalid_config(
                "merge_different_typed_dicts_if_similarity_above",
                "must be greater than 0",
            ));
        }
        if similarity > 100 {
            return Err(TreeError::invalid_config(
                "merge_different_typed_dicts_if_similarity_above",
                "must be less or equal than 100",
            ));
        }
        Ok(Strategies {
            list_strategy: self.list_strategy,
            tuple_size_strategy: self.tuple_size_strategy,
            dict_strategy: self.dict_strategy,
            min_height_to_define_type_alias: min_height,
            key_used_as_doc: self.key_used_as_doc,
            merge_different_typed_dicts_if_similarity_above: similarity as u32,
            typed_dict_read_only_values: self.typed_dict_read_only_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builder_matches_default_strategies() {
        assert_eq!(Strategies::builder().build().unwrap(), Strategies::default());
    }

    #[test]
    fn numeric_bounds_are_checked_eagerly() {
        let err = Strategies::builder().min_height_to_define_type_alias(-1).build().unwrap_err();
        assert!(matches!(err, TreeError::InvalidConfig { ref field, .. } if field == "min_height_to_define_type_alias"));

        for bad in [0, -5, 101] {
            let err = Strategies::builder()
                .merge_different_typed_dicts_if_similarity_above(bad)
                .build()
                .unwrap_err();
            assert!(matches!(err, TreeError::InvalidConfig { .. }), "{bad} accepted");
        }
        assert!(Strategies::builder().merge_different_typed_dicts_if_similarity_above(100).build().is_ok());
    }

    #[test]
    fn literal_values_parse() {
        assert_eq!("Sequence".parse::<ListStrategy>().unwrap(), ListStrategy::Sequence);
        assert_eq!("any size".parse::<TupleSizeStrategy>().unwrap(), TupleSizeStrategy::AnySize);
        assert_eq!("dict".parse::<DictStrategy>().unwrap(), DictStrategy::Dict);
        let err = "tuple".parse::<ListStrategy>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for `list_strategy`: expected any of (list, Sequence) but got `tuple`"
        );
    }

    #[test]
    fn json_config_reports_the_offending_field() {
        let s = Strategies::from_json_str(r#"{"list_strategy": "Sequence", "tuple_size_strategy": "any size"}"#)
            .unwrap();
        assert_eq!(s.list_strategy(), ListStrategy::Sequence);
        assert_eq!(s.tuple_size_strategy(), TupleSizeStrategy::AnySize);
        assert_eq!(s.dict_strategy(), DictStrategy::TypedDict);

        let err = Strategies::from_json_str(r#"{"dict_strategy": "OrderedDict"}"#).unwrap_err();
        assert!(matches!(err, TreeError::InvalidConfig { ref field, .. } if field == "dict_strategy"));

        let err = Strategies::from_json_str(r#"{"merge_different_typed_dicts_if_similarity_above": 0}"#)
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidConfig { .. }));

        assert!(Strategies::from_json_str(r#"{"colour": "blue"}"#).is_err());
    }
}
