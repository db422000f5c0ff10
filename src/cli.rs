//! CLI: infer → render | store | reset
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;

use pyi_shape::naming::to_upper_camel;
use pyi_shape::path_de::from_str_with_path;
use pyi_shape::{
    ArrayMode, DictStrategy, IfExists, ListStrategy, Outcome, Strategies, StrategiesBuilder, Stub,
    StubStore, TupleSizeStrategy, Value, build_tree, render_module,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer type declarations (TypedDict classes and aliases) from example JSON documents
#[derive(Parser, Debug)]
#[command(name = "pyi-shape", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// infer and print (or write) the module for a single value
    Render(RenderOut),
    /// infer every input value and commit it to a stub directory
    Store(StoreOut),
    /// delete a stub directory and everything in it
    Reset(ResetOut),
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum ArraysAs {
    #[default]
    List,
    Tuple,
    Set,
}

impl From<ArraysAs> for ArrayMode {
    fn from(value: ArraysAs) -> Self {
        match value {
            ArraysAs::List => ArrayMode::List,
            ArraysAs::Tuple => ArrayMode::Tuple,
            ArraysAs::Set => ArrayMode::Set,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// what JSON arrays become before inference
    #[arg(long, value_enum, default_value_t = ArraysAs::List)]
    arrays_as: ArraysAs,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct StrategySettings {
    /// JSON file with strategy fields; flags below override it
    #[arg(long)]
    strategies: Option<PathBuf>,

    #[arg(long)]
    list_strategy: Option<ListStrategy>,

    #[arg(long)]
    tuple_size_strategy: Option<TupleSizeStrategy>,

    #[arg(long)]
    dict_strategy: Option<DictStrategy>,

    /// containers shorter than this are inlined instead of aliased
    #[arg(long, allow_negative_numbers = true)]
    min_height: Option<i64>,

    /// string field whose value becomes the class docstring
    #[arg(long)]
    key_used_as_doc: Option<String>,

    /// merge record shapes sharing at least this percentage of fields
    #[arg(long, allow_negative_numbers = true)]
    merge_similarity: Option<i64>,

    /// wrap every TypedDict field in ReadOnly[...]
    #[arg(long, default_value_t = false)]
    read_only: bool,
}

#[derive(clap::Parser, Debug)]
struct RenderOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    strategy_settings: StrategySettings,

    /// top-level class name
    #[arg(long, default_value = "Root")]
    class_name: String,

    /// output .pyi file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct StoreOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    strategy_settings: StrategySettings,

    /// stub directory
    #[arg(long)]
    dir: PathBuf,

    /// class name (single input value only); defaults to the file stem
    #[arg(long)]
    class_name: Option<String>,

    #[arg(long, default_value_t = IfExists::Validate)]
    if_exists: IfExists,
}

#[derive(clap::Parser, Debug)]
struct ResetOut {
    /// stub directory
    #[arg(long)]
    dir: PathBuf,
}

/// One example value and where it came from.
#[derive(Debug)]
struct Document {
    source: PathBuf,
    /// position within its file; only NDJSON files hold more than one
    index: usize,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load(&self) -> anyhow::Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let mut documents = Vec::new();
        for source_path in source_paths {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {}", source_path.display()))?;
            let chunks: Vec<&str> = if self.ndjson {
                source.lines().filter(|line| !line.trim().is_empty()).collect()
            } else {
                vec![source.as_str()]
            };
            for (index, chunk) in chunks.into_iter().enumerate() {
                let json = serde_json::from_str::<serde_json::Value>(chunk).with_context(|| {
                    format!("failed to parse JSON source file ({}), value {index}", source_path.display())
                })?;
                let json = match self.json_pointer.as_deref() {
                    None => json,
                    Some(pointer) => json.pointer(pointer).cloned().ok_or_else(|| {
                        anyhow!("{pointer} selects nothing in {}", source_path.display())
                    })?,
                };
                documents.push(Document {
                    source: source_path.clone(),
                    index,
                    value: Value::from_json(json, self.arrays_as.into()),
                });
            }
        }
        Ok(documents)
    }
}

impl StrategySettings {
    fn resolve(&self) -> anyhow::Result<Strategies> {
        let mut builder = match self.strategies.as_ref() {
            None => StrategiesBuilder::default(),
            Some(path) => {
                let src = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read strategies file {}", path.display()))?;
                from_str_with_path::<StrategiesBuilder>(&src)
                    .map_err(|error| anyhow!("invalid strategies file {}: {error}", path.display()))?
            }
        };
        if let Some(v) = self.list_strategy {
            builder = builder.list_strategy(v);
        }
        if let Some(v) = self.tuple_size_strategy {
            builder = builder.tuple_size_strategy(v);
        }
        if let Some(v) = self.dict_strategy {
            builder = builder.dict_strategy(v);
        }
        if let Some(v) = self.min_height {
            builder = builder.min_height_to_define_type_alias(v);
        }
        if let Some(v) = self.key_used_as_doc.as_ref() {
            builder = builder.key_used_as_doc(v.clone());
        }
        if let Some(v) = self.merge_similarity {
            builder = builder.merge_different_typed_dicts_if_similarity_above(v);
        }
        if self.read_only {
            builder = builder.typed_dict_read_only_values(true);
        }
        Ok(builder.build()?)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Render(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let strategies = target.strategy_settings.resolve()?;
                let documents = target.input_settings.load()?;
                let [document] = documents.as_slice() else {
                    bail!("render needs exactly one input value, got {}", documents.len());
                };
                let tree = build_tree(&document.value, &target.class_name, strategies)
                    .with_context(|| format!("failed to infer {}", document.source.display()))?;
                let module = render_module(&tree)?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    std::fs::write(out, &module)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    print!("{module}");
                }
                Ok(())
            }
            Command::Store(target) => {
                let strategies = Arc::new(target.strategy_settings.resolve()?);
                let documents = target.input_settings.load()?;
                let jobs = assign_class_names(&documents, target.class_name.as_deref())?;

                // 1) infer and render in parallel
                let stubs: Vec<_> = jobs
                    .par_iter()
                    .map(|(class_name, document)| {
                        let stub = Stub::render(&document.value, class_name, Arc::clone(&strategies));
                        (class_name.as_str(), *document, stub)
                    })
                    .collect();

                // 2) commit in input order
                let mut store = StubStore::open(&target.dir, target.if_exists)
                    .with_context(|| format!("failed to open stub directory {}", target.dir.display()))?;
                let mut failures = 0usize;
                for (class_name, document, stub) in stubs {
                    let outcome = stub.map_err(anyhow::Error::from).and_then(|stub| Ok(store.commit(&stub)?));
                    match outcome {
                        Ok(outcome) => {
                            let label = match outcome {
                                Outcome::Created => outcome.to_string().green(),
                                Outcome::Overwritten => outcome.to_string().yellow(),
                                Outcome::Unchanged => outcome.to_string().dimmed(),
                            };
                            eprintln!("✅ {class_name} {label}");
                        }
                        Err(error) => {
                            failures += 1;
                            eprintln!(
                                "❌ {class_name} ({}): {}",
                                document.source.display(),
                                error.to_string().red()
                            );
                        }
                    }
                }
                if failures > 0 {
                    bail!("{failures} of {} classes failed", jobs.len());
                }
                Ok(())
            }
            Command::Reset(target) => {
                let store = StubStore::open(&target.dir, IfExists::Validate)
                    .with_context(|| format!("failed to open stub directory {}", target.dir.display()))?;
                let count = store.classes().count();
                store.reset()?;
                eprintln!("🧹 removed {count} classes from {}", target.dir.display());
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// `--class-name` for a single value, otherwise the UpperCamel file stem, with a
/// 1-based suffix when the file holds several values.
fn assign_class_names<'a>(
    documents: &'a [Document],
    class_name: Option<&str>,
) -> anyhow::Result<Vec<(String, &'a Document)>> {
    if let Some(class_name) = class_name {
        let [document] = documents else {
            bail!("--class-name needs exactly one input value, got {}", documents.len());
        };
        return Ok(vec![(class_name.to_string(), document)]);
    }
    let per_file = |path: &Path| documents.iter().filter(|d| d.source == path).count();
    Ok(documents
        .iter()
        .map(|document| {
            let stem = document
                .source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut name = to_upper_camel(&stem);
            if per_file(&document.source) > 1 {
                name.push_str(&(document.index + 1).to_string());
            }
            (name, document)
        })
        .collect())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(source: &str, index: usize) -> Document {
        Document { source: PathBuf::from(source), index, value: Value::Int(1) }
    }

    #[test]
    fn class_names_come_from_file_stems() {
        let documents = vec![
            document("data/user_profile.json", 0),
            document("data/events.ndjson", 0),
            document("data/events.ndjson", 1),
        ];
        let names: Vec<_> = assign_class_names(&documents, None)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["UserProfile", "Events1", "Events2"]);
    }

    #[test]
    fn explicit_class_name_needs_a_single_value() {
        let one = vec![document("a.json", 0)];
        let named = assign_class_names(&one, Some("Config")).unwrap();
        assert_eq!(named[0].0, "Config");

        let two = vec![document("a.json", 0), document("b.json", 0)];
        assert!(assign_class_names(&two, Some("Config")).is_err());
    }

    #[test]
    fn glob_patterns_expand_and_literals_pass_through() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("b.json"), "{}").unwrap();
        let pattern = format!("{}/*.json", tmp.path().display());
        let paths = resolve_file_path_patterns([pattern.as_str(), "literal.json"]).unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[2], PathBuf::from("literal.json"));

        let missing = format!("{}/*.yaml", tmp.path().display());
        assert!(resolve_file_path_patterns([missing.as_str()]).is_err());
    }

    #[test]
    fn strategy_flags_override_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("strategies.json");
        std::fs::write(&path, r#"{"list_strategy": "Sequence", "min_height_to_define_type_alias": 3}"#).unwrap();
        let settings = StrategySettings {
            strategies: Some(path),
            list_strategy: None,
            tuple_size_strategy: Some(TupleSizeStrategy::AnySize),
            dict_strategy: None,
            min_height: Some(0),
            key_used_as_doc: None,
            merge_similarity: None,
            read_only: false,
        };
        let strategies = settings.resolve().unwrap();
        assert_eq!(strategies.list_strategy(), ListStrategy::Sequence);
        assert_eq!(strategies.tuple_size_strategy(), TupleSizeStrategy::AnySize);
        assert_eq!(strategies.min_height_to_define_type_alias(), 0);
    }

    #[test]
    fn ndjson_and_pointer_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.ndjson");
        std::fs::write(&path, "{\"data\": {\"id\": 1}}\n\n{\"data\": {\"id\": 2}}\n").unwrap();
        let settings = InputSettings {
            ndjson: true,
            json_pointer: Some("/data".into()),
            arrays_as: ArraysAs::List,
            input: vec![path.display().to_string()],
        };
        let documents = settings.load().unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].index, 1);
        assert_eq!(documents[1].value, Value::dict([(Value::str("id"), Value::Int(2))]));
    }
}
