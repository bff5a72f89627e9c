// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dataset files: merging per-task JSON, summaries, and export with traces.

use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::catalog::{TaskCatalog, TRACE_KEYS};
use crate::AppError;

/// Fold per-file JSON documents into one dataset array.
///
/// Each item is `(file stem, parsed document)`. Objects missing an `id`
/// take the stem; arrays contribute each of their items the same way;
/// other values are appended untouched.
pub fn merge_documents<I, S>(docs: I) -> Vec<Value>
where
    I: IntoIterator<Item = (S, Value)>,
    S: AsRef<str>,
{
    fn with_id(mut item: Value, stem: &str) -> Value {
        if let Value::Object(map) = &mut item {
            map.entry("id").or_insert_with(|| Value::String(stem.to_owned()));
        }
        item
    }

    let mut merged = Vec::new();
    for (stem, doc) in docs {
        let stem = stem.as_ref();
        match doc {
            Value::Array(items) => merged.extend(items.into_iter().map(|i| with_id(i, stem))),
            other => merged.push(with_id(other, stem)),
        }
    }
    merged
}

/// Merge every `*.json` file of `dir`, in file-name order.
///
/// Files that are not valid JSON are skipped with a warning.
pub fn merge_dir(dir: &Path) -> Result<Vec<Value>, AppError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::load(format!(
            "Input folder '{}' is not a readable directory: {e}",
            dir.display()
        ))
    })?;
    let mut paths: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(|e| e.to_string()));
        match parsed {
            Ok(doc) => docs.push((stem, doc)),
            Err(err) => warn!(file = %path.display(), %err, "skipping file that is not valid JSON"),
        }
    }
    debug!(files = docs.len(), "merging dataset files");
    Ok(merge_documents(docs))
}

/// Counts over a loaded catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetSummary {
    /// Number of tasks.
    pub tasks: usize,
    /// Tasks without an `id`.
    pub without_id: usize,
    /// Tasks that fail to parse.
    pub malformed: usize,
    /// Demonstration pairs over parseable tasks.
    pub demonstrations: usize,
    /// Test pairs over parseable tasks.
    pub tests: usize,
    /// Test pairs with a published reference output.
    pub tests_with_reference: usize,
    /// Attached traces.
    pub traces: usize,
}

/// Count tasks, pairs and traces.
pub fn summarize(catalog: &TaskCatalog) -> DatasetSummary {
    let mut summary = DatasetSummary {
        tasks: catalog.len(),
        ..DatasetSummary::default()
    };
    for task in catalog.tasks() {
        if task.id().is_none() {
            summary.without_id += 1;
        }
        summary.traces += task.traces().len();
        match task.content() {
            Ok(content) => {
                summary.demonstrations += content.demonstrations.len();
                summary.tests += content.tests.len();
                summary.tests_with_reference +=
                    content.tests.iter().filter(|t| t.output.is_some()).count();
            }
            Err(_) => summary.malformed += 1,
        }
    }
    summary
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tasks:               {}", self.tasks)?;
        writeln!(f, "  without id:        {}", self.without_id)?;
        writeln!(f, "  malformed:         {}", self.malformed)?;
        writeln!(f, "demonstration pairs: {}", self.demonstrations)?;
        writeln!(f, "test pairs:          {}", self.tests)?;
        writeln!(f, "  with reference:    {}", self.tests_with_reference)?;
        write!(f, "traces:              {}", self.traces)
    }
}

/// Serialized dataset ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Suggested file name.
    pub file_name: String,
    /// Indented JSON.
    pub contents: String,
}

/// File name for an exported dataset.
pub fn export_file_name(dataset_name: Option<&str>) -> String {
    let name = dataset_name.filter(|n| !n.is_empty()).unwrap_or("dataset");
    format!("{name}_with_traces.json")
}

/// Serialize every task as loaded plus its `traces` array.
///
/// Fields the catalog does not model are written back unchanged; traces
/// keep arrival order. A legacy `comments` array is replaced by `traces`.
pub fn export(catalog: &TaskCatalog, dataset_name: Option<&str>) -> Result<Export, AppError> {
    if catalog.is_empty() {
        return Err(AppError::validation("No dataset loaded to download."));
    }
    let tasks = catalog
        .tasks()
        .iter()
        .map(|task| -> Result<Value, serde_json::Error> {
            let traces = task
                .traces()
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            let mut object = match task.raw() {
                Value::Object(map) => map.clone(),
                other => {
                    let mut map = Map::new();
                    map.insert("value".into(), other.clone());
                    map
                }
            };
            for key in TRACE_KEYS {
                object.remove(key);
            }
            object.insert("traces".into(), Value::Array(traces));
            Ok(Value::Object(object))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::validation(format!("Error preparing data for download: {e}")))?;
    let contents = serde_json::to_string_pretty(&tasks)
        .map_err(|e| AppError::validation(format!("Error preparing data for download: {e}")))?;
    Ok(Export {
        file_name: export_file_name(dataset_name),
        contents,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_fills_missing_ids_from_stem() {
        let merged = merge_documents([
            ("a1", json!({"train": []})),
            ("b2", json!([{"id": "keep"}, {"train": []}, 7])),
        ]);
        assert_eq!(merged[0]["id"], "a1");
        assert_eq!(merged[1]["id"], "keep");
        assert_eq!(merged[2]["id"], "b2");
        assert_eq!(merged[3], json!(7));
    }

    #[test]
    fn merge_dir_skips_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), r#"{"train": [], "test": []}"#).unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"id": "x"}]"#).unwrap();
        fs::write(dir.path().join("broken.json"), "{nope").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let merged = merge_dir(dir.path()).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0]["id"], "x");
        assert_eq!(merged[1]["id"], "b");
    }

    #[test]
    fn merge_dir_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            merge_dir(&dir.path().join("missing")),
            Err(AppError::Load(_))
        ));
    }

    #[test]
    fn export_names_file_after_dataset() {
        assert_eq!(export_file_name(Some("original")), "original_with_traces.json");
        assert_eq!(export_file_name(None), "dataset_with_traces.json");
        assert_eq!(export_file_name(Some("")), "dataset_with_traces.json");
    }

    #[test]
    fn export_of_empty_catalog_is_rejected() {
        assert!(matches!(
            export(&TaskCatalog::new(), None),
            Err(AppError::Validation(_))
        ));
    }
}
