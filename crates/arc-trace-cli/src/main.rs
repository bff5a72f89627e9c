// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `arc-trace`: headless front-end for datasets and the trace hub.
//!
//! Offline commands (`inspect`, `merge`, `check`) work on files only. Online
//! commands (`traces`, `add`, `vote`, `export`) connect to the hub socket
//! and drive the same event loop a graphical front-end would.

// The CLI is expected to print to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use anyhow::{Context, Result};
use arc_app_core::catalog::TaskCatalog;
use arc_app_core::config::ConfigService;
use arc_app_core::dataset::{merge_dir, summarize};
use arc_app_core::editor::{Editor, Verdict};
use arc_app_core::prefs::{ClientPrefs, PREFS_KEY};
use arc_config_fs::FsConfigStore;
use arc_grid::Grid;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod hub;

#[derive(Parser, Debug)]
#[command(name = "arc-trace", version, about = "Browse ARC datasets and their reasoning traces")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Display name for traces and votes (defaults to the saved one)
    #[arg(long, global = true)]
    username: Option<String>,
    /// Trace hub socket (defaults to the saved one)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,
    /// Directory holding `<dataset>.json` files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Show the Hamming distance readout (defaults to the saved choice)
    #[arg(long, global = true)]
    show_distance: Option<bool>,
    /// Seconds to wait for each hub reply
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,
    /// Save the flags above as the new defaults
    #[arg(long, global = true)]
    remember: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize a dataset (name under the data dir, or a path).
    Inspect {
        /// Dataset name or `.json` path
        dataset: String,
    },
    /// Merge every `.json` file of a folder into one dataset file.
    Merge {
        /// Folder with per-task files
        input: PathBuf,
        /// Output dataset file
        output: PathBuf,
    },
    /// Check a candidate output grid against a test pair's reference.
    Check {
        /// Dataset name or `.json` path
        dataset: String,
        /// Task id
        task_id: String,
        /// JSON file holding the output grid (nested arrays of 0-9)
        output: PathBuf,
        /// Test pair index
        #[arg(long, default_value_t = 0)]
        test: usize,
    },
    /// Print a task's traces, best first.
    Traces {
        /// Dataset name or `.json` path
        dataset: String,
        /// Task id
        task_id: String,
    },
    /// Add a trace to a task and wait for the hub to confirm it.
    Add {
        /// Dataset name or `.json` path
        dataset: String,
        /// Task id
        task_id: String,
        /// Reasoning text
        text: String,
    },
    /// Vote on the trace at a ranked position (0 = best).
    Vote {
        /// Dataset name or `.json` path
        dataset: String,
        /// Task id
        task_id: String,
        /// Ranked position
        position: usize,
        /// Downvote instead of upvote
        #[arg(long)]
        down: bool,
    },
    /// Write the dataset with every task's traces to `<name>_with_traces.json`.
    Export {
        /// Dataset name or `.json` path
        dataset: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

/// Dataset argument resolved to a display name and a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DatasetSource {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
}

impl DatasetSource {
    fn resolve(arg: &str, data_dir: &Path) -> Self {
        let as_path = Path::new(arg);
        if as_path.extension().is_some_and(|e| e == "json") {
            let name = as_path
                .file_stem()
                .map_or_else(|| arg.to_owned(), |s| s.to_string_lossy().into_owned());
            return Self {
                name,
                path: as_path.to_path_buf(),
            };
        }
        Self {
            name: arg.to_owned(),
            path: data_dir.join(format!("{arg}.json")),
        }
    }

    pub(crate) fn read(&self) -> Result<Value> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("reading dataset '{}' from {}", self.name, self.path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("dataset '{}' is not valid JSON", self.name))
    }
}

/// Effective settings: saved prefs overridden by flags.
pub(crate) struct Settings {
    pub(crate) prefs: ClientPrefs,
    pub(crate) timeout: Duration,
}

fn settings(global: &GlobalArgs) -> Settings {
    // best-effort: a missing config dir only costs persistence
    let config = match FsConfigStore::new() {
        Ok(store) => Some(ConfigService::new(store)),
        Err(err) => {
            warn!(%err, "config store unavailable; using defaults");
            None
        }
    };
    let mut prefs: ClientPrefs = config
        .as_ref()
        .map(|c| c.load_or_default(PREFS_KEY))
        .unwrap_or_default();
    if let Some(name) = &global.username {
        prefs.username.clone_from(name);
    }
    if let Some(socket) = &global.socket {
        prefs.socket_path.clone_from(socket);
    }
    if let Some(dir) = &global.data_dir {
        prefs.data_dir.clone_from(dir);
    }
    if let Some(show) = global.show_distance {
        prefs.show_distance = show;
    }
    if global.remember {
        if let Some(cfg) = &config {
            match cfg.save(PREFS_KEY, &prefs) {
                Ok(()) => info!("preferences saved"),
                Err(err) => warn!(%err, "could not save preferences"),
            }
        }
    }
    Settings {
        prefs,
        timeout: Duration::from_secs(global.timeout),
    }
}

fn inspect(source: &DatasetSource) -> Result<()> {
    let mut catalog = TaskCatalog::new();
    catalog.load(source.read()?)?;
    println!("dataset: {} ({})", source.name, source.path.display());
    println!("{}", summarize(&catalog));
    Ok(())
}

fn check_report(
    dataset: Value,
    task_id: &str,
    test: usize,
    output: Grid,
    show_distance: bool,
) -> Result<Vec<String>> {
    let mut catalog = TaskCatalog::new();
    catalog.load(dataset)?;
    catalog.goto_by_id(task_id)?;
    for _ in 0..test {
        catalog.next_test()?;
    }
    let pair = catalog.current_test_pair();
    let mut editor = Editor::new();
    editor.install(pair);
    editor.set_output(output);
    let mut lines = vec![match editor.submit(pair) {
        Ok(Verdict::Correct) => "Correct solution!".to_owned(),
        Ok(Verdict::Wrong) => "Wrong solution.".to_owned(),
        Err(err) => err.to_string(),
    }];
    if show_distance {
        lines.push(format!("Distance: {}", editor.distance(pair)));
    }
    Ok(lines)
}

fn check(
    settings: &Settings,
    source: &DatasetSource,
    task_id: &str,
    output: &Path,
    test: usize,
) -> Result<()> {
    let bytes = fs::read(output).with_context(|| format!("reading {}", output.display()))?;
    let grid: Grid = serde_json::from_slice(&bytes)
        .with_context(|| format!("{} is not an output grid", output.display()))?;
    for line in check_report(source.read()?, task_id, test, grid, settings.prefs.show_distance)? {
        println!("{line}");
    }
    Ok(())
}

fn merge(input: &Path, output: &Path) -> Result<()> {
    let merged = merge_dir(input)?;
    let mut out = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, serde_json::ser::PrettyFormatter::with_indent(b"    "));
    merged.serialize(&mut ser)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, out).with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Merged {} entries from '{}' into '{}'",
        merged.len(),
        input.display(),
        output.display()
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let settings = settings(&cli.global);
    let source = |arg: &str| DatasetSource::resolve(arg, &settings.prefs.data_dir);

    match cli.command {
        Commands::Inspect { dataset } => inspect(&source(&dataset)),
        Commands::Merge { input, output } => merge(&input, &output),
        Commands::Check {
            dataset,
            task_id,
            output,
            test,
        } => check(&settings, &source(&dataset), &task_id, &output, test),
        Commands::Traces { dataset, task_id } => {
            hub::traces(&settings, &source(&dataset), &task_id).await
        }
        Commands::Add {
            dataset,
            task_id,
            text,
        } => hub::add(&settings, &source(&dataset), &task_id, &text).await,
        Commands::Vote {
            dataset,
            task_id,
            position,
            down,
        } => hub::vote(&settings, &source(&dataset), &task_id, position, down).await,
        Commands::Export { dataset, out_dir } => {
            hub::export(&settings, &source(&dataset), &out_dir).await
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn dataset_names_resolve_under_data_dir() {
        let s = DatasetSource::resolve("augmented", Path::new("data"));
        assert_eq!(s.name, "augmented");
        assert_eq!(s.path, PathBuf::from("data/augmented.json"));
        let p = DatasetSource::resolve("/tmp/x/original.json", Path::new("data"));
        assert_eq!(p.name, "original");
        assert_eq!(p.path, PathBuf::from("/tmp/x/original.json"));
    }

    #[test]
    fn merge_writes_four_space_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tasks");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("abc.json"), r#"{"train": [], "test": []}"#).unwrap();
        let output = dir.path().join("out/merged.json");
        merge(&input, &output).unwrap();
        let text = fs::read_to_string(&output).unwrap();
        assert!(text.contains("\n        \"id\": \"abc\""));
    }

    fn one_task() -> Value {
        serde_json::json!([{
            "id": "t1",
            "train": [],
            "test": [
                {"input": [[1]], "output": [[1, 2]]},
                {"input": [[3]]},
            ],
        }])
    }

    #[test]
    fn check_reports_verdict_and_distance() {
        let right = Grid::from_values(&[vec![1, 2]]).unwrap();
        let lines = check_report(one_task(), "t1", 0, right, true).unwrap();
        assert_eq!(lines, ["Correct solution!", "Distance: 0.00"]);

        let wrong = Grid::from_values(&[vec![1, 0]]).unwrap();
        let lines = check_report(one_task(), "t1", 0, wrong, true).unwrap();
        assert_eq!(lines, ["Wrong solution.", "Distance: 0.50"]);
    }

    #[test]
    fn check_hides_distance_when_asked() {
        let shape = Grid::from_values(&[vec![1]]).unwrap();
        let lines = check_report(one_task(), "t1", 0, shape, false).unwrap();
        assert_eq!(lines, ["Wrong solution dimensions."]);
    }

    #[test]
    fn check_without_reference_is_not_applicable() {
        let g = Grid::from_values(&[vec![3]]).unwrap();
        let lines = check_report(one_task(), "t1", 1, g.clone(), true).unwrap();
        assert_eq!(lines, ["No reference output for this test input.", "Distance: N/A"]);
        assert!(check_report(one_task(), "t1", 2, g.clone(), true).is_err());
        assert!(check_report(one_task(), "zz", 0, g, true).is_err());
    }

    #[test]
    fn inspect_rejects_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "[]").unwrap();
        let source = DatasetSource::resolve(path.to_str().unwrap(), dir.path());
        assert!(inspect(&source).is_err());
    }
}
