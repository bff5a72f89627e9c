// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Loaded dataset: ordered tasks, id index and navigation cursors.

use arc_grid::Grid;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::traces::{Trace, TraceCollection, TraceStore};
use crate::AppError;

/// Demonstration pair: input and its expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    /// Input grid.
    pub input: Grid,
    /// Output grid.
    pub output: Grid,
}

/// Test pair; the output may be withheld.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPair {
    /// Input grid.
    pub input: Grid,
    /// Reference output, when published.
    pub output: Option<Grid>,
}

/// Parsed grids of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContent {
    /// `train` pairs.
    pub demonstrations: Vec<Pair>,
    /// `test` pairs.
    pub tests: Vec<TestPair>,
}

/// One puzzle of the dataset.
///
/// `raw` keeps the task object as loaded so export can write back fields
/// this crate does not model.
#[derive(Debug, Clone)]
pub struct Task {
    id: Option<String>,
    content: Result<TaskContent, String>,
    pub(crate) traces: TraceCollection,
    raw: Value,
}

impl Task {
    /// Parse one dataset entry. Never fails: defects are recorded and
    /// surface when the task is opened.
    pub fn from_value(raw: Value) -> Self {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let content = parse_content(&raw);
        let traces = saved_traces(&raw);
        Self {
            id,
            content,
            traces,
            raw,
        }
    }

    /// Dataset id, if present.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Parsed grids, or a load error when the task is malformed.
    pub fn content(&self) -> Result<&TaskContent, AppError> {
        self.content.as_ref().map_err(|msg| AppError::load(msg.clone()))
    }

    /// Attached traces.
    pub fn traces(&self) -> &TraceCollection {
        &self.traces
    }

    /// Task object as loaded.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// Keys a dataset file may carry traces under, newest first.
pub const TRACE_KEYS: [&str; 2] = ["traces", "comments"];

// Traces saved by an earlier export. Entries that are not traces are skipped.
fn saved_traces(raw: &Value) -> TraceCollection {
    let mut collection = TraceCollection::default();
    let Some(saved) = TRACE_KEYS
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_array))
    else {
        return collection;
    };
    for entry in saved {
        if let Ok(trace) = serde_json::from_value::<Trace>(entry.clone()) {
            collection.push_unique(trace);
        }
    }
    collection
}

fn parse_grid(value: Option<&Value>, what: &str) -> Result<Grid, String> {
    let value = value.ok_or_else(|| format!("{what} is missing"))?;
    serde_json::from_value::<Grid>(value.clone()).map_err(|e| format!("{what} is invalid: {e}"))
}

fn parse_content(raw: &Value) -> Result<TaskContent, String> {
    let (Some(train), Some(test)) = (
        raw.get("train").and_then(Value::as_array),
        raw.get("test").and_then(Value::as_array),
    ) else {
        return Err("Task object missing 'train' or 'test' fields.".to_string());
    };
    let demonstrations = train
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            Ok(Pair {
                input: parse_grid(pair.get("input"), &format!("train[{i}].input"))?,
                output: parse_grid(pair.get("output"), &format!("train[{i}].output"))?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;
    let tests = test
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            let output = match pair.get("output") {
                None | Some(Value::Null) => None,
                some => Some(parse_grid(some, &format!("test[{i}].output"))?),
            };
            Ok(TestPair {
                input: parse_grid(pair.get("input"), &format!("test[{i}].input"))?,
                output,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;
    Ok(TaskContent {
        demonstrations,
        tests,
    })
}

// One re-roll when the first draw repeats `current` and there is a choice.
fn pick_avoiding(len: usize, current: Option<usize>, mut draw: impl FnMut() -> usize) -> usize {
    let pick = draw();
    if len > 1 && Some(pick) == current {
        draw()
    } else {
        pick
    }
}

/// Ordered task list with navigation state.
#[derive(Debug, Default)]
pub struct TaskCatalog {
    pub(crate) tasks: Vec<Task>,
    id_index: HashMap<String, usize>,
    pub(crate) current: Option<usize>,
    test_cursor: Option<usize>,
    pub(crate) trace_cursor: Option<usize>,
    opened: u64,
}

impl TaskCatalog {
    /// Empty catalog ("no task loaded").
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the catalog with a dataset and open its first task.
    ///
    /// The input must be a non-empty array and the first task must be
    /// well-formed. On failure the catalog is left empty.
    pub fn load(&mut self, dataset: Value) -> Result<&Task, AppError> {
        *self = Self {
            opened: self.opened,
            ..Self::default()
        };
        let Value::Array(entries) = dataset else {
            return Err(AppError::load("Dataset does not contain a valid JSON list."));
        };
        if entries.is_empty() {
            return Err(AppError::load("Dataset is empty."));
        }
        let tasks: Vec<Task> = entries.into_iter().map(Task::from_value).collect();
        if let Err(msg) = &tasks[0].content {
            return Err(AppError::load(format!("Error processing first task: {msg}")));
        }
        let mut id_index = HashMap::new();
        for (index, task) in tasks.iter().enumerate() {
            match task.id() {
                Some(id) => {
                    if id_index.insert(id.to_owned(), index).is_some() {
                        warn!(id, index, "duplicate task id; later task wins");
                    }
                }
                None => warn!(index, "task is missing an 'id' field"),
            }
        }
        info!(tasks = tasks.len(), "dataset loaded");
        self.tasks = tasks;
        self.id_index = id_index;
        self.open(0)
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks in dataset order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Index of the current task (`None` = no task loaded).
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// The current task.
    pub fn current_task(&self) -> Option<&Task> {
        self.current.map(|i| &self.tasks[i])
    }

    /// Position of a task id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_index.get(id).copied()
    }

    /// Task by id.
    pub fn task_by_id(&self, id: &str) -> Option<&Task> {
        self.index_of(id).map(|i| &self.tasks[i])
    }

    /// Jump to a position, clamped to the list bounds.
    pub fn goto(&mut self, index: usize) -> Result<&Task, AppError> {
        if self.tasks.is_empty() {
            return Err(AppError::validation("Please load a dataset first."));
        }
        self.open(index.min(self.tasks.len() - 1))
    }

    /// Next task; a no-op on the last one.
    pub fn next(&mut self) -> Result<&Task, AppError> {
        let current = self.require_current()?;
        if current + 1 >= self.tasks.len() {
            return Ok(&self.tasks[current]);
        }
        self.open(current + 1)
    }

    /// Previous task; a no-op on the first one.
    pub fn previous(&mut self) -> Result<&Task, AppError> {
        let current = self.require_current()?;
        if current == 0 {
            return Ok(&self.tasks[current]);
        }
        self.open(current - 1)
    }

    /// Jump to the task carrying `id`.
    pub fn goto_by_id(&mut self, id: &str) -> Result<&Task, AppError> {
        let index = self.index_of(id).ok_or_else(|| {
            AppError::NotFound(format!("Task ID '{id}' not found in the current dataset."))
        })?;
        self.open(index)
    }

    /// Uniform random task; re-rolls once if it hit the current one.
    pub fn random<R: Rng>(&mut self, rng: &mut R) -> Result<&Task, AppError> {
        let len = self.tasks.len();
        if len == 0 {
            return Err(AppError::validation(
                "Please load a dataset first before selecting a random task.",
            ));
        }
        let pick = pick_avoiding(len, self.current, || rng.gen_range(0..len));
        self.open(pick)
    }

    /// Count of task opens so far; changes whenever a task is (re)loaded.
    pub fn generation(&self) -> u64 {
        self.opened
    }

    /// Active test-pair index (`None` when the task has no test pairs).
    pub fn test_cursor(&self) -> Option<usize> {
        self.test_cursor
    }

    /// Active test pair.
    pub fn current_test_pair(&self) -> Option<&TestPair> {
        let task = self.current_task()?;
        let content = task.content.as_ref().ok()?;
        content.tests.get(self.test_cursor?)
    }

    /// Advance to the next test pair of the current task.
    pub fn next_test(&mut self) -> Result<&TestPair, AppError> {
        let total = self
            .current_task()
            .and_then(|t| t.content.as_ref().ok())
            .map_or(0, |c| c.tests.len());
        match self.test_cursor {
            Some(i) if i + 1 < total => {
                self.test_cursor = Some(i + 1);
                self.current_test_pair()
                    .ok_or_else(|| AppError::validation("No next test input."))
            }
            _ => Err(AppError::validation("No next test input.")),
        }
    }

    /// Display cursor into the current task's ranked traces
    /// (`None` when it has none).
    pub fn trace_cursor(&self) -> Option<usize> {
        self.trace_cursor
    }

    /// Trace under the display cursor, with its ranked position.
    pub fn displayed_trace(&self) -> Option<(usize, &Trace)> {
        let task = self.current_task()?;
        let cursor = self.trace_cursor?;
        task.traces.sorted().get(cursor).map(|t| (cursor, *t))
    }

    /// Mutating access to the per-task trace collections.
    pub fn traces_mut(&mut self) -> TraceStore<'_> {
        TraceStore::new(self)
    }

    pub(crate) fn current_trace_count(&self) -> usize {
        self.current_task().map_or(0, |t| t.traces.len())
    }

    pub(crate) fn reset_trace_cursor(&mut self) {
        self.trace_cursor = Some(0);
        self.clamp_trace_cursor();
    }

    pub(crate) fn clamp_trace_cursor(&mut self) {
        let count = self.current_trace_count();
        self.trace_cursor = match count {
            0 => None,
            n => Some(self.trace_cursor.unwrap_or(0).min(n - 1)),
        };
    }

    fn require_current(&self) -> Result<usize, AppError> {
        self.current.ok_or_else(|| AppError::validation("No task loaded."))
    }

    // Opening a malformed task fails without touching the cursors.
    fn open(&mut self, index: usize) -> Result<&Task, AppError> {
        let task = &self.tasks[index];
        let content = task.content.as_ref().map_err(|msg| {
            AppError::load(format!(
                "Error processing task {}: {msg}",
                task.id().unwrap_or("<unnamed>")
            ))
        })?;
        self.test_cursor = (!content.tests.is_empty()).then_some(0);
        self.current = Some(index);
        self.opened += 1;
        self.reset_trace_cursor();
        info!(index, id = ?self.tasks[index].id(), "task opened");
        Ok(&self.tasks[index])
    }
}
