// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Application-state context owned by a front-end's event loop.
//!
//! [`AppState`] bundles the catalog, the output editor, the clipboard, the
//! notice board and the user's display name. Every method is a synchronous
//! state transition; failures are returned to the caller, who decides
//! whether to [`AppState::report`] them.

use arc_grid::{Clipboard, Coord};
use rand::Rng;
use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::{TaskCatalog, TestPair};
use crate::dataset::{self, Export};
use crate::editor::{DistanceReading, Editor, Verdict};
use crate::notice::NoticeBoard;
use crate::prefs::ANONYMOUS;
use crate::traces::{Trace, TraceStore};
use crate::AppError;

/// Task navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Position in the dataset (clamped).
    Index(usize),
    /// Following task.
    Next,
    /// Preceding task.
    Previous,
    /// Task carrying this id.
    Id(String),
    /// Uniformly random task.
    Random,
}

/// Result of [`AppState::load_dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Dataset replaced and its first task opened.
    Loaded,
    /// Same dataset name already loaded; nothing changed.
    AlreadyLoaded,
}

/// Everything a front-end mutates, in one place.
#[derive(Debug)]
pub struct AppState {
    catalog: TaskCatalog,
    editor: Editor,
    clipboard: Clipboard,
    notices: NoticeBoard,
    username: String,
    dataset_name: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ANONYMOUS)
    }
}

impl AppState {
    /// Empty state for `username`.
    pub fn new(username: &str) -> Self {
        let mut state = Self {
            catalog: TaskCatalog::new(),
            editor: Editor::new(),
            clipboard: Clipboard::new(),
            notices: NoticeBoard::default(),
            username: String::new(),
            dataset_name: None,
        };
        state.set_username(username);
        state
    }

    /// Display name attached to traces and votes.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Set the display name; blank input reverts to `Anonymous`.
    pub fn set_username(&mut self, name: &str) {
        let name = name.trim();
        self.username = if name.is_empty() {
            ANONYMOUS.to_owned()
        } else {
            name.to_owned()
        };
    }

    /// Whether a real display name has been chosen.
    pub fn has_username(&self) -> bool {
        self.username != ANONYMOUS
    }

    /// Name of the loaded dataset.
    pub fn dataset_name(&self) -> Option<&str> {
        self.dataset_name.as_deref()
    }

    /// Whether `name` is the dataset currently loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.dataset_name.as_deref() == Some(name) && !self.catalog.is_empty()
    }

    /// Loaded tasks and cursors.
    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// Trace mutations on the loaded tasks.
    pub fn traces_mut(&mut self) -> TraceStore<'_> {
        self.catalog.traces_mut()
    }

    /// Trace under the display cursor, with its ranked position.
    pub fn displayed_trace(&self) -> Option<(usize, &Trace)> {
        self.catalog.displayed_trace()
    }

    /// Output editor.
    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    /// Output editor, for direct grid edits.
    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    /// Copied cells.
    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    /// Pending user-facing messages.
    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Pending user-facing messages, for pushing or draining.
    pub fn notices_mut(&mut self) -> &mut NoticeBoard {
        &mut self.notices
    }

    /// Surface a failed action to the user.
    pub fn report(&mut self, err: &AppError) {
        debug!(%err, "action failed");
        self.notices.report(err);
    }

    /// Replace the catalog with dataset `name` and open its first task.
    ///
    /// Requires a display name. Reloading the dataset already shown is an
    /// info no-op. A failed load leaves no dataset loaded.
    pub fn load_dataset(&mut self, name: &str, data: Value) -> Result<LoadOutcome, AppError> {
        if !self.has_username() {
            return Err(AppError::validation(
                "Please enter a display name before loading a dataset.",
            ));
        }
        if self.is_loaded(name) {
            self.notices
                .info(format!("Dataset '{name}' is already loaded."));
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        self.dataset_name = None;
        self.editor = Editor::new();
        if let Err(err) = self.catalog.load(data) {
            return Err(match err {
                AppError::Load(msg) => AppError::Load(format!("Error: dataset '{name}': {msg}")),
                other => other,
            });
        }
        self.dataset_name = Some(name.to_owned());
        self.editor.install(self.catalog.current_test_pair());
        info!(dataset = name, tasks = self.catalog.len(), "dataset ready");
        self.notices.info(format!(
            "Loaded dataset '{name}' with {} tasks.",
            self.catalog.len()
        ));
        Ok(LoadOutcome::Loaded)
    }

    /// Navigate; returns whether a task was (re)opened.
    pub fn navigate(&mut self, nav: Navigation) -> Result<bool, AppError> {
        self.navigate_with(nav, &mut rand::thread_rng())
    }

    /// [`AppState::navigate`] with an explicit random source.
    pub fn navigate_with<R: Rng>(&mut self, nav: Navigation, rng: &mut R) -> Result<bool, AppError> {
        let before = self.catalog.generation();
        match nav {
            Navigation::Index(i) => self.catalog.goto(i).map(|_| ()),
            Navigation::Next => self.catalog.next().map(|_| ()),
            Navigation::Previous => self.catalog.previous().map(|_| ()),
            Navigation::Id(id) => self.catalog.goto_by_id(id.trim()).map(|_| ()),
            Navigation::Random => self.catalog.random(rng).map(|_| ()),
        }?;
        let opened = self.catalog.generation() != before;
        if opened {
            self.editor.install(self.catalog.current_test_pair());
        }
        Ok(opened)
    }

    /// Show the next test pair of the current task.
    pub fn next_test(&mut self) -> Result<(), AppError> {
        let pair = self.catalog.next_test()?;
        self.editor.install(Some(pair));
        Ok(())
    }

    /// Active test pair.
    pub fn current_test_pair(&self) -> Option<&TestPair> {
        self.catalog.current_test_pair()
    }

    /// Check the output against the active reference and announce the verdict.
    pub fn submit(&mut self) -> Result<Verdict, AppError> {
        let verdict = self.editor.submit(self.catalog.current_test_pair())?;
        match verdict {
            Verdict::Correct => self.notices.info("Correct solution!"),
            Verdict::Wrong => self.notices.error("Wrong solution."),
        };
        Ok(verdict)
    }

    /// Distance readout for the current output.
    pub fn distance(&self) -> DistanceReading {
        self.editor.distance(self.catalog.current_test_pair())
    }

    /// Copy selected output cells; an empty selection leaves the clipboard
    /// as it was.
    pub fn copy_selection(&mut self, selection: &[Coord]) {
        if selection.is_empty() {
            return;
        }
        self.editor.copy_selection(&mut self.clipboard, selection);
        self.notices
            .info("Cells copied! Select a target cell and paste at location.");
    }

    /// Paste the clipboard at a single-cell destination.
    pub fn paste(&mut self, destination: &[Coord]) -> Result<(), AppError> {
        self.editor.paste(&self.clipboard, destination)
    }

    /// Loaded dataset with traces, ready to be written.
    pub fn export(&self) -> Result<Export, AppError> {
        dataset::export(&self.catalog, self.dataset_name())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn data() -> Value {
        json!([
            {"id": "a", "train": [{"input": [[1]], "output": [[2]]}],
             "test": [{"input": [[1, 1]], "output": [[2, 2]]}, {"input": [[3]]}]},
            {"id": "b", "train": [], "test": [{"input": [[4]], "output": [[4]]}]},
        ])
    }

    fn ready() -> AppState {
        let mut app = AppState::new("ann");
        app.load_dataset("original", data()).unwrap();
        app
    }

    #[test]
    fn blank_username_reverts_to_anonymous() {
        let mut app = AppState::new("  ");
        assert_eq!(app.username(), ANONYMOUS);
        app.set_username(" bob ");
        assert_eq!(app.username(), "bob");
        assert!(app.has_username());
    }

    #[test]
    fn load_requires_display_name() {
        let mut app = AppState::default();
        assert!(matches!(
            app.load_dataset("original", data()),
            Err(AppError::Validation(_))
        ));
        assert!(app.catalog().is_empty());
    }

    #[test]
    fn reload_of_same_dataset_is_a_no_op() {
        let mut app = ready();
        app.navigate(Navigation::Next).unwrap();
        assert_eq!(
            app.load_dataset("original", data()).unwrap(),
            LoadOutcome::AlreadyLoaded
        );
        assert_eq!(app.catalog().current_index(), Some(1));
    }

    #[test]
    fn failed_load_clears_dataset() {
        let mut app = ready();
        assert!(matches!(
            app.load_dataset("broken", json!({})),
            Err(AppError::Load(_))
        ));
        assert!(app.catalog().is_empty());
        assert_eq!(app.dataset_name(), None);
    }

    #[test]
    fn navigation_installs_test_input() {
        let mut app = ready();
        assert_eq!(app.editor().input().to_values(), vec![vec![1, 1]]);
        assert!(app.navigate(Navigation::Next).unwrap());
        assert_eq!(app.editor().input().to_values(), vec![vec![4]]);
        assert!(!app.navigate(Navigation::Next).unwrap());
        assert!(app.navigate(Navigation::Id("a".into())).unwrap());
        assert!(matches!(
            app.navigate(Navigation::Id("zz".into())),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(app.catalog().current_index(), Some(0));
        let mut rng = StdRng::seed_from_u64(7);
        assert!(app.navigate_with(Navigation::Random, &mut rng).unwrap());
    }

    #[test]
    fn next_test_then_exhausted() {
        let mut app = ready();
        app.next_test().unwrap();
        assert_eq!(app.editor().input().to_values(), vec![vec![3]]);
        assert_eq!(app.distance(), DistanceReading::NotApplicable);
        assert!(app.next_test().is_err());
    }

    #[test]
    fn submit_announces_verdict() {
        let mut app = ready();
        app.notices_mut().drain();
        app.editor_mut().copy_from_input();
        assert_eq!(app.submit().unwrap(), Verdict::Wrong);
        app.navigate(Navigation::Next).unwrap();
        app.editor_mut().copy_from_input();
        assert_eq!(app.submit().unwrap(), Verdict::Correct);
        let texts: Vec<_> = app.notices_mut().drain().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, ["Wrong solution.", "Correct solution!"]);
    }

    #[test]
    fn empty_copy_keeps_clipboard() {
        let mut app = ready();
        app.editor_mut().copy_from_input();
        app.copy_selection(&[(0, 0)]);
        app.copy_selection(&[]);
        assert_eq!(app.clipboard().cells().len(), 1);
        app.editor_mut().resize_output(2, 2).unwrap();
        app.paste(&[(1, 1)]).unwrap();
        assert_eq!(app.editor().output().to_values(), vec![vec![1, 1], vec![0, 1]]);
    }
}
