// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Candidate-solution editor: the active test input plus the output grid
//! being drawn.

use arc_grid::{hamming_distance, Clipboard, Coord, Grid, Symbol};
use std::fmt;
use std::num::NonZeroUsize;

use crate::catalog::TestPair;
use crate::AppError;

/// Side length of the blank grid shown before any sizing.
pub const DEFAULT_SIDE: usize = 3;
/// Largest accepted side length for a resize.
pub const MAX_SIDE: usize = 30;

/// Parse a `HxW` size field.
pub fn parse_size(text: &str) -> Result<(usize, usize), AppError> {
    let format_err =
        || AppError::validation("Grid size should have the format \"3x3\", \"5x7\", etc.");
    let (h, w) = text.trim().split_once('x').ok_or_else(format_err)?;
    let h: usize = h.trim().parse().map_err(|_| format_err())?;
    let w: usize = w.trim().parse().map_err(|_| format_err())?;
    if h < 1 || w < 1 {
        return Err(AppError::validation(
            "Grid size should be at least 1. Cannot have a grid with no cells.",
        ));
    }
    if h > MAX_SIDE || w > MAX_SIDE {
        return Err(AppError::validation(format!(
            "Grid size should be at most {MAX_SIDE} per side. Pick a smaller size."
        )));
    }
    Ok((h, w))
}

/// Outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Output matches the reference cell for cell.
    Correct,
    /// Same shape, different content.
    Wrong,
}

/// Similarity of the output to the reference, for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceReading {
    /// No reference output is available.
    NotApplicable,
    /// Shapes differ.
    Incomparable,
    /// Fraction of differing cells.
    Ratio(f64),
}

impl fmt::Display for DistanceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceReading::NotApplicable => f.write_str("N/A"),
            DistanceReading::Incomparable => f.write_str("Infinity (Size Mismatch)"),
            DistanceReading::Ratio(r) => write!(f, "{r:.2}"),
        }
    }
}

fn blank() -> Grid {
    let side = NonZeroUsize::MIN.saturating_add(DEFAULT_SIDE - 1);
    Grid::blank(side, side)
}

/// Test input and candidate output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editor {
    input: Grid,
    output: Grid,
}

impl Default for Editor {
    fn default() -> Self {
        Self {
            input: blank(),
            output: blank(),
        }
    }
}

impl Editor {
    /// Blank 3x3 input and output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a test pair's input (blank when none) and reset the output.
    pub fn install(&mut self, pair: Option<&TestPair>) {
        self.input = pair.map_or_else(blank, |p| p.input.clone());
        self.reset_output();
    }

    /// Active test input.
    pub fn input(&self) -> &Grid {
        &self.input
    }

    /// Candidate output.
    pub fn output(&self) -> &Grid {
        &self.output
    }

    /// Blank 3x3 output.
    pub fn reset_output(&mut self) {
        self.output = blank();
    }

    /// Resize the output, keeping the top-left overlap.
    pub fn resize_output(&mut self, height: usize, width: usize) -> Result<(), AppError> {
        self.output = self.output.resize(height, width)?;
        Ok(())
    }

    /// Replace the output with an already drawn grid.
    pub fn set_output(&mut self, output: Grid) {
        self.output = output;
    }

    /// Replace the output with a copy of the input.
    pub fn copy_from_input(&mut self) {
        self.output = self.input.clone();
    }

    /// Edit mode: paint one cell.
    pub fn paint(&mut self, x: usize, y: usize, symbol: Symbol) -> Result<(), AppError> {
        self.output.set(x, y, symbol)?;
        Ok(())
    }

    /// Select mode: paint the selected cells.
    pub fn paint_selection(&mut self, cells: &[Coord], symbol: Symbol) -> Result<(), AppError> {
        self.output.fill_cells(cells, symbol)?;
        Ok(())
    }

    /// Flood-fill mode.
    pub fn flood_fill(&mut self, x: usize, y: usize, symbol: Symbol) -> Result<(), AppError> {
        self.output = self.output.flood_fill(x, y, symbol)?;
        Ok(())
    }

    /// Copy selected output cells into `clipboard`.
    pub fn copy_selection(&self, clipboard: &mut Clipboard, selection: &[Coord]) {
        clipboard.copy_selection(&self.output, selection);
    }

    /// Paste `clipboard` at a single-cell destination.
    pub fn paste(&mut self, clipboard: &Clipboard, destination: &[Coord]) -> Result<(), AppError> {
        self.output = clipboard.paste(destination, &self.output)?;
        Ok(())
    }

    /// Compare the output against the active test pair's reference.
    pub fn submit(&self, pair: Option<&TestPair>) -> Result<Verdict, AppError> {
        let reference = pair
            .and_then(|p| p.output.as_ref())
            .ok_or_else(|| AppError::validation("No reference output for this test input."))?;
        if reference.dimensions() != self.output.dimensions() {
            return Err(AppError::validation("Wrong solution dimensions."));
        }
        Ok(if *reference == self.output {
            Verdict::Correct
        } else {
            Verdict::Wrong
        })
    }

    /// Distance of the output from the active test pair's reference.
    pub fn distance(&self, pair: Option<&TestPair>) -> DistanceReading {
        match pair.and_then(|p| p.output.as_ref()) {
            None => DistanceReading::NotApplicable,
            Some(reference) => {
                let d = hamming_distance(&self.output, reference);
                if d.is_finite() {
                    DistanceReading::Ratio(d)
                } else {
                    DistanceReading::Incomparable
                }
            }
        }
    }
}
