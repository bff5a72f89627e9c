// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Copy/paste buffer of grid cells.

use crate::grid::{Coord, Grid, GridError, Symbol};

/// One copied cell: source coordinate plus its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopiedCell {
    /// Source row.
    pub x: usize,
    /// Source column.
    pub y: usize,
    /// Copied symbol.
    pub symbol: Symbol,
}

/// Transient buffer of copied cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clipboard {
    cells: Vec<CopiedCell>,
}

impl Clipboard {
    /// Empty clipboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content with `cells` verbatim. An empty list clears it.
    pub fn copy(&mut self, cells: Vec<CopiedCell>) {
        self.cells = cells;
    }

    /// Copy the selected cells of `grid`. Coordinates outside the grid are ignored.
    pub fn copy_selection(&mut self, grid: &Grid, selection: &[Coord]) {
        let cells = selection
            .iter()
            .filter_map(|&(x, y)| grid.get(x, y).map(|symbol| CopiedCell { x, y, symbol }))
            .collect();
        self.copy(cells);
    }

    /// Copied cells in copy order.
    pub fn cells(&self) -> &[CopiedCell] {
        &self.cells
    }

    /// Whether nothing is copied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Paste with the copied block's top-left corner at `(target_x, target_y)`.
    ///
    /// Cells landing outside `grid` are dropped; partial pastes at the edge
    /// are expected.
    pub fn paste_at(&self, target_x: usize, target_y: usize, grid: &Grid) -> Grid {
        let mut out = grid.clone();
        let (Some(min_x), Some(min_y)) = (
            self.cells.iter().map(|c| c.x).min(),
            self.cells.iter().map(|c| c.y).min(),
        ) else {
            return out;
        };
        for cell in &self.cells {
            let (Some(x), Some(y)) = (
                target_x.checked_add(cell.x - min_x),
                target_y.checked_add(cell.y - min_y),
            ) else {
                continue;
            };
            if let Some(slot) = out.cell_mut(x, y) {
                *slot = cell.symbol;
            }
        }
        out
    }

    /// Paste into a destination selection, which must be exactly one cell.
    pub fn paste(&self, destination: &[Coord], grid: &Grid) -> Result<Grid, GridError> {
        if self.is_empty() {
            return Err(GridError::EmptyClipboard);
        }
        match destination {
            [(x, y)] => Ok(self.paste_at(*x, *y, grid)),
            other => Err(GridError::PasteDestination(other.len())),
        }
    }
}
