// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rectangular symbol grid and its pure editing operations.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use thiserror::Error;

/// Cell coordinate `(x, y)`: `x` is the row, `y` the column.
pub type Coord = (usize, usize);

/// Validation failures raised by grid and clipboard operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Height or width was zero.
    #[error("grid dimensions must be positive (got {height}x{width})")]
    EmptyDimensions {
        /// Requested height.
        height: usize,
        /// Requested width.
        width: usize,
    },
    /// Coordinate outside the grid.
    #[error("cell ({x}, {y}) is outside the {height}x{width} grid")]
    OutOfBounds {
        /// Row index.
        x: usize,
        /// Column index.
        y: usize,
        /// Grid height.
        height: usize,
        /// Grid width.
        width: usize,
    },
    /// Symbol value outside the `0..=9` alphabet.
    #[error("symbol {0} is outside the 0..=9 alphabet")]
    InvalidSymbol(u8),
    /// A row length differs from the first row.
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        /// Offending row index.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },
    /// Paste destination selection was not exactly one cell.
    #[error("can only paste at a specific location; select exactly one destination cell (selected {0})")]
    PasteDestination(usize),
    /// Paste requested with nothing copied.
    #[error("no data to paste")]
    EmptyClipboard,
}

/// One cell value from the fixed colour alphabet `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Symbol(u8);

impl Symbol {
    /// Default (blank) symbol used for newly exposed cells.
    pub const BLANK: Symbol = Symbol(0);
    /// Largest symbol value in the alphabet.
    pub const MAX: u8 = 9;

    /// Validate a raw value.
    pub fn new(value: u8) -> Result<Self, GridError> {
        if value > Self::MAX {
            return Err(GridError::InvalidSymbol(value));
        }
        Ok(Self(value))
    }

    /// Raw value.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Symbol {
    type Error = GridError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Symbol> for u8 {
    fn from(s: Symbol) -> Self {
        s.0
    }
}

/// Rectangular matrix of symbols, stored row-major.
///
/// Rectangularity holds by construction: cells live in one flat buffer of
/// exactly `height * width` entries and both dimensions are non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<u8>>", try_from = "Vec<Vec<u8>>")]
pub struct Grid {
    height: usize,
    width: usize,
    cells: Vec<Symbol>,
}

impl Grid {
    /// Create a `height x width` grid of blank cells.
    pub fn new(height: usize, width: usize) -> Result<Self, GridError> {
        Self::filled(height, width, Symbol::BLANK)
    }

    /// Blank grid from dimensions that cannot be zero.
    pub fn blank(height: NonZeroUsize, width: NonZeroUsize) -> Self {
        let (height, width) = (height.get(), width.get());
        Self {
            height,
            width,
            cells: vec![Symbol::BLANK; height * width],
        }
    }

    /// Create a `height x width` grid with every cell set to `fill`.
    pub fn filled(height: usize, width: usize, fill: Symbol) -> Result<Self, GridError> {
        if height == 0 || width == 0 {
            return Err(GridError::EmptyDimensions { height, width });
        }
        Ok(Self {
            height,
            width,
            cells: vec![fill; height * width],
        })
    }

    /// Build a grid from nested raw values, rejecting ragged or empty input.
    pub fn from_values(rows: &[Vec<u8>]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(GridError::EmptyDimensions { height, width });
        }
        let mut cells = Vec::with_capacity(height * width);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != width {
                return Err(GridError::RaggedRow {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
            for &v in values {
                cells.push(Symbol::new(v)?);
            }
        }
        Ok(Self {
            height,
            width,
            cells,
        })
    }

    /// Nested raw values, one inner vector per row.
    pub fn to_values(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.width)
            .map(|row| row.iter().map(|s| s.value()).collect())
            .collect()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// `(height, width)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Whether `(x, y)` lies inside the grid.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.height && y < self.width
    }

    /// Symbol at `(x, y)`, if in bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<Symbol> {
        self.contains(x, y).then(|| self.cells[x * self.width + y])
    }

    pub(crate) fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Symbol> {
        if self.contains(x, y) {
            self.cells.get_mut(x * self.width + y)
        } else {
            None
        }
    }

    /// Overwrite a single cell.
    pub fn set(&mut self, x: usize, y: usize, symbol: Symbol) -> Result<(), GridError> {
        let idx = self.index(x, y)?;
        self.cells[idx] = symbol;
        Ok(())
    }

    /// Paint every listed cell with `symbol`.
    ///
    /// All coordinates are checked first; on error nothing is painted.
    pub fn fill_cells(&mut self, cells: &[Coord], symbol: Symbol) -> Result<(), GridError> {
        let indices = cells
            .iter()
            .map(|&(x, y)| self.index(x, y))
            .collect::<Result<Vec<_>, _>>()?;
        for idx in indices {
            self.cells[idx] = symbol;
        }
        Ok(())
    }

    /// New grid of the given size keeping the overlapping top-left content.
    /// Newly exposed cells are [`Symbol::BLANK`].
    pub fn resize(&self, height: usize, width: usize) -> Result<Grid, GridError> {
        let mut out = Grid::new(height, width)?;
        for x in 0..height.min(self.height) {
            for y in 0..width.min(self.width) {
                out.cells[x * width + y] = self.cells[x * self.width + y];
            }
        }
        Ok(out)
    }

    /// 4-connected flood fill from `(x, y)`.
    ///
    /// Every cell reachable from the origin through neighbours holding the
    /// origin's symbol takes `symbol`. Filling with the origin's own symbol
    /// returns an unchanged copy.
    pub fn flood_fill(&self, x: usize, y: usize, symbol: Symbol) -> Result<Grid, GridError> {
        let origin = self.index(x, y)?;
        let target = self.cells[origin];
        let mut out = self.clone();
        if target == symbol {
            return Ok(out);
        }
        let mut stack = vec![(x, y)];
        while let Some((cx, cy)) = stack.pop() {
            let idx = cx * self.width + cy;
            if out.cells[idx] != target {
                continue;
            }
            out.cells[idx] = symbol;
            if cx > 0 {
                stack.push((cx - 1, cy));
            }
            if cx + 1 < self.height {
                stack.push((cx + 1, cy));
            }
            if cy > 0 {
                stack.push((cx, cy - 1));
            }
            if cy + 1 < self.width {
                stack.push((cx, cy + 1));
            }
        }
        Ok(out)
    }

    /// Row-major iterator over `((x, y), symbol)`.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, Symbol)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &s)| ((i / self.width, i % self.width), s))
    }

    fn index(&self, x: usize, y: usize) -> Result<usize, GridError> {
        if !self.contains(x, y) {
            return Err(GridError::OutOfBounds {
                x,
                y,
                height: self.height,
                width: self.width,
            });
        }
        Ok(x * self.width + y)
    }
}

impl From<Grid> for Vec<Vec<u8>> {
    fn from(grid: Grid) -> Self {
        grid.to_values()
    }
}

impl TryFrom<Vec<Vec<u8>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Grid::from_values(&rows)
    }
}

/// Fraction of differing cells between two grids of identical shape.
///
/// Returns `f64::INFINITY` when the shapes differ; callers treat that as
/// "incomparable" rather than an error.
#[allow(clippy::cast_precision_loss)]
pub fn hamming_distance(a: &Grid, b: &Grid) -> f64 {
    if a.dimensions() != b.dimensions() || a.cells.is_empty() {
        return f64::INFINITY;
    }
    let diff = a
        .cells
        .iter()
        .zip(&b.cells)
        .filter(|(l, r)| l != r)
        .count();
    diff as f64 / a.cells.len() as f64
}
