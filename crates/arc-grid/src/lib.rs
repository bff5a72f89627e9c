// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical puzzle grid shared across arc-trace tools.
//! Pure data (rectangular symbol matrix) with deterministic editing ops:
//! resize, flood fill, copy/paste and Hamming similarity.
//!
//! Coordinates follow the dataset's row-major layout: `x` indexes rows,
//! `y` indexes columns.

mod clipboard;
mod grid;

pub use clipboard::{Clipboard, CopiedCell};
pub use grid::{hamming_distance, Coord, Grid, GridError, Symbol};
