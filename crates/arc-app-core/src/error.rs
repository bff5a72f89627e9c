// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for user-triggered actions.
//!
//! Every variant is terminal for the action that raised it only; callers
//! report it through [`crate::notice::NoticeBoard`] and carry on.

use arc_grid::GridError;
use thiserror::Error;

/// Failure of a single user or adapter action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Malformed or empty dataset, or a task missing required fields.
    #[error("{0}")]
    Load(String),
    /// Rejected input (bad dimensions, empty trace text, ...).
    #[error("{0}")]
    Validation(String),
    /// Grid-level validation failure.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// Navigation by id missed.
    #[error("{0}")]
    NotFound(String),
    /// Server action attempted while disconnected.
    #[error("{0}")]
    Connection(String),
}

impl AppError {
    /// Shorthand for [`AppError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Shorthand for [`AppError::Load`].
    pub fn load(msg: impl Into<String>) -> Self {
        AppError::Load(msg.into())
    }
}
