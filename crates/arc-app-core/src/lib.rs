// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for arc-trace front-ends: task catalog,
//! per-task trace store, output editor, notices, config and prefs.
//! Everything here is a pure state transition; transport and rendering
//! adapters live elsewhere and call in.

pub mod app;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod editor;
mod error;
pub mod notice;
pub mod prefs;
pub mod traces;

pub use error::AppError;
