// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved client preferences.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Display name used until the user picks one.
pub const ANONYMOUS: &str = "Anonymous";

/// Config key the prefs are stored under.
pub const PREFS_KEY: &str = "client";

/// Preferences shared by arc-trace front-ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientPrefs {
    /// Display name attached to traces and votes.
    pub username: String,
    /// Trace server socket.
    pub socket_path: PathBuf,
    /// Directory holding `<dataset>.json` files.
    pub data_dir: PathBuf,
    /// Show the Hamming distance readout.
    pub show_distance: bool,
}

impl Default for ClientPrefs {
    fn default() -> Self {
        Self {
            username: ANONYMOUS.to_owned(),
            socket_path: arc_session_proto::default_socket_path(),
            data_dir: PathBuf::from("data"),
            show_distance: true,
        }
    }
}
