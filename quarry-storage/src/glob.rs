// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! Glob-to-regex translation for node-name search.
//!
//! The search syntax is deliberately small: `*` matches any run of
//! characters, `?` matches exactly one, everything else is literal, and the
//! pattern is anchored on both ends. Both backends funnel through this one
//! translation so memory and SQLite agree on every pattern.

use regex::Regex;

use quarry_core::{GraphError, Result};

/// Compile a glob pattern into an anchored regex.
///
/// Empty patterns are rejected with `InvalidArgument`.
pub fn compile(pattern: &str) -> Result<Regex> {
    if pattern.is_empty() {
        return Err(GraphError::InvalidArgument(
            "glob pattern must not be empty".into(),
        ));
    }

    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            _ => source.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4]))),
        }
    }
    source.push('$');

    Regex::new(&source)
        .map_err(|err| GraphError::InvalidArgument(format!("malformed glob {pattern:?}: {err}")))
}
