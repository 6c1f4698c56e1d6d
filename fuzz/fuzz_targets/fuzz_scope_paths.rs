// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use repograph::graph::{hierarchy_segments, path_in_scope};
use std::path::Path;

#[derive(Debug, Arbitrary)]
struct Input {
    path: String,
    scope: String,
    anchor: String,
}

fuzz_target!(|input: Input| {
    // A path is always in its own scope
    assert!(path_in_scope(&input.path, &input.path));
    if path_in_scope(&input.path, &input.scope) {
        assert!(input.path.starts_with(&input.scope));
    }

    let segments = hierarchy_segments(Path::new(&input.path), &input.anchor);
    assert!(segments.iter().all(|s| !s.contains('/')));
});
