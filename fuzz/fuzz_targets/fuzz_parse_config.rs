// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![no_main]

use libfuzzer_sys::fuzz_target;
use repograph::loader::{parse_config, validate_config, ConfigFormat};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        for format in [ConfigFormat::Yaml, ConfigFormat::Toml, ConfigFormat::Json] {
            // Any accepted document must also be checkable
            if let Ok(config) = parse_config(text, format) {
                let _ = validate_config(&config);
            }
        }
    }
});
