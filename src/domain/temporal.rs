// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Temporal format models.
//!
//! The query projects temporal columns through `TO_CHAR` with an Oracle
//! format model. The same model is translated to a `chrono` pattern so the
//! exported text can be parsed back (validation, round-trip tests).

use crate::domain::errors::{ExportError, Result};
use chrono::NaiveDateTime;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "YYYY-MM-DD HH24:MI:SS.FF6";

// Longest tokens first so "HH24" wins over "HH".
const TOKENS: [(&str, &str); 14] = [
    ("YYYY", "%Y"),
    ("HH24", "%H"),
    ("HH12", "%I"),
    ("FF3", "%3f"),
    ("FF6", "%6f"),
    ("FF9", "%9f"),
    ("MON", "%b"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%I"),
    ("MI", "%M"),
    ("SS", "%S"),
    ("AM", "%p"),
    ("PM", "%p"),
];

const LITERALS: &[char] = &['-', '/', ':', ',', '.', ';', ' '];

/// An Oracle datetime format model together with its `chrono` equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalFormat {
    oracle: String,
    chrono: String,
}

impl TemporalFormat {
    /// Parses an Oracle format model.
    ///
    /// Only the subset needed for lossless export is accepted, and the model
    /// must carry fractional seconds (`FF3`, `FF6` or `FF9`).
    pub fn new(oracle_pattern: &str) -> Result<Self> {
        let chrono = translate(oracle_pattern)?;
        if !["%3f", "%6f", "%9f"].iter().any(|f| chrono.contains(f)) {
            return Err(ExportError::ConfigError(format!(
                "timestamp format '{}' has no fractional seconds (FF3/FF6/FF9)",
                oracle_pattern
            )));
        }
        Ok(Self {
            oracle: oracle_pattern.to_string(),
            chrono,
        })
    }

    pub fn oracle_pattern(&self) -> &str {
        &self.oracle
    }

    pub fn chrono_pattern(&self) -> &str {
        &self.chrono
    }

    /// Renders a value the way `TO_CHAR` with this model would.
    pub fn render(&self, value: &NaiveDateTime) -> String {
        value.format(&self.chrono).to_string()
    }

    pub fn parse(&self, text: &str) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(text, &self.chrono).map_err(|e| {
            ExportError::ArtifactError(format!(
                "'{}' does not match '{}': {}",
                text, self.oracle, e
            ))
        })
    }
}

impl Default for TemporalFormat {
    fn default() -> Self {
        Self {
            oracle: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            chrono: "%Y-%m-%d %H:%M:%S.%6f".to_string(),
        }
    }
}

fn translate(pattern: &str) -> Result<String> {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;

    'outer: while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').ok_or_else(|| {
                ExportError::ConfigError(format!("unterminated quote in format '{}'", pattern))
            })?;
            for c in quoted[..end].chars() {
                push_literal(&mut out, c);
            }
            rest = &quoted[end + 1..];
            continue;
        }
        for (token, strftime) in TOKENS {
            if let Some(tail) = strip_token(rest, token) {
                out.push_str(strftime);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if LITERALS.contains(&c) => {
                push_literal(&mut out, c);
                rest = chars.as_str();
            }
            _ => {
                return Err(ExportError::ConfigError(format!(
                    "unsupported element near '{}' in format '{}'",
                    rest, pattern
                )))
            }
        }
    }
    Ok(out)
}

/// Case-insensitive `strip_prefix` for ASCII format elements.
fn strip_token<'a>(rest: &'a str, token: &str) -> Option<&'a str> {
    let head = rest.get(..token.len())?;
    if head.eq_ignore_ascii_case(token) {
        Some(&rest[token.len()..])
    } else {
        None
    }
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
