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

//! Session settings shared by the script generator and the row parser.
//!
//! Whatever the client is told to emit (delimiter, quote, NULL text) is
//! exactly what the parser expects to read back.

use crate::domain::errors::{ExportError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolFormat {
    pub delimiter: u8,
    pub quote: u8,
    /// Text the client prints for NULL (`SET NULL`).
    pub null_sentinel: String,
}

impl Default for SpoolFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            null_sentinel: "NULL".to_string(),
        }
    }
}

impl SpoolFormat {
    /// Builds a format from a config string; the delimiter must be one ASCII byte.
    pub fn new(delimiter: &str, null_sentinel: &str) -> Result<Self> {
        let bytes = delimiter.as_bytes();
        if bytes.len() != 1 || !bytes[0].is_ascii() {
            return Err(ExportError::ConfigError(format!(
                "field delimiter must be a single ASCII character, got '{}'",
                delimiter
            )));
        }
        let format = Self {
            delimiter: bytes[0],
            null_sentinel: null_sentinel.to_string(),
            ..Self::default()
        };
        if format.delimiter == format.quote {
            return Err(ExportError::ConfigError(
                "field delimiter cannot be the quote character".to_string(),
            ));
        }
        if null_sentinel.contains('\'') {
            return Err(ExportError::ConfigError(
                "NULL placeholder cannot contain a single quote".to_string(),
            ));
        }
        Ok(format)
    }

    pub fn delimiter_char(&self) -> char {
        self.delimiter as char
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_delimiter() {
        let f = SpoolFormat::new("|", "<null>").unwrap();
        assert_eq!(f.delimiter, b'|');
        assert_eq!(f.null_sentinel, "<null>");
        assert!(SpoolFormat::new("||~||", "NULL").is_err());
        assert!(SpoolFormat::new("\"", "NULL").is_err());
        assert!(SpoolFormat::new(",", "it's").is_err());
    }
}
