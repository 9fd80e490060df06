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

//! SQL*Plus script generation.
//!
//! The session settings make the client emit exactly what the row parser
//! reads: CSV markup with the configured delimiter, every field quoted, the
//! NULL placeholder, and no headings, feedback or echo.

use crate::domain::spool::SpoolFormat;
use std::fmt::Write as _;
use std::path::Path;

pub const DEFAULT_ARRAY_SIZE: u32 = 5000;

/// Session settings for one generated script.
#[derive(Debug, Clone)]
pub struct ScriptSettings {
    pub format: SpoolFormat,
    /// Rows per network round trip (`SET ARRAYSIZE`, 1..=5000).
    pub array_size: u32,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            format: SpoolFormat::default(),
            array_size: DEFAULT_ARRAY_SIZE,
        }
    }
}

/// Renders the script that runs `query` and spools its rows to `spool_path`.
pub fn render_script(settings: &ScriptSettings, query: &str, spool_path: &Path) -> String {
    let mut s = String::with_capacity(query.len() + 512);
    s.push_str("WHENEVER SQLERROR EXIT SQL.SQLCODE\n");
    s.push_str("WHENEVER OSERROR EXIT FAILURE\n");
    for setting in [
        "ECHO OFF",
        "TERMOUT OFF",
        "FEEDBACK OFF",
        "HEADING OFF",
        "VERIFY OFF",
        "PAGESIZE 0",
        "LINESIZE 32767",
        "LONG 1000000000",
        "LONGCHUNKSIZE 1000000",
        "TRIMSPOOL ON",
        "TRIMOUT ON",
    ] {
        let _ = writeln!(s, "SET {}", setting);
    }
    let _ = writeln!(s, "SET ARRAYSIZE {}", settings.array_size.clamp(1, 5000));
    let _ = writeln!(s, "SET NULL '{}'", settings.format.null_sentinel);
    let _ = writeln!(
        s,
        "SET MARKUP CSV ON DELIMITER {} QUOTE ON",
        settings.format.delimiter_char()
    );
    let _ = writeln!(s, "SPOOL \"{}\"", spool_path.display());
    s.push_str(query.trim_end().trim_end_matches(';'));
    s.push_str(";\n");
    s.push_str("SPOOL OFF\n");
    s.push_str("EXIT\n");
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_layout() {
        let settings = ScriptSettings {
            format: SpoolFormat::new("|", "<null>").unwrap(),
            array_size: 9000,
        };
        let script = render_script(
            &settings,
            "SELECT 1 FROM DUAL;",
            Path::new("/tmp/spool_1.txt"),
        );

        assert!(script.starts_with("WHENEVER SQLERROR EXIT SQL.SQLCODE\n"));
        assert!(script.contains("SET HEADING OFF\n"));
        assert!(script.contains("SET ARRAYSIZE 5000\n"));
        assert!(script.contains("SET NULL '<null>'\n"));
        assert!(script.contains("SET MARKUP CSV ON DELIMITER | QUOTE ON\n"));
        assert!(script.contains("SPOOL \"/tmp/spool_1.txt\"\nSELECT 1 FROM DUAL;\nSPOOL OFF\n"));
        assert!(script.ends_with("EXIT\n"));
    }

    #[test]
    fn test_spool_path_with_spaces_is_quoted() {
        let script = render_script(
            &ScriptSettings::default(),
            "SELECT 1 FROM DUAL",
            Path::new("/var/tmp/my exports/spool_2.txt"),
        );
        assert!(script.contains("\nSPOOL \"/var/tmp/my exports/spool_2.txt\"\n"));
    }
}
