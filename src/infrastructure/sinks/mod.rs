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

//! Output artifact writers.
//!
//! Each sink owns one `ArtifactStream` for the artifact's whole lifetime. The
//! compression decision is made once, when the stream is opened, so a file is
//! either gzip from the first byte to the last or not at all.

pub mod csv_sink;
pub mod json_sink;

use crate::domain::entities::OutputFormat;
use crate::domain::errors::Result;
use crate::ports::sink_port::RowSink;
use flate2::write::GzEncoder;
use flate2::Compression as GzipCompression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes are flushed to disk in chunks of this size.
pub const WRITE_CHUNK: usize = 128 * 1024;

/// Byte stream of an artifact, optionally gzip-compressed.
pub enum ArtifactStream {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl ArtifactStream {
    /// Creates (truncating) the artifact file.
    pub fn create(path: &Path, compress: bool) -> Result<Self> {
        let file = File::create(path)?;
        let buffered = BufWriter::with_capacity(WRITE_CHUNK, file);
        Ok(if compress {
            ArtifactStream::Gzip(GzEncoder::new(buffered, GzipCompression::fast()))
        } else {
            ArtifactStream::Plain(buffered)
        })
    }

    /// Writes the gzip trailer (if any) and flushes everything to disk.
    pub fn close(self) -> Result<()> {
        let mut inner = match self {
            ArtifactStream::Plain(w) => w,
            ArtifactStream::Gzip(gz) => gz.finish()?,
        };
        inner.flush()?;
        inner.get_ref().sync_all()?;
        Ok(())
    }
}

impl Write for ArtifactStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ArtifactStream::Plain(w) => w.write(buf),
            ArtifactStream::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ArtifactStream::Plain(w) => w.flush(),
            ArtifactStream::Gzip(w) => w.flush(),
        }
    }
}

/// Opens the sink matching `format` at `path`.
pub fn open_sink(
    path: &Path,
    format: OutputFormat,
    compress: bool,
    columns: Vec<String>,
) -> Result<Box<dyn RowSink>> {
    let stream = ArtifactStream::create(path, compress)?;
    let sink: Box<dyn RowSink> = match format {
        OutputFormat::Csv => Box::new(csv_sink::CsvSink::new(stream, path.to_path_buf(), columns)?),
        OutputFormat::Json => Box::new(json_sink::JsonSink::new(stream, path.to_path_buf(), columns)?),
    };
    Ok(sink)
}

pub(crate) fn artifact_size(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Row;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_compressed_artifact_is_one_gzip_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv.gz");
        let mut sink = open_sink(&path, OutputFormat::Csv, true, vec!["A".into()]).unwrap();
        sink.write_rows(&[Row::from_values(["1"])]).unwrap();
        sink.write_rows(&[Row::from_values(["2"])]).unwrap();
        let stats = sink.finish().unwrap();
        assert!(stats.bytes > 0);

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "\"A\"\n\"1\"\n\"2\"\n");
    }
}
