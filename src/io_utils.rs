//! File-level wrappers around the row pipeline.
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **Path vs handle**: the `*_from`/`*_to` variants leave the handle's
//!   lifetime to the caller; the path variants drain everything before the
//!   file closes.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    caster::CastSpec,
    error::Error,
    process::{ProcessOptions, process},
    row::Row,
    transform::{BatchExt, CastWithOptions, RowStream, RowStreamExt, VectorizeOptions},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const DEFAULT_BATCH_SIZE: usize = 20;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if let Some(path) = path {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => return DEFAULT_TSV_DELIMITER,
            Some(ext) if ext.eq_ignore_ascii_case("csv") => return DEFAULT_CSV_DELIMITER,
            _ => {}
        }
    }
    fallback
}

/// Header rows are data to the pipeline, and ragged rows are tolerated by
/// mappify, so the reader neither consumes headers nor enforces widths.
pub fn open_csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .double_quote(true)
        .from_reader(reader)
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    Ok(if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    })
}

pub fn open_output(path: Option<&Path>, encoding: &'static Encoding) -> Result<Box<dyn Write>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    Ok(if encoding == UTF_8 {
        base
    } else {
        Box::new(TranscodingWriter::new(base, encoding))
    })
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String, Error> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to decode text with encoding {}", encoding.name()),
        )))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Result<Vec<String>, Error> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Positional rows from a byte-level reader, decoded with `encoding`.
pub fn decoded_rows<R: Read>(
    reader: csv::Reader<R>,
    encoding: &'static Encoding,
) -> impl Iterator<Item = crate::error::Result<Row>> {
    reader
        .into_byte_records()
        .map(move |record| -> crate::error::Result<Row> {
            Ok(Row::from_strings(decode_record(&record?, encoding)?))
        })
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Falls back to the path extension, then comma.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub process: ProcessOptions,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            process: ProcessOptions::default(),
        }
    }
}

/// Parses and processes everything `reader` yields.
pub fn read_csv_from<R: Read>(reader: R, options: &ReadOptions) -> Result<Vec<Row>> {
    let delimiter = options.delimiter.unwrap_or(DEFAULT_CSV_DELIMITER);
    let csv_reader = open_csv_reader(reader, delimiter);
    let rows = process(decoded_rows(csv_reader, options.encoding), &options.process)
        .collect::<crate::error::Result<Vec<_>>>()?;
    debug!("Read {} row(s)", rows.len());
    Ok(rows)
}

/// Opens `path` (`-` for stdin), processes it and returns the realized rows.
pub fn read_csv(path: &Path, options: &ReadOptions) -> Result<Vec<Row>> {
    let delimiter = resolve_input_delimiter(path, options.delimiter);
    let input = open_input(path)?;
    let options = ReadOptions {
        delimiter: Some(delimiter),
        ..options.clone()
    };
    read_csv_from(input, &options).with_context(|| format!("Reading {path:?}"))
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub delimiter: Option<u8>,
    pub batch_size: usize,
    /// Applied to each row before it is vectorized, so keyed rows can be
    /// cast by column key.
    pub cast_fns: Option<CastSpec>,
    pub vectorize: VectorizeOptions,
    pub encoding: &'static Encoding,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            batch_size: DEFAULT_BATCH_SIZE,
            cast_fns: None,
            vectorize: VectorizeOptions::default(),
            encoding: UTF_8,
        }
    }
}

/// Writes `rows` to `writer`. Keyed rows are vectorized first; positional
/// rows are written as they come. Returns the number of rows written.
pub fn write_csv_to<W, I>(writer: W, rows: I, options: &WriteOptions) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = Row>,
{
    write_stream_to(writer, rows.into_iter().map(Ok), options)
}

/// [`write_csv_to`] over a fallible stream; the first upstream error stops
/// the write after flushing the batches already completed.
pub fn write_stream_to<W, I>(writer: W, rows: I, options: &WriteOptions) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = crate::error::Result<Row>>,
{
    let delimiter = options.delimiter.unwrap_or(DEFAULT_CSV_DELIMITER);
    let mut rows = rows.into_iter().peekable();
    let keyed = matches!(rows.peek(), Some(Ok(Row::Keyed(_))));
    let cast: RowStream<'_> = match &options.cast_fns {
        Some(spec) => Box::new(rows.cast_with(spec.clone(), CastWithOptions::default())),
        None => Box::new(rows),
    };
    let stream: RowStream<'_> = if keyed {
        Box::new(cast.vectorize(options.vectorize.clone()))
    } else {
        cast
    };

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .double_quote(true)
        .from_writer(writer);
    let mut written = 0usize;
    for (idx, batch) in stream.batch(options.batch_size).enumerate() {
        let mut failure = None;
        for row in batch {
            match row {
                Ok(row) => {
                    csv_writer
                        .write_record(row.to_strings())
                        .context("Writing CSV row")?;
                    written += 1;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = failure {
            csv_writer.flush().context("Flushing CSV output")?;
            return Err(err.into());
        }
        debug!("Flushed batch {} ({written} row(s) so far)", idx + 1);
    }
    csv_writer.flush().context("Flushing CSV output")?;
    Ok(written)
}

/// Writes `rows` to `path` (`-` for stdout).
pub fn write_csv<I>(path: &Path, rows: I, options: &WriteOptions) -> Result<usize>
where
    I: IntoIterator<Item = Row>,
{
    let delimiter = resolve_output_delimiter(Some(path), options.delimiter, DEFAULT_CSV_DELIMITER);
    let output = open_output(Some(path), options.encoding)?;
    let options = WriteOptions {
        delimiter: Some(delimiter),
        ..options.clone()
    };
    write_csv_to(output, rows, &options).with_context(|| format!("Writing {path:?}"))
}

struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: Vec::new(),
        }
    }

    /// Encodes the longest valid UTF-8 prefix of the buffer. A split
    /// multi-byte sequence at the tail waits for the next write unless
    /// `force` is set.
    fn flush_buffer(&mut self, force: bool) -> io::Result<()> {
        let valid_up_to = match std::str::from_utf8(&self.buffer) {
            Ok(_) => self.buffer.len(),
            Err(err) if err.error_len().is_some() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid UTF-8 sequence in output stream",
                ));
            }
            Err(err) => err.valid_up_to(),
        };
        if valid_up_to > 0 {
            let pending = self.buffer.drain(..valid_up_to).collect::<Vec<_>>();
            let text = String::from_utf8(pending)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.encode_and_write(&text)?;
        }
        if force && !self.buffer.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete UTF-8 sequence at end of output stream",
            ));
        }
        Ok(())
    }

    fn encode_and_write(&mut self, text: &str) -> io::Result<()> {
        let (encoded, _output_encoding, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to encode text using {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(encoded.as_ref())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.flush_buffer(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer(true)?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casts::CastKind;
    use crate::data::Value;

    #[test]
    fn delimiter_follows_extension_unless_given() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.TSV"), Some(b';')), b';');
        assert_eq!(resolve_input_delimiter(Path::new("a.txt"), None), b',');
        assert_eq!(resolve_output_delimiter(None, None, b'|'), b'|');
    }

    #[test]
    fn read_from_handle_runs_the_pipeline() {
        let input = "# note\nName,Qty\nbolt,3\nnut,\n";
        let options = ReadOptions {
            process: ProcessOptions {
                cast_fns: Some(CastSpec::columns().with_kind("Qty", CastKind::Long)),
                ..ProcessOptions::default()
            },
            ..ReadOptions::default()
        };
        let rows = read_csv_from(input.as_bytes(), &options).unwrap();
        let records = rows
            .into_iter()
            .map(|row| row.into_record().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Qty"), Some(&Value::Long(3)));
        assert_eq!(records[1].get("Qty"), Some(&Value::Null));
    }

    #[test]
    fn keyed_rows_are_vectorized_in_batches() {
        let rows = vec![
            Row::Keyed([("a", "1"), ("b", "x")].into_iter().collect()),
            Row::Keyed([("a", "2")].into_iter().collect()),
        ];
        let mut out = Vec::new();
        let options = WriteOptions {
            batch_size: 1,
            ..WriteOptions::default()
        };
        let written = write_csv_to(&mut out, rows, &options).unwrap();
        assert_eq!(written, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\n1,x\n2,\n");
    }

    #[test]
    fn write_casts_skip_the_emitted_header() {
        let rows = vec![Row::Keyed([("n", "4.7")].into_iter().collect())];
        let options = WriteOptions {
            cast_fns: Some(CastSpec::all(CastKind::Int.cast_fn(Default::default()))),
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        write_csv_to(&mut out, rows, &options).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "n\n4\n");
    }

    #[test]
    fn write_casts_address_keyed_columns() {
        let rows = vec![
            Row::Keyed([("n", "4.7"), ("s", "x")].into_iter().collect()),
            Row::Keyed([("n", "12"), ("s", "y")].into_iter().collect()),
        ];
        let options = WriteOptions {
            cast_fns: Some(CastSpec::columns().with_kind("n", CastKind::Int)),
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        let written = write_csv_to(&mut out, rows, &options).unwrap();
        assert_eq!(written, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "n,s\n4,x\n12,y\n");
    }

    #[test]
    fn failed_write_cast_leaves_no_header_behind() {
        let rows = vec![Row::Keyed([("n", "many")].into_iter().collect())];
        let options = WriteOptions {
            cast_fns: Some(CastSpec::columns().with_kind("n", CastKind::Int)),
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        let err = write_csv_to(&mut out, rows, &options).unwrap_err();
        assert!(format!("{err:#}").contains("'n'"), "{err:#}");
        assert!(out.is_empty());
    }

    #[test]
    fn transcoding_writer_handles_split_sequences() {
        let mut out = Vec::new();
        {
            let mut writer = TranscodingWriter::new(&mut out, encoding_rs::WINDOWS_1252);
            let bytes = "café".as_bytes();
            writer.write_all(&bytes[..4]).unwrap();
            writer.write_all(&bytes[4..]).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(out, vec![b'c', b'a', b'f', 0xE9]);
    }
}
