use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::{
    data::Value,
    error::{Error, Result},
    row::{Record, Row},
};

/// Renders one header key into the emitted header cell.
pub type HeaderFormatter = Arc<dyn Fn(&str) -> Value + Send + Sync>;

#[derive(Clone)]
pub struct VectorizeOptions {
    /// Column order to project onto; defaults to the first record's keys.
    pub header: Option<Vec<String>>,
    /// Emit the header as the first output row.
    pub prepend_header: bool,
    /// Defaults to emitting each key as a string cell.
    pub format_header: Option<HeaderFormatter>,
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        Self {
            header: None,
            prepend_header: true,
            format_header: None,
        }
    }
}

impl VectorizeOptions {
    pub fn with_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: Some(header.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

impl fmt::Debug for VectorizeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorizeOptions")
            .field("header", &self.header)
            .field("prepend_header", &self.prepend_header)
            .field("format_header", &self.format_header.is_some())
            .finish()
    }
}

/// Projects keyed records back onto positional rows.
///
/// Keys missing from a record come out as [`Value::Null`]; keys outside the
/// header are dropped.
#[derive(Debug)]
pub struct Vectorize<I> {
    upstream: I,
    options: VectorizeOptions,
    header: Option<Vec<String>>,
    header_emitted: bool,
    pending: Option<Record>,
}

impl<I> Vectorize<I> {
    pub fn new(upstream: I, mut options: VectorizeOptions) -> Self {
        let header = options.header.take();
        let header_emitted = !options.prepend_header;
        Self {
            upstream,
            options,
            header,
            header_emitted,
            pending: None,
        }
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    fn header_row(&self, header: &[String]) -> Row {
        let cells = header
            .iter()
            .map(|key| match &self.options.format_header {
                Some(format) => format(key),
                None => Value::String(key.clone()),
            })
            .collect();
        Row::Positional(cells)
    }
}

fn project(header: &[String], record: &Record) -> Row {
    Row::Positional(
        header
            .iter()
            .map(|key| record.get(key).cloned().unwrap_or_default())
            .collect(),
    )
}

impl<I> Iterator for Vectorize<I>
where
    I: Iterator<Item = Result<Row>>,
{
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.pending.take() {
            Some(record) => record,
            None => match self.upstream.next() {
                Some(Ok(Row::Keyed(record))) => record,
                Some(Ok(Row::Positional(_))) => {
                    return Some(Err(Error::configuration(
                        "vectorize expects keyed records but received a positional row",
                    )));
                }
                Some(Err(err)) => return Some(Err(err)),
                None => {
                    // A supplied header is still written for an empty stream.
                    if !self.header_emitted
                        && let Some(header) = &self.header
                    {
                        self.header_emitted = true;
                        return Some(Ok(self.header_row(header)));
                    }
                    return None;
                }
            },
        };

        if self.header.is_none() {
            let captured = record.keys().map(str::to_string).collect::<Vec<_>>();
            debug!("Vectorize captured header {:?}", captured);
            self.header = Some(captured);
        }
        let header = self.header.as_deref().unwrap_or_default();

        if !self.header_emitted {
            self.header_emitted = true;
            let header_row = self.header_row(header);
            self.pending = Some(record);
            return Some(Ok(header_row));
        }
        Some(Ok(project(header, &record)))
    }
}
