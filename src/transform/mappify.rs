use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::{
    error::{Error, Result},
    row::{Record, Row, keyify, snake_case_key},
};

/// Rewrites one header cell into a record key.
pub type HeaderFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct MappifyOptions {
    /// Trim captured header cells with [`keyify`].
    pub keyify: bool,
    /// Header to use instead of consuming the first row.
    pub header: Option<Vec<String>>,
    /// Applied to each captured header cell; takes precedence over `keyify`.
    pub transform_header: Option<HeaderFn>,
}

impl Default for MappifyOptions {
    fn default() -> Self {
        Self {
            keyify: true,
            header: None,
            transform_header: None,
        }
    }
}

impl MappifyOptions {
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

    /// Captured header cells become `snake_case` keys.
    pub fn snake_case_keys(self) -> Self {
        Self {
            transform_header: Some(Arc::new(snake_case_key)),
            ..self
        }
    }

    fn header_key(&self, cell: &str) -> String {
        if let Some(transform) = &self.transform_header {
            transform(cell)
        } else if self.keyify {
            keyify(cell)
        } else {
            cell.to_string()
        }
    }
}

impl fmt::Debug for MappifyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappifyOptions")
            .field("keyify", &self.keyify)
            .field("header", &self.header)
            .field("transform_header", &self.transform_header.is_some())
            .finish()
    }
}

/// Turns positional rows into keyed records.
///
/// Without a supplied header the first row is consumed as the header and
/// produces no output. Rows and header are zipped to the shorter of the two;
/// surplus cells or keys are dropped.
#[derive(Debug)]
pub struct Mappify<I> {
    upstream: I,
    options: MappifyOptions,
    header: Option<Vec<String>>,
}

impl<I> Mappify<I> {
    pub fn new(upstream: I, mut options: MappifyOptions) -> Self {
        let header = options.header.take();
        Self {
            upstream,
            options,
            header,
        }
    }

    /// The header in effect, once captured or when supplied.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }
}

/// Suffixes repeated keys with `_2`, `_3`, ... so no column is overwritten.
fn disambiguate(keys: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        let mut candidate = key.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{key}_{n}");
        }
        if n > 1 {
            debug!("Duplicate header key {key:?} renamed to {candidate:?}");
        }
        seen.push(candidate);
    }
    seen
}

fn zip_record(header: &[String], cells: Vec<crate::data::Value>) -> Record {
    let mut record = Record::with_capacity(header.len().min(cells.len()));
    for (key, value) in header.iter().zip(cells) {
        record.insert(key.clone(), value);
    }
    record
}

impl<I> Iterator for Mappify<I>
where
    I: Iterator<Item = Result<Row>>,
{
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let cells = match self.upstream.next()? {
                Ok(Row::Positional(cells)) => cells,
                Ok(Row::Keyed(_)) => {
                    return Some(Err(Error::configuration(
                        "mappify expects positional rows but received a keyed record",
                    )));
                }
                Err(err) => return Some(Err(err)),
            };
            match &self.header {
                Some(header) => return Some(Ok(Row::Keyed(zip_record(header, cells)))),
                None => {
                    let header = disambiguate(
                        cells
                            .iter()
                            .map(|cell| self.options.header_key(&cell.as_display()))
                            .collect(),
                    );
                    debug!("Captured header with {} column(s): {:?}", header.len(), header);
                    self.header = Some(header);
                }
            }
        }
    }
}
