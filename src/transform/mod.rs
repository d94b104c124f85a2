//! Lazy, single-pass row stages.
//!
//! Every stage wraps an upstream iterator of `Result<Row>` and pulls from it
//! only when its own consumer asks for the next item. Stages keep their state
//! (a captured header, whether the first row has gone by) in their own
//! fields, so a fresh pipeline has to be built to traverse the rows again.
//! Upstream errors are passed through untouched.
//!
//! [`RowStreamExt`] provides the chaining methods:
//!
//! ```ignore
//! let rows = rows_from_reader(reader)
//!     .remove_comments(CommentMatcher::default())
//!     .mappify(MappifyOptions::default())
//!     .cast_with(spec, CastWithOptions::default());
//! ```

pub mod batch;
pub mod cast;
pub mod comments;
pub mod mappify;
pub mod structify;
pub mod vectorize;

use serde::de::DeserializeOwned;

use crate::{caster::CastSpec, error::Result, row::Row};

pub use batch::Batch;
pub use cast::{CastWith, CastWithOptions, Caster, ExceptFirst};
pub use comments::{CommentMatcher, RemoveComments};
pub use mappify::{HeaderFn, Mappify, MappifyOptions};
pub use structify::Structify;
pub use vectorize::{HeaderFormatter, Vectorize, VectorizeOptions};

/// Boxed stream of rows, the shape [`crate::process::process`] hands back.
pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

/// A one-row-in, one-row-out transformation.
pub trait RowTransform {
    fn apply(&mut self, row: Row) -> Result<Row>;
}

/// Drives a [`RowTransform`] over an upstream stream.
#[derive(Debug)]
pub struct Transformed<I, T> {
    upstream: I,
    transform: T,
}

impl<I, T> Transformed<I, T> {
    pub fn new(upstream: I, transform: T) -> Self {
        Self {
            upstream,
            transform,
        }
    }
}

impl<I, T> Iterator for Transformed<I, T>
where
    I: Iterator<Item = Result<Row>>,
    T: RowTransform,
{
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.upstream.next()?;
        Some(row.and_then(|row| self.transform.apply(row)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.upstream.size_hint()
    }
}

pub trait RowStreamExt: Iterator<Item = Result<Row>> + Sized {
    fn remove_comments(self, matcher: CommentMatcher) -> RemoveComments<Self> {
        RemoveComments::new(self, matcher)
    }

    fn mappify(self, options: MappifyOptions) -> Mappify<Self> {
        Mappify::new(self, options)
    }

    fn cast_with(self, spec: CastSpec, options: CastWithOptions) -> CastWith<Self> {
        cast::cast_with(self, spec, options)
    }

    fn vectorize(self, options: VectorizeOptions) -> Vectorize<Self> {
        Vectorize::new(self, options)
    }

    fn structify<T: DeserializeOwned>(self) -> Structify<Self, T> {
        Structify::new(self)
    }

    fn transform<T: RowTransform>(self, transform: T) -> Transformed<Self, T> {
        Transformed::new(self, transform)
    }
}

impl<I> RowStreamExt for I where I: Iterator<Item = Result<Row>> {}

/// Groups any iterator into fixed-size chunks.
pub trait BatchExt: Iterator + Sized {
    fn batch(self, size: usize) -> Batch<Self> {
        Batch::new(self, size)
    }
}

impl<I: Iterator> BatchExt for I {}

/// Wraps in-memory string rows as an infallible positional row stream.
pub fn rows_from_strings<I, R, S>(rows: I) -> impl Iterator<Item = Result<Row>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = S>,
    S: Into<String>,
{
    rows.into_iter()
        .map(|row| -> Result<Row> { Ok(Row::from_strings(row)) })
}

/// Adapts a `csv` reader into positional rows. Set `has_headers(false)` on
/// the reader when the header row should reach [`Mappify`].
pub fn rows_from_reader<R: std::io::Read>(
    reader: csv::Reader<R>,
) -> impl Iterator<Item = Result<Row>> {
    reader
        .into_records()
        .map(|record| -> Result<Row> { Ok(Row::from_strings(record?.iter())) })
}
