use std::fmt;

use crate::{
    caster::{CastSpec, ExceptionHandler, cast_row},
    error::Result,
    row::{Column, Row},
};

use super::{RowTransform, Transformed};

#[derive(Clone, Default)]
pub struct CastWithOptions {
    /// Pass the first row through unchanged (typically a header row).
    pub except_first: bool,
    pub exception_handler: Option<ExceptionHandler>,
    /// Restrict casting to these columns.
    pub only: Option<Vec<Column>>,
}

impl fmt::Debug for CastWithOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastWithOptions")
            .field("except_first", &self.except_first)
            .field("exception_handler", &self.exception_handler.is_some())
            .field("only", &self.only)
            .finish()
    }
}

/// [`cast_row`] as a [`RowTransform`].
#[derive(Clone)]
pub struct Caster {
    spec: CastSpec,
    only: Option<Vec<Column>>,
    handler: Option<ExceptionHandler>,
}

impl Caster {
    pub fn new(spec: CastSpec) -> Self {
        Self {
            spec,
            only: None,
            handler: None,
        }
    }

    pub fn only(mut self, columns: Vec<Column>) -> Self {
        self.only = Some(columns);
        self
    }

    pub fn exception_handler(mut self, handler: ExceptionHandler) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl fmt::Debug for Caster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caster")
            .field("spec", &self.spec)
            .field("only", &self.only)
            .finish_non_exhaustive()
    }
}

impl RowTransform for Caster {
    fn apply(&mut self, row: Row) -> Result<Row> {
        cast_row(&self.spec, row, self.only.as_deref(), self.handler.as_ref())
    }
}

/// Passes the first row through untouched and routes every later row through
/// the wrapped transform.
#[derive(Debug, Clone)]
pub struct ExceptFirst<T> {
    inner: T,
    seen_first: bool,
}

impl<T> ExceptFirst<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            seen_first: false,
        }
    }
}

impl<T: RowTransform> RowTransform for ExceptFirst<T> {
    fn apply(&mut self, row: Row) -> Result<Row> {
        if self.seen_first {
            self.inner.apply(row)
        } else {
            self.seen_first = true;
            Ok(row)
        }
    }
}

#[derive(Debug, Clone)]
pub enum CastStage {
    Every(Caster),
    ExceptFirst(ExceptFirst<Caster>),
}

impl RowTransform for CastStage {
    fn apply(&mut self, row: Row) -> Result<Row> {
        match self {
            CastStage::Every(caster) => caster.apply(row),
            CastStage::ExceptFirst(wrapped) => wrapped.apply(row),
        }
    }
}

/// Casting stage built by [`super::RowStreamExt::cast_with`].
pub type CastWith<I> = Transformed<I, CastStage>;

pub(crate) fn cast_with<I>(upstream: I, spec: CastSpec, options: CastWithOptions) -> CastWith<I> {
    let mut caster = Caster::new(spec);
    caster.only = options.only;
    caster.handler = options.exception_handler;
    let stage = if options.except_first {
        CastStage::ExceptFirst(ExceptFirst::new(caster))
    } else {
        CastStage::Every(caster)
    };
    Transformed::new(upstream, stage)
}
