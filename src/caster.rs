//! Applying casting functions to the cells of a single row.

use std::fmt;
use std::sync::Arc;

use log::trace;

use crate::{
    casts::{CastFn, CastKind, CastOptions},
    data::Value,
    error::{Error, Result},
    row::{Column, Row},
};

/// Called with the failing column and its original value; the return value
/// becomes the cell.
pub type ExceptionHandler = Arc<dyn Fn(&Column, &Value) -> Value + Send + Sync>;

/// What to cast: one function for every selected column, or a function per
/// column.
#[derive(Clone)]
pub enum CastSpec {
    All(CastFn),
    Columns(Vec<(Column, CastFn)>),
}

impl CastSpec {
    pub fn all(cast: CastFn) -> Self {
        CastSpec::All(cast)
    }

    pub fn columns() -> Self {
        CastSpec::Columns(Vec::new())
    }

    /// Adds (or replaces) the function for `column`. Turns an `All` spec into
    /// a per-column one.
    pub fn with(self, column: impl Into<Column>, cast: CastFn) -> Self {
        let column = column.into();
        match self {
            CastSpec::All(_) => CastSpec::Columns(vec![(column, cast)]),
            CastSpec::Columns(mut entries) => {
                match entries.iter_mut().find(|(c, _)| *c == column) {
                    Some(slot) => slot.1 = cast,
                    None => entries.push((column, cast)),
                }
                CastSpec::Columns(entries)
            }
        }
    }

    pub fn with_kind(self, column: impl Into<Column>, kind: CastKind) -> Self {
        self.with(column, kind.cast_fn(CastOptions::default()))
    }

    pub fn function_for(&self, column: &Column) -> Option<&CastFn> {
        match self {
            CastSpec::All(cast) => Some(cast),
            CastSpec::Columns(entries) => entries.iter().find(|(c, _)| c == column).map(|(_, f)| f),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CastSpec::Columns(entries) if entries.is_empty())
    }
}

impl fmt::Debug for CastSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastSpec::All(_) => f.write_str("CastSpec::All(..)"),
            CastSpec::Columns(entries) => f
                .debug_tuple("CastSpec::Columns")
                .field(&entries.iter().map(|(c, _)| c).collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl<C: Into<Column>> FromIterator<(C, CastFn)> for CastSpec {
    fn from_iter<T: IntoIterator<Item = (C, CastFn)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(CastSpec::columns(), |spec, (column, cast)| spec.with(column, cast))
    }
}

/// Columns to cast, in precedence order: an explicit `only` list, the keys of
/// a per-column spec, then every column of the row.
fn selected_columns(spec: &CastSpec, row: &Row, only: Option<&[Column]>) -> Vec<Column> {
    if let Some(only) = only {
        return only.to_vec();
    }
    match spec {
        CastSpec::Columns(entries) => entries.iter().map(|(c, _)| c.clone()).collect(),
        CastSpec::All(_) => row.columns(),
    }
}

fn check_addressing(row: &Row, column: &Column) -> Result<()> {
    match (row, column) {
        (Row::Positional(_), Column::Key(key)) => Err(Error::configuration(format!(
            "column key '{key}' cannot address a positional row; mappify the rows first"
        ))),
        (Row::Keyed(_), Column::Index(idx)) => Err(Error::configuration(format!(
            "column index {idx} cannot address a keyed record"
        ))),
        _ => Ok(()),
    }
}

fn cell_mut<'a>(row: &'a mut Row, column: &Column) -> Option<&'a mut Value> {
    match (row, column) {
        (Row::Positional(cells), Column::Index(idx)) => cells.get_mut(*idx),
        (Row::Keyed(record), Column::Key(key)) => record.get_mut(key),
        _ => None,
    }
}

/// Casts the selected columns of `row`.
///
/// Absent cells are skipped. A failing cast is handed to `handler` when one
/// is given; otherwise it aborts the row with [`Error::Coercion`].
pub fn cast_row(
    spec: &CastSpec,
    mut row: Row,
    only: Option<&[Column]>,
    handler: Option<&ExceptionHandler>,
) -> Result<Row> {
    for column in selected_columns(spec, &row, only) {
        check_addressing(&row, &column)?;
        let Some(cast) = spec.function_for(&column) else {
            continue;
        };
        let Some(cell) = cell_mut(&mut row, &column) else {
            continue;
        };
        match cast(&*cell) {
            Ok(value) => *cell = value,
            Err(source) => match handler {
                Some(handler) => {
                    trace!("Cast of column {column} failed ({source}); using handler value");
                    *cell = handler(&column, &*cell);
                }
                None => return Err(Error::Coercion { column, source }),
            },
        }
    }
    Ok(row)
}
