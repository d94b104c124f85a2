//! Column type inference from a sample of rows.
//!
//! [`CastRules`] is an ordered set of cast classes, each an ordered list of
//! types from most to least specific. A column's classification only moves
//! forward within its class: a value that fails the current type is retried
//! against the later types, and a value that fails all of them pins the
//! column to [`Classification::String`] for good. Blank cells never change a
//! classification.

use std::fmt;

use log::debug;
use serde::Serialize;

use crate::{
    caster::CastSpec,
    casts::{
        CastFn, CastKind, CastOptions, to_boolean_strict, to_double_finite, to_long_exact,
        with_options,
    },
    data::Value,
    error::Result,
    plan::{CastPlan, PlannedColumn},
    row::{Column, Row},
};

pub const DEFAULT_ROWS_TO_SNIFF: usize = 100;

/// A named trial cast within a class.
#[derive(Clone)]
pub struct CastRule {
    pub name: String,
    pub cast: CastFn,
}

impl fmt::Debug for CastRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastRule").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct CastClass {
    pub name: String,
    pub types: Vec<CastRule>,
}

impl CastClass {
    fn position(&self, cast_type: &str) -> Option<usize> {
        self.types.iter().position(|rule| rule.name == cast_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CastRules {
    classes: Vec<CastClass>,
}

impl CastRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends a class whose types are tried in the given order.
    pub fn class<N, T>(mut self, name: N, types: T) -> Self
    where
        N: Into<String>,
        T: IntoIterator<Item = (&'static str, CastFn)>,
    {
        self.classes.push(CastClass {
            name: name.into(),
            types: types
                .into_iter()
                .map(|(name, cast)| CastRule {
                    name: name.to_string(),
                    cast,
                })
                .collect(),
        });
        self
    }

    pub fn classes(&self) -> &[CastClass] {
        &self.classes
    }

    fn find_class(&self, name: &str) -> Option<&CastClass> {
        self.classes.iter().find(|class| class.name == name)
    }

    pub fn rule(&self, class: &str, cast_type: &str) -> Option<&CastRule> {
        let class = self.find_class(class)?;
        class.position(cast_type).map(|idx| &class.types[idx])
    }

    /// Numeric (`integer` then `decimal`) followed by `boolean`.
    pub fn standard() -> Self {
        let opts = CastOptions::default();
        CastRules::empty()
            .class(
                "numeric",
                [
                    ("integer", with_options(to_long_exact, opts.clone())),
                    ("decimal", with_options(to_double_finite, opts.clone())),
                ],
            )
            .class("boolean", [("boolean", with_options(to_boolean_strict, opts))])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Classification {
    Typed { class: String, cast_type: String },
    String,
}

impl Classification {
    pub fn typed(class: &str, cast_type: &str) -> Self {
        Classification::Typed {
            class: class.to_string(),
            cast_type: cast_type.to_string(),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Typed { class, cast_type } => write!(f, "{class}/{cast_type}"),
            Classification::String => f.write_str("string"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SniffResult {
    columns: Vec<(Column, Classification)>,
}

impl SniffResult {
    pub fn get(&self, column: &Column) -> Option<&Classification> {
        self.columns.iter().find(|(c, _)| c == column).map(|(_, k)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Column, &Classification)> {
        self.columns.iter().map(|(c, k)| (c, k))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn slot(&mut self, column: &Column) -> Option<&mut Classification> {
        self.columns
            .iter_mut()
            .find(|(c, _)| c == column)
            .map(|(_, k)| k)
    }

    /// Per-column spec using each typed column's rule function. `String`
    /// columns are left out.
    pub fn to_cast_spec(&self, rules: &CastRules) -> CastSpec {
        self.columns
            .iter()
            .filter_map(|(column, classification)| match classification {
                Classification::Typed { class, cast_type } => rules
                    .rule(class, cast_type)
                    .map(|rule| (column.clone(), rule.cast.clone())),
                Classification::String => None,
            })
            .collect()
    }

    /// Persistable plan naming a [`CastKind`] per typed column. Type names
    /// that are not cast kinds (custom rules) are skipped.
    pub fn to_plan(&self) -> CastPlan {
        let columns = self
            .columns
            .iter()
            .filter_map(|(column, classification)| {
                let Classification::Typed { cast_type, .. } = classification else {
                    return None;
                };
                let kind = match cast_type.as_str() {
                    "integer" => CastKind::Long,
                    "decimal" => CastKind::Double,
                    other => other.parse::<CastKind>().ok()?,
                };
                Some(PlannedColumn {
                    column: column.clone(),
                    kind,
                    nil_fill: None,
                })
            })
            .collect();
        CastPlan { columns }
    }
}

/// Incremental sniffer: feed rows with [`Sniffer::observe`], then
/// [`Sniffer::finish`].
#[derive(Debug)]
pub struct Sniffer<'r> {
    rules: &'r CastRules,
    result: SniffResult,
    observed: usize,
}

impl<'r> Sniffer<'r> {
    pub fn new(rules: &'r CastRules) -> Self {
        Self {
            rules,
            result: SniffResult::default(),
            observed: 0,
        }
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn observe(&mut self, row: &Row) {
        self.observed += 1;
        for column in row.columns() {
            let Some(value) = row.get(&column) else {
                continue;
            };
            if value.is_blank() {
                continue;
            }
            let next = match self.result.get(&column) {
                None => self.first_classification(value),
                Some(Classification::String) => continue,
                Some(Classification::Typed { class, cast_type }) => {
                    self.promote(class, cast_type, value)
                }
            };
            match self.result.slot(&column) {
                Some(slot) => {
                    if *slot != next {
                        debug!("Column {column} reclassified {slot} -> {next}");
                    }
                    *slot = next;
                }
                None => self.result.columns.push((column, next)),
            }
        }
    }

    fn first_classification(&self, value: &Value) -> Classification {
        for class in &self.rules.classes {
            for rule in &class.types {
                if (rule.cast)(value).is_ok() {
                    return Classification::typed(&class.name, &rule.name);
                }
            }
        }
        Classification::String
    }

    fn promote(&self, class: &str, cast_type: &str, value: &Value) -> Classification {
        let Some(rules) = self.rules.find_class(class) else {
            return Classification::String;
        };
        let start = rules.position(cast_type).unwrap_or(rules.types.len());
        rules.types[start..]
            .iter()
            .find(|rule| (rule.cast)(value).is_ok())
            .map(|rule| Classification::typed(class, &rule.name))
            .unwrap_or(Classification::String)
    }

    pub fn finish(self) -> SniffResult {
        debug!(
            "Sniffed {} column(s) from {} row(s)",
            self.result.len(),
            self.observed
        );
        self.result
    }
}

/// Classifies columns from the first `rows_to_sniff` rows.
pub fn sniff<I>(rows: I, rules: &CastRules, rows_to_sniff: usize) -> Result<SniffResult>
where
    I: IntoIterator<Item = Result<Row>>,
{
    let mut sniffer = Sniffer::new(rules);
    for row in rows.into_iter().take(rows_to_sniff) {
        sniffer.observe(&row?);
    }
    Ok(sniffer.finish())
}

/// Sniffs the head of a stream and hands back a stream that replays the
/// sampled rows before continuing with the rest.
pub fn sniff_buffered<I>(
    rows: I,
    rules: &CastRules,
    rows_to_sniff: usize,
) -> Result<(SniffResult, impl Iterator<Item = Result<Row>> + use<I>)>
where
    I: IntoIterator<Item = Result<Row>>,
{
    let mut rows = rows.into_iter();
    let mut sniffer = Sniffer::new(rules);
    let mut sample = Vec::with_capacity(rows_to_sniff.min(1024));
    for row in rows.by_ref().take(rows_to_sniff) {
        let row = row?;
        sniffer.observe(&row);
        sample.push(row);
    }
    let replay = sample.into_iter().map(Ok).chain(rows);
    Ok((sniffer.finish(), replay))
}
