//! String to typed-value coercions.
//!
//! Every function takes a [`Value`] (usually a freshly parsed string cell) and
//! a [`CastOptions`]. Strings are trimmed first; blank input and `Null`
//! resolve to the configured `nil_fill` instead of failing. Integral targets
//! floor fractional text, so `"35.54"` becomes `35`. Text that is not a
//! number at all is a [`CastError`], never a silent default: wrap the cast in
//! an exception handler (see [`crate::caster`]) when a column is expected to
//! be dirty.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::data::Value;
use crate::error::CastError;

/// Shared casting function, applied cell by cell.
pub type CastFn = Arc<dyn Fn(&Value) -> Result<Value, CastError> + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CastOptions {
    /// Returned in place of blank strings and `Null` cells.
    pub nil_fill: Value,
}

impl CastOptions {
    pub fn nil_fill(value: impl Into<Value>) -> Self {
        Self {
            nil_fill: value.into(),
        }
    }
}

const TRUE_TOKENS: &[&str] = &["true", "yes", "t"];
const FALSE_TOKENS: &[&str] = &["false", "no", "f"];

/// Floors `text` to an integer, accepting plain integers exactly and falling
/// back to float parsing for fractional input.
fn parse_floored(text: &str, target: &'static str) -> Result<f64, CastError> {
    if let Ok(exact) = text.parse::<i64>() {
        return Ok(exact as f64);
    }
    let parsed: f64 = text
        .parse()
        .map_err(|_| CastError::malformed(text, target))?;
    if !parsed.is_finite() {
        return Err(CastError::malformed(text, target));
    }
    Ok(parsed.floor())
}

/// Trimmed text of a `Null` or `String` cell, or the fill value when the cell
/// is blank. Only called for those two variants.
fn text_or_fill<'a>(value: &'a Value, opts: &CastOptions) -> Result<&'a str, Value> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim()),
        _ => Err(opts.nil_fill.clone()),
    }
}

pub fn to_int(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    const TARGET: &str = "int";
    match value {
        Value::Null | Value::String(_) => {
            let text = match text_or_fill(value, opts) {
                Ok(text) => text,
                Err(fill) => return Ok(fill),
            };
            if let Ok(exact) = text.parse::<i32>() {
                return Ok(Value::Int(exact));
            }
            let floored = parse_floored(text, TARGET)?;
            if floored < f64::from(i32::MIN) || floored > f64::from(i32::MAX) {
                return Err(CastError::out_of_range(text, TARGET));
            }
            Ok(Value::Int(floored as i32))
        }
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Long(l) => Ok(Value::Int(*l as i32)),
        Value::Boolean(b) => Ok(Value::Int(i32::from(*b))),
        other => other
            .as_f64()
            .map(|f| Value::Int(f as i32))
            .ok_or_else(|| CastError::malformed(other.as_display(), TARGET)),
    }
}

pub fn to_long(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    const TARGET: &str = "long";
    match value {
        Value::Null | Value::String(_) => {
            let text = match text_or_fill(value, opts) {
                Ok(text) => text,
                Err(fill) => return Ok(fill),
            };
            if let Ok(exact) = text.parse::<i64>() {
                return Ok(Value::Long(exact));
            }
            let floored = parse_floored(text, TARGET)?;
            // i64::MAX is not representable as f64; compare against 2^63.
            if floored < i64::MIN as f64 || floored >= 9_223_372_036_854_775_808.0 {
                return Err(CastError::out_of_range(text, TARGET));
            }
            Ok(Value::Long(floored as i64))
        }
        Value::Int(i) => Ok(Value::Long(i64::from(*i))),
        Value::Long(l) => Ok(Value::Long(*l)),
        Value::Boolean(b) => Ok(Value::Long(i64::from(*b))),
        other => other
            .as_f64()
            .map(|f| Value::Long(f as i64))
            .ok_or_else(|| CastError::malformed(other.as_display(), TARGET)),
    }
}

/// Like [`to_long`] but refuses fractional text. Used as a sniffing trial so
/// `"3.5"` does not classify as an integer.
pub fn to_long_exact(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    match value {
        Value::Null | Value::String(_) => match text_or_fill(value, opts) {
            Ok(text) => text
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|_| CastError::malformed(text, "integer")),
            Err(fill) => Ok(fill),
        },
        Value::Float(_) | Value::Double(_) | Value::Decimal(_) => {
            Err(CastError::malformed(value.as_display(), "integer"))
        }
        other => to_long(other, opts),
    }
}

pub fn to_float(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    const TARGET: &str = "float";
    match value {
        Value::Null | Value::String(_) => {
            let text = match text_or_fill(value, opts) {
                Ok(text) => text,
                Err(fill) => return Ok(fill),
            };
            text.parse::<f32>()
                .map(Value::Float)
                .map_err(|_| CastError::malformed(text, TARGET))
        }
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Boolean(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        other => other
            .as_f64()
            .map(|f| Value::Float(f as f32))
            .ok_or_else(|| CastError::malformed(other.as_display(), TARGET)),
    }
}

pub fn to_double(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    const TARGET: &str = "double";
    match value {
        Value::Null | Value::String(_) => {
            let text = match text_or_fill(value, opts) {
                Ok(text) => text,
                Err(fill) => return Ok(fill),
            };
            text.parse::<f64>()
                .map(Value::Double)
                .map_err(|_| CastError::malformed(text, TARGET))
        }
        Value::Boolean(b) => Ok(Value::Double(if *b { 1.0 } else { 0.0 })),
        other => other
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| CastError::malformed(other.as_display(), TARGET)),
    }
}

/// Like [`to_double`] but refuses `NaN` and infinities. Used as a sniffing
/// trial so marker text such as `"inf"` stays a string.
pub fn to_double_finite(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    match to_double(value, opts)? {
        Value::Double(d) if !d.is_finite() => {
            Err(CastError::malformed(value.as_display(), "decimal"))
        }
        cast => Ok(cast),
    }
}

pub fn to_decimal(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    const TARGET: &str = "decimal";
    match value {
        Value::Null | Value::String(_) => {
            let text = match text_or_fill(value, opts) {
                Ok(text) => text,
                Err(fill) => return Ok(fill),
            };
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map(Value::Decimal)
                .map_err(|_| CastError::malformed(text, TARGET))
        }
        Value::Int(i) => Ok(Value::Decimal(Decimal::from(*i))),
        Value::Long(l) => Ok(Value::Decimal(Decimal::from(*l))),
        Value::Decimal(d) => Ok(Value::Decimal(*d)),
        Value::Boolean(b) => Ok(Value::Decimal(Decimal::from(i32::from(*b)))),
        other => other
            .as_f64()
            .and_then(Decimal::from_f64)
            .map(Value::Decimal)
            .ok_or_else(|| CastError::out_of_range(other.as_display(), TARGET)),
    }
}

/// Loose boolean coercion.
///
/// Recognized tokens map to `true`/`false`, numbers are true when nonzero,
/// and anything else falls back to its truthiness. This never fails on
/// non-blank input; use [`to_boolean_strict`] when unknown text must be
/// rejected.
pub fn to_boolean(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    match value {
        Value::Null => Ok(opts.nil_fill.clone()),
        Value::Boolean(b) => Ok(Value::Boolean(*b)),
        Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            if lowered.is_empty() {
                Ok(opts.nil_fill.clone())
            } else if TRUE_TOKENS.contains(&lowered.as_str()) {
                Ok(Value::Boolean(true))
            } else if FALSE_TOKENS.contains(&lowered.as_str()) {
                Ok(Value::Boolean(false))
            } else {
                Ok(Value::Boolean(value.truthy()))
            }
        }
        other => Ok(Value::Boolean(
            other.as_f64().map(|f| f != 0.0).unwrap_or_else(|| other.truthy()),
        )),
    }
}

/// Boolean coercion that only accepts the recognized true/false tokens.
pub fn to_boolean_strict(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            let lowered = s.trim().to_ascii_lowercase();
            if TRUE_TOKENS.contains(&lowered.as_str()) {
                Ok(Value::Boolean(true))
            } else if FALSE_TOKENS.contains(&lowered.as_str()) {
                Ok(Value::Boolean(false))
            } else {
                Err(CastError::malformed(s.trim(), "boolean"))
            }
        }
        Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_) | Value::Decimal(_) => {
            Err(CastError::malformed(value.as_display(), "boolean"))
        }
        other => to_boolean(other, opts),
    }
}

/// Renders any value as text; blank values become `nil_fill`.
pub fn to_string(value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
    if value.is_null() {
        return Ok(opts.nil_fill.clone());
    }
    Ok(Value::String(value.as_display()))
}

/// Named casting functions, used by cast plans and the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastKind {
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
}

impl CastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CastKind::Int => "int",
            CastKind::Long => "long",
            CastKind::Float => "float",
            CastKind::Double => "double",
            CastKind::Decimal => "decimal",
            CastKind::Boolean => "boolean",
            CastKind::String => "string",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["int", "long", "float", "double", "decimal", "boolean", "string"]
    }

    pub fn apply(&self, value: &Value, opts: &CastOptions) -> Result<Value, CastError> {
        match self {
            CastKind::Int => to_int(value, opts),
            CastKind::Long => to_long(value, opts),
            CastKind::Float => to_float(value, opts),
            CastKind::Double => to_double(value, opts),
            CastKind::Decimal => to_decimal(value, opts),
            CastKind::Boolean => to_boolean(value, opts),
            CastKind::String => to_string(value, opts),
        }
    }

    pub fn cast_fn(self, opts: CastOptions) -> CastFn {
        Arc::new(move |value: &Value| self.apply(value, &opts))
    }
}

impl fmt::Display for CastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CastKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "i32" => Ok(CastKind::Int),
            "long" | "i64" => Ok(CastKind::Long),
            "float" | "f32" => Ok(CastKind::Float),
            "double" | "f64" => Ok(CastKind::Double),
            "decimal" => Ok(CastKind::Decimal),
            "boolean" | "bool" => Ok(CastKind::Boolean),
            "string" | "str" => Ok(CastKind::String),
            other => Err(format!(
                "Unknown cast '{other}'. Expected one of: {}",
                CastKind::variants().join(", ")
            )),
        }
    }
}

/// Wraps a plain casting function with fixed options.
pub fn with_options<F>(cast: F, opts: CastOptions) -> CastFn
where
    F: Fn(&Value, &CastOptions) -> Result<Value, CastError> + Send + Sync + 'static,
{
    Arc::new(move |value: &Value| cast(value, &opts))
}
