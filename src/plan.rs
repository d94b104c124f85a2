//! Cast plans: a persisted column → cast kind mapping.
//!
//! Plans are what `sniff -o` writes and `process --plan` reads. They are YAML
//! documents of the form
//!
//! ```yaml
//! columns:
//!   - column: amount
//!     kind: double
//!   - column: quantity
//!     kind: long
//!     nil_fill: "0"
//! ```
//!
//! `nil_fill`, when present, is itself cast with the column's kind so a long
//! column fills blanks with the number `0`, not the text `"0"`.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    caster::CastSpec,
    casts::{CastKind, CastOptions},
    data::Value,
    row::Column,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedColumn {
    pub column: Column,
    pub kind: CastKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nil_fill: Option<String>,
}

impl PlannedColumn {
    fn cast_options(&self) -> Result<CastOptions> {
        let Some(fill) = &self.nil_fill else {
            return Ok(CastOptions::default());
        };
        let value = self
            .kind
            .apply(&Value::from(fill.as_str()), &CastOptions::default())
            .with_context(|| format!("nil_fill for column {}", self.column))?;
        Ok(CastOptions::nil_fill(value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastPlan {
    #[serde(default)]
    pub columns: Vec<PlannedColumn>,
}

impl CastPlan {
    /// Parses `column:kind` directives such as `amount:double`.
    pub fn parse_directives<S: AsRef<str>>(directives: &[S]) -> Result<Self> {
        let columns = directives
            .iter()
            .flat_map(|d| d.as_ref().split(','))
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(parse_directive)
            .collect::<Result<Vec<_>>>()?;
        Ok(CastPlan { columns })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Adds `other`'s columns, replacing entries for columns already present.
    pub fn merge(&mut self, other: CastPlan) {
        for planned in other.columns {
            match self.columns.iter_mut().find(|c| c.column == planned.column) {
                Some(existing) => *existing = planned,
                None => self.columns.push(planned),
            }
        }
    }

    pub fn to_cast_spec(&self) -> Result<CastSpec> {
        self.columns
            .iter()
            .try_fold(CastSpec::columns(), |spec, planned| {
                let opts = planned.cast_options()?;
                Ok(spec.with(planned.column.clone(), planned.kind.cast_fn(opts)))
            })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening cast plan {path:?}"))?;
        let plan: CastPlan = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing cast plan YAML {path:?}"))?;
        plan.to_cast_spec()
            .with_context(|| format!("Validating cast plan {path:?}"))?;
        Ok(plan)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating cast plan {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing cast plan YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing cast plan to YAML string")
    }
}

fn parse_directive(directive: &str) -> Result<PlannedColumn> {
    let (column, kind) = directive
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Cast directive '{directive}' must look like column:kind"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(anyhow!("Cast directive '{directive}' is missing a column"));
    }
    let kind = kind.parse::<CastKind>().map_err(|err| anyhow!(err))?;
    Ok(PlannedColumn {
        column: Column::from(column),
        kind,
        nil_fill: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caster::cast_row;
    use crate::row::Row;

    #[test]
    fn directives_parse_columns_and_kinds() {
        let plan = CastPlan::parse_directives(&["amount:double, qty:long", "ok:bool"]).unwrap();
        let kinds = plan
            .columns
            .iter()
            .map(|c| (c.column.clone(), c.kind))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                (Column::from("amount"), CastKind::Double),
                (Column::from("qty"), CastKind::Long),
                (Column::from("ok"), CastKind::Boolean),
            ]
        );
        assert!(CastPlan::parse_directives(&["amount"]).is_err());
        assert!(CastPlan::parse_directives(&["amount:date"]).is_err());
    }

    #[test]
    fn nil_fill_is_cast_with_the_column_kind() {
        let plan: CastPlan =
            serde_yaml::from_str("columns:\n  - column: qty\n    kind: long\n    nil_fill: \"0\"\n")
                .unwrap();
        let spec = plan.to_cast_spec().unwrap();
        let row = Row::Keyed([("qty", "")].into_iter().collect());
        let record = cast_row(&spec, row, None, None).unwrap().into_record().unwrap();
        assert_eq!(record.get("qty"), Some(&Value::Long(0)));
    }

    #[test]
    fn merge_replaces_existing_columns() {
        let mut plan = CastPlan::parse_directives(&["a:int", "b:int"]).unwrap();
        plan.merge(CastPlan::parse_directives(&["b:double", "c:string"]).unwrap());
        let kinds = plan.columns.iter().map(|c| c.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![CastKind::Int, CastKind::Double, CastKind::String]);
    }

    #[test]
    fn yaml_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        let plan = CastPlan::parse_directives(&["amount:decimal"]).unwrap();
        plan.save(&path).unwrap();
        assert_eq!(CastPlan::load(&path).unwrap(), plan);
    }
}
