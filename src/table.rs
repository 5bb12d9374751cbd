use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{CensusError, Result, server_error};
use crate::transport::HttpReply;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Text(Vec<Option<String>>),
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Text(v) => v.len(),
            ColumnValues::Integer(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell `row` rendered as text, `None` for nulls and out-of-range rows.
    pub fn display(&self, row: usize) -> Option<String> {
        match self {
            ColumnValues::Text(v) => v.get(row).cloned().flatten(),
            ColumnValues::Integer(v) => v.get(row).copied().flatten().map(|n| n.to_string()),
            ColumnValues::Float(v) => v.get(row).copied().flatten().map(|n| n.to_string()),
        }
    }

    fn into_text(self) -> Vec<Option<String>> {
        match self {
            ColumnValues::Text(v) => v,
            ColumnValues::Integer(v) => v.into_iter().map(|n| n.map(|n| n.to_string())).collect(),
            ColumnValues::Float(v) => v.into_iter().map(|n| n.map(|n| n.to_string())).collect(),
        }
    }

    fn extend(&mut self, other: ColumnValues) {
        let current = std::mem::replace(self, ColumnValues::Text(Vec::new()));
        *self = match (current, other) {
            (ColumnValues::Text(mut a), ColumnValues::Text(b)) => {
                a.extend(b);
                ColumnValues::Text(a)
            }
            (ColumnValues::Integer(mut a), ColumnValues::Integer(b)) => {
                a.extend(b);
                ColumnValues::Integer(a)
            }
            (ColumnValues::Float(mut a), ColumnValues::Float(b)) => {
                a.extend(b);
                ColumnValues::Float(a)
            }
            (ColumnValues::Float(mut a), ColumnValues::Integer(b)) => {
                a.extend(b.into_iter().map(|n| n.map(|n| n as f64)));
                ColumnValues::Float(a)
            }
            (ColumnValues::Integer(a), ColumnValues::Float(b)) => {
                let mut merged: Vec<Option<f64>> =
                    a.into_iter().map(|n| n.map(|n| n as f64)).collect();
                merged.extend(b);
                ColumnValues::Float(merged)
            }
            (a, b) => {
                let mut merged = a.into_text();
                merged.extend(b.into_text());
                ColumnValues::Text(merged)
            }
        };
    }

    /// Integer if every non-null cell parses as `i64`, else float if every one
    /// parses as `f64`, else unchanged. All-null columns stay text.
    fn coerce_numeric(self) -> ColumnValues {
        let ColumnValues::Text(cells) = self else {
            return self;
        };
        if cells.iter().all(Option::is_none) {
            return ColumnValues::Text(cells);
        }

        let ints: Option<Vec<Option<i64>>> = cells
            .iter()
            .map(|c| match c {
                None => Some(None),
                Some(s) => s.trim().parse::<i64>().ok().map(Some),
            })
            .collect();
        if let Some(ints) = ints {
            return ColumnValues::Integer(ints);
        }

        let floats: Option<Vec<Option<f64>>> = cells
            .iter()
            .map(|c| match c {
                None => Some(None),
                Some(s) => s.trim().parse::<f64>().ok().map(Some),
            })
            .collect();
        match floats {
            Some(floats) => ColumnValues::Float(floats),
            None => ColumnValues::Text(cells),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// Named, row-aligned columns returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<Column>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a text table; every row must be as wide as the header.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        let width = header.len();
        let mut cells: Vec<Vec<Option<String>>> = (0..width)
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(CensusError::Schema(format!(
                    "row {} has {} cells, header has {}",
                    i + 1,
                    row.len(),
                    width
                )));
            }
            for (col, cell) in cells.iter_mut().zip(row) {
                col.push(cell);
            }
        }

        let columns = header
            .into_iter()
            .zip(cells)
            .map(|(name, values)| Column {
                name,
                values: ColumnValues::Text(values),
            })
            .collect();
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.values)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Row `i` rendered as text, in column order.
    pub fn row(&self, i: usize) -> Option<Vec<Option<String>>> {
        if i >= self.n_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| c.values.display(i)).collect())
    }

    /// Best-effort numeric coercion of the named columns; each is decided on its own.
    pub fn infer_numeric<S: AsRef<str>>(&mut self, names: &[S]) {
        for col in &mut self.columns {
            if names.iter().any(|n| n.as_ref() == col.name) {
                let values = std::mem::replace(&mut col.values, ColumnValues::Text(Vec::new()));
                col.values = values.coerce_numeric();
            }
        }
    }

    /// Appends the columns of `other` whose names are not present yet.
    pub(crate) fn merge_columns(&mut self, other: ResultTable) -> Result<()> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.n_columns() > 0 && other.n_rows() != self.n_rows() {
            return Err(CensusError::Schema(format!(
                "cannot merge {} row(s) into a table of {} row(s)",
                other.n_rows(),
                self.n_rows()
            )));
        }
        for col in other.columns {
            if !self.has_column(&col.name) {
                self.columns.push(col);
            }
        }
        Ok(())
    }

    /// Appends the rows of `other`, matching columns by name.
    pub(crate) fn append_rows(&mut self, other: ResultTable) -> Result<()> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.n_columns() != self.n_columns() {
            return Err(CensusError::Schema(format!(
                "cannot append rows with columns {:?} to a table with columns {:?}",
                other.column_names(),
                self.column_names()
            )));
        }

        if let Some(missing) = self.columns.iter().find(|c| !other.has_column(&c.name)) {
            return Err(CensusError::Schema(format!(
                "column {:?} missing from appended rows",
                missing.name
            )));
        }

        let mut other_columns = other.columns;
        for col in &mut self.columns {
            if let Some(idx) = other_columns.iter().position(|c| c.name == col.name) {
                let incoming = other_columns.swap_remove(idx);
                col.values.extend(incoming.values);
            }
        }
        Ok(())
    }
}

/// Turns a tabular endpoint reply into a [`ResultTable`].
///
/// The body must be `[[header...], [row...], ...]`. With `infer`, the
/// `requested` columns are coerced to numbers where every cell allows it.
pub fn parse_response(
    reply: &HttpReply,
    url: &str,
    requested: &[String],
    infer: bool,
) -> Result<ResultTable> {
    let status = reply.status_code();
    if status == StatusCode::NO_CONTENT {
        return Err(CensusError::EmptyResult {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(server_error(status, url, &reply.body));
    }

    let rows: Vec<Vec<Value>> =
        serde_json::from_str(&reply.body).map_err(|e| CensusError::decode(url, e))?;
    let mut rows = rows.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| CensusError::decode(url, "response has no header row"))?;

    let header = header
        .into_iter()
        .map(|v| cell_text(v).ok_or_else(|| CensusError::decode(url, "null column name")))
        .collect::<Result<Vec<_>>>()?;
    let data: Vec<Vec<Option<String>>> = rows
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect();

    let mut table = ResultTable::from_rows(header, data).map_err(|e| match e {
        CensusError::Schema(message) => CensusError::decode(url, message),
        other => other,
    })?;
    if infer {
        table.infer_numeric(requested);
    }
    Ok(table)
}

fn cell_text(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
