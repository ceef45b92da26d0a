//! A small column-named table of JSON cells.
//!
//! Rows are built from flat API records; the column set is the union of all
//! keys in first-seen order and missing cells are `null`. Every row carries an
//! index label so that joins and reorderings can be undone with [`Table::finalize`].

use crate::{PelotonError, Record};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    index: Vec<usize>,
}

impl Table {
    /// Build a table from flat records.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let records: Vec<Record> = records.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for record in &records {
            for key in record.keys() {
                if !positions.contains_key(key) {
                    positions.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|record| {
                let mut row = vec![Value::Null; columns.len()];
                for (key, value) in record {
                    row[positions[&key]] = value;
                }
                row
            })
            .collect::<Vec<_>>();
        let index = (0..rows.len()).collect();
        Self {
            columns,
            rows,
            index,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of a column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let pos = self.position(name)?;
        Some(self.rows.iter().map(|row| &row[pos]).collect())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let pos = self.position(column)?;
        self.rows.get(row).map(|r| &r[pos])
    }

    /// Replace every cell of `column` with `f(cell)`. Returns `false` when the
    /// column does not exist.
    pub fn try_map_column<F>(&mut self, column: &str, mut f: F) -> Result<bool, PelotonError>
    where
        F: FnMut(&Value) -> Result<Value, PelotonError>,
    {
        let Some(pos) = self.position(column) else {
            return Ok(false);
        };
        for row in &mut self.rows {
            row[pos] = f(&row[pos])?;
        }
        Ok(true)
    }

    /// Remove the named columns; names that are not present are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !names.contains(&c.as_str()))
            .collect();
        let retain = |cells: &mut Vec<Value>| {
            let mut it = keep.iter();
            cells.retain(|_| *it.next().unwrap_or(&true));
        };
        for row in &mut self.rows {
            retain(row);
        }
        let mut it = keep.iter();
        self.columns.retain(|_| *it.next().unwrap_or(&true));
    }

    /// Rename every column to `prefix.column`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        for column in &mut self.columns {
            *column = format!("{prefix}.{column}");
        }
        self
    }

    /// Turn a column of nested objects into its own table.
    ///
    /// Rows whose nested value is `null` (or whose column is missing) become
    /// all-null rows with the keys of the first non-null object, so the result
    /// always has one row per input row and carries the input's index labels.
    pub fn expand_nested(&self, column: &str) -> Result<Table, PelotonError> {
        let cells: Vec<Value> = match self.position(column) {
            Some(pos) => self.rows.iter().map(|r| r[pos].clone()).collect(),
            None => vec![Value::Null; self.len()],
        };

        let template: Record = cells
            .iter()
            .find_map(Value::as_object)
            .map(|first| first.keys().map(|k| (k.clone(), Value::Null)).collect())
            .unwrap_or_default();

        let records = cells
            .into_iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                Value::Object(map) => Ok(map),
                Value::Null => Ok(template.clone()),
                other => Err(PelotonError::Schema(format!(
                    "{column} in row {row} is not an object: {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut nested = Table::from_records(records);
        nested.index = self.index.clone();
        Ok(nested)
    }

    /// Concatenate tables side by side.
    ///
    /// Rows are matched by position; every table must have as many rows as the
    /// first. A column name already taken by an earlier table is suffixed with
    /// `_<table position>`. Columns named in `drop` are removed afterwards.
    pub fn join(tables: &[Table], drop: &[&str]) -> Result<Table, PelotonError> {
        let Some(first) = tables.first() else {
            return Ok(Table::default());
        };
        for (pos, table) in tables.iter().enumerate().skip(1) {
            if table.len() != first.len() {
                return Err(PelotonError::ShapeMismatch {
                    table: pos,
                    expected: first.len(),
                    found: table.len(),
                });
            }
        }

        let mut joined = first.clone();
        for (pos, table) in tables.iter().enumerate().skip(1) {
            joined.append_columns(pos, &table.columns, |row| table.rows[row].clone());
        }
        joined.drop_columns(drop);
        Ok(joined)
    }

    /// Join tables on a shared key column.
    ///
    /// Output rows follow the first table. Every other table must contain the
    /// key column and a row for each key of the first table; its key column is
    /// not repeated in the output. When a key occurs more than once, the first
    /// row holding it is used, so repeated keys get identical cells.
    pub fn join_on(key: &str, tables: &[Table], drop: &[&str]) -> Result<Table, PelotonError> {
        let Some(first) = tables.first() else {
            return Ok(Table::default());
        };
        if first.is_empty() {
            let mut empty = first.clone();
            empty.drop_columns(drop);
            return Ok(empty);
        }
        let first_keys = first.keys(key)?;

        let mut joined = first.clone();
        for (pos, table) in tables.iter().enumerate().skip(1) {
            let key_pos = table
                .position(key)
                .ok_or_else(|| PelotonError::Schema(format!("table {pos} has no {key} column")))?;
            let mut by_key: HashMap<String, usize> = HashMap::with_capacity(table.len());
            for (row, k) in table.keys(key)?.into_iter().enumerate() {
                by_key.entry(k).or_insert(row);
            }
            let lookup = first_keys
                .iter()
                .map(|k| {
                    by_key.get(k).copied().ok_or_else(|| {
                        PelotonError::Schema(format!("table {pos} has no row for {key} {k}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let columns: Vec<String> = table
                .columns
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != key_pos)
                .map(|(_, c)| c.clone())
                .collect();
            joined.append_columns(pos, &columns, |row| {
                table.rows[lookup[row]]
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != key_pos)
                    .map(|(_, v)| v.clone())
                    .collect()
            });
        }
        joined.drop_columns(drop);
        Ok(joined)
    }

    fn keys(&self, key: &str) -> Result<Vec<String>, PelotonError> {
        let cells = self
            .column(key)
            .ok_or_else(|| PelotonError::Schema(format!("no {key} column")))?;
        cells
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                key_string(v).ok_or_else(|| {
                    PelotonError::Schema(format!("{key} in row {row} is not a usable key: {v}"))
                })
            })
            .collect()
    }

    fn append_columns<F>(&mut self, table_pos: usize, columns: &[String], mut cells_for_row: F)
    where
        F: FnMut(usize) -> Vec<Value>,
    {
        for column in columns {
            let mut name = column.clone();
            let mut attempt = 0;
            while self.has_column(&name) {
                name = match attempt {
                    0 => format!("{column}_{table_pos}"),
                    n => format!("{column}_{table_pos}_{n}"),
                };
                attempt += 1;
            }
            self.columns.push(name);
        }
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.extend(cells_for_row(i));
        }
    }

    /// Order rows by index label, descending, then relabel them `0..n`.
    pub fn finalize(mut self) -> Self {
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|a, b| self.index[*b].cmp(&self.index[*a]));
        let mut rows: Vec<Option<Vec<Value>>> = self.rows.into_iter().map(Some).collect();
        self.rows = order.iter().filter_map(|&i| rows[i].take()).collect();
        self.index = (0..self.rows.len()).collect();
        self
    }

    /// Rows whose `column` equals `value`. Index labels are kept.
    pub fn filter_eq(&self, column: &str, value: &Value) -> Table {
        let Some(pos) = self.position(column) else {
            return Table {
                columns: self.columns.clone(),
                ..Table::default()
            };
        };
        let (rows, index): (Vec<Vec<Value>>, Vec<usize>) = self
            .rows
            .iter()
            .zip(&self.index)
            .filter(|(row, _)| &row[pos] == value)
            .map(|(row, i)| (row.clone(), *i))
            .unzip();
        Table {
            columns: self.columns.clone(),
            rows,
            index,
        }
    }

    /// One JSON object per row, keys in column order.
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

fn key_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
