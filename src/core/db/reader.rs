/// Result Reader Module
///
/// A `Reader` walks the rows of a reader-mode execution one at a time. The
/// first row is fetched while the command executes so that engine errors
/// surface from `execute_reader` itself.
use super::value::{declared_typecast, native_typecast, FieldType, Value};
use crate::core::{DoError, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Rows;
use std::fmt;

/// Forward-only cursor over the rows of one execution.
pub struct Reader<'stmt> {
    /// Live cursor (None once closed)
    rows: Option<Rows<'stmt>>,
    field_names: Vec<String>,
    field_types: Option<Vec<FieldType>>,
    /// Row fetched ahead of the caller
    buffered: Option<Vec<SqlValue>>,
    exhausted: bool,
}

impl<'stmt> Reader<'stmt> {
    pub(crate) fn open(mut rows: Rows<'stmt>, field_names: Vec<String>) -> Result<Self> {
        let buffered = step(&mut rows, field_names.len())?;
        Ok(Reader {
            exhausted: buffered.is_none(),
            rows: Some(rows),
            field_names,
            field_types: None,
            buffered,
        })
    }

    /// Column names, in result order
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    /// Declared field types, if any were set
    pub fn field_types(&self) -> Option<&[FieldType]> {
        self.field_types.as_deref()
    }

    /// Declares one field type per column; rows fetched afterwards are
    /// converted to these types instead of their storage class.
    ///
    /// # Errors
    ///
    /// `DoError::Binding` if the number of types differs from the field count,
    /// `DoError::State` if the reader is closed.
    pub fn set_types(&mut self, types: Vec<FieldType>) -> Result<()> {
        self.ensure_open()?;
        if types.len() != self.field_names.len() {
            return Err(DoError::Binding(format!(
                "Reader has {} field(s), {} type(s) given",
                self.field_names.len(),
                types.len()
            )));
        }
        self.field_types = Some(types);
        Ok(())
    }

    /// Fetches the next row, or `None` once the result set is exhausted.
    ///
    /// # Errors
    ///
    /// `DoError::State` after `close`, `DoError::Query` if stepping fails,
    /// `DoError::Typecast` if a value does not fit its declared type.
    pub fn fetch_row(&mut self) -> Result<Option<Vec<Value>>> {
        let field_count = self.field_names.len();
        let rows = self
            .rows
            .as_mut()
            .ok_or_else(|| DoError::State("Cannot fetch from a closed reader".to_string()))?;

        let raw = match self.buffered.take() {
            Some(raw) => raw,
            None if self.exhausted => return Ok(None),
            None => match step(rows, field_count) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Err(e);
                }
            },
        };

        self.typecast(&raw).map(Some)
    }

    /// Releases the cursor. Returns `false` if it was already released.
    pub fn close(&mut self) -> bool {
        self.buffered = None;
        self.rows.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.rows.is_none()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DoError::State("Reader is closed".to_string()));
        }
        Ok(())
    }

    fn typecast(&self, raw: &[SqlValue]) -> Result<Vec<Value>> {
        match &self.field_types {
            Some(types) => raw
                .iter()
                .zip(types)
                .map(|(value, field_type)| declared_typecast(ValueRef::from(value), *field_type))
                .collect(),
            None => Ok(raw.iter().map(|value| native_typecast(ValueRef::from(value))).collect()),
        }
    }
}

/// Advances the cursor, copying the row out of SQLite's buffers.
fn step(rows: &mut Rows<'_>, field_count: usize) -> Result<Option<Vec<SqlValue>>> {
    let row = match rows.next().map_err(DoError::from_sqlite)? {
        Some(row) => row,
        None => return Ok(None),
    };
    let mut values = Vec::with_capacity(field_count);
    for index in 0..field_count {
        let value = row.get_ref(index).map_err(DoError::from_sqlite)?;
        values.push(SqlValue::from(value));
    }
    Ok(Some(values))
}

/// Yields rows until the result set is exhausted. A closed reader yields a
/// `DoError::State`, same as `fetch_row`.
impl Iterator for Reader<'_> {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_row().transpose()
    }
}

impl fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("field_names", &self.field_names)
            .field("field_types", &self.field_types)
            .field("exhausted", &self.exhausted)
            .field("closed", &self.is_closed())
            .finish()
    }
}
