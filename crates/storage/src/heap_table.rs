use common::{Config, DbError, DbResult, Handle, Row};
use types::{SqlType, Value};

use crate::HeapFile;

/// A named, typed column of a relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Relational heap table: typed rows marshalled into slotted-page records
/// over one [`HeapFile`].
///
/// Rows are addressed by [`Handle`]; every operation that may run before
/// the underlying file was touched opens it first. A row must fit in a
/// single block; there is no row splitting.
#[derive(Debug)]
pub struct HeapTable {
    name: String,
    columns: Vec<Column>,
    file: HeapFile,
}

impl HeapTable {
    pub fn new(config: &Config, name: impl Into<String>, columns: Vec<Column>) -> Self {
        let name = name.into();
        let file = HeapFile::new(config, name.clone());
        Self {
            name,
            columns,
            file,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn create(&mut self) -> DbResult<()> {
        self.file.create()
    }

    /// Open the relation, creating it when it does not exist yet.
    pub fn create_if_not_exists(&mut self) -> DbResult<()> {
        match self.file.open() {
            Ok(()) => Ok(()),
            Err(_) => self.file.create(),
        }
    }

    pub fn open(&mut self) -> DbResult<()> {
        self.file.open()
    }

    pub fn close(&mut self) -> DbResult<()> {
        self.file.close()
    }

    /// Delete the relation's storage.
    pub fn destroy(&mut self) -> DbResult<()> {
        self.file.destroy()
    }

    /// Insert a row, returning the handle of the stored record.
    pub fn insert(&mut self, row: &Row) -> DbResult<Handle> {
        self.file.open()?;
        let full_row = self.validate(row)?;
        self.append(&full_row)
    }

    /// Merge `new_values` over the stored row and rewrite it in place. The
    /// containing block compacts internally if the record grows.
    pub fn update(&mut self, handle: Handle, new_values: &Row) -> DbResult<()> {
        let mut row = self.project(handle)?;
        for (name, value) in new_values {
            row.insert(name.clone(), value.clone());
        }
        let full_row = self.validate(&row)?;
        let payload = self.marshal(&full_row)?;
        let mut block = self.file.get(handle.block_id)?;
        block.put(handle.record_id, &payload).map_err(|err| match err {
            DbError::NoRoom(_) => DbError::Relation(format!(
                "updated row no longer fits in block {}",
                handle.block_id.0
            )),
            other => other,
        })?;
        self.file.put(&block)
    }

    pub fn delete(&mut self, handle: Handle) -> DbResult<()> {
        self.file.open()?;
        let mut block = self.file.get(handle.block_id)?;
        block.del(handle.record_id)?;
        self.file.put(&block)
    }

    /// Handles of every live row, in block then record order.
    pub fn select(&mut self) -> DbResult<Vec<Handle>> {
        self.file.open()?;
        let block_ids: Vec<_> = self.file.block_ids().collect();
        let mut handles = Vec::new();
        for block_id in block_ids {
            let block = self.file.get(block_id)?;
            for record_id in block.ids() {
                handles.push(Handle::new(block_id, record_id));
            }
        }
        Ok(handles)
    }

    /// Handles of rows equal to `predicate` on every column it mentions.
    /// Equality over a conjunction is the only supported operator; richer
    /// predicates belong to a query layer above this one.
    pub fn select_where(&mut self, predicate: &Row) -> DbResult<Vec<Handle>> {
        let mut matching = Vec::new();
        for handle in self.select()? {
            let row = self.project(handle)?;
            if predicate
                .iter()
                .all(|(name, value)| row.get(name) == Some(value))
            {
                matching.push(handle);
            }
        }
        Ok(matching)
    }

    /// Read the full row stored at `handle`.
    pub fn project(&mut self, handle: Handle) -> DbResult<Row> {
        self.file.open()?;
        let block = self.file.get(handle.block_id)?;
        let Some(bytes) = block.get(handle.record_id)? else {
            return Err(DbError::Storage(format!(
                "record {handle} of table '{}' is deleted",
                self.name
            )));
        };
        self.unmarshal(bytes)
    }

    /// Read a subset of the row's columns; requesting a column the table
    /// does not have is a relation error.
    pub fn project_columns(&mut self, handle: Handle, column_names: &[String]) -> DbResult<Row> {
        let row = self.project(handle)?;
        let mut projected = Row::new();
        for name in column_names {
            let Some(value) = row.get(name) else {
                return Err(DbError::Relation(format!(
                    "column '{name}' does not exist in table '{}'",
                    self.name
                )));
            };
            projected.insert(name.clone(), value.clone());
        }
        Ok(projected)
    }

    /// Check the row covers every declared column; returns a new row holding
    /// exactly the declared columns.
    fn validate(&self, row: &Row) -> DbResult<Row> {
        let mut full_row = Row::new();
        for column in &self.columns {
            let Some(value) = row.get(&column.name) else {
                return Err(DbError::Relation(format!(
                    "row is missing column '{}' of table '{}'",
                    column.name, self.name
                )));
            };
            full_row.insert(column.name.clone(), value.clone());
        }
        Ok(full_row)
    }

    /// Pack a validated row into its on-block bytes, columns in declared
    /// order: INT as 4 little-endian bytes, TEXT as a u16 length prefix
    /// followed by the bytes.
    fn marshal(&self, row: &Row) -> DbResult<Vec<u8>> {
        let mut bytes = Vec::new();
        for column in &self.columns {
            let Some(value) = row.get(&column.name) else {
                return Err(DbError::Relation(format!(
                    "row is missing column '{}' of table '{}'",
                    column.name, self.name
                )));
            };
            match (column.ty, value) {
                (SqlType::Int, Value::Int(n)) => bytes.extend_from_slice(&n.to_le_bytes()),
                (SqlType::Text, Value::Text(s)) => {
                    let len = u16::try_from(s.len()).map_err(|_| {
                        DbError::Relation(format!(
                            "text value too long for column '{}' of table '{}'",
                            column.name, self.name
                        ))
                    })?;
                    bytes.extend_from_slice(&len.to_le_bytes());
                    bytes.extend_from_slice(s.as_bytes());
                }
                _ => {
                    return Err(DbError::Relation(format!(
                        "cannot marshal value for column '{}': only INT and TEXT are stored",
                        column.name
                    )));
                }
            }
        }
        Ok(bytes)
    }

    /// Dual of `marshal`, driven by the declared column list.
    fn unmarshal(&self, bytes: &[u8]) -> DbResult<Row> {
        let mut row = Row::new();
        let mut offset = 0usize;
        for column in &self.columns {
            match column.ty {
                SqlType::Int => {
                    let chunk = self.record_bytes(bytes, offset, 4)?;
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(chunk);
                    offset += 4;
                    row.insert(column.name.clone(), Value::Int(i32::from_le_bytes(raw)));
                }
                SqlType::Text => {
                    let chunk = self.record_bytes(bytes, offset, 2)?;
                    let mut raw = [0u8; 2];
                    raw.copy_from_slice(chunk);
                    offset += 2;
                    let len = u16::from_le_bytes(raw) as usize;
                    let text = self.record_bytes(bytes, offset, len)?;
                    offset += len;
                    let text = String::from_utf8(text.to_vec()).map_err(|_| {
                        DbError::Storage(format!(
                            "column '{}' of table '{}' holds invalid text",
                            column.name, self.name
                        ))
                    })?;
                    row.insert(column.name.clone(), Value::Text(text));
                }
            }
        }
        Ok(row)
    }

    fn record_bytes<'a>(&self, bytes: &'a [u8], offset: usize, len: usize) -> DbResult<&'a [u8]> {
        bytes.get(offset..offset + len).ok_or_else(|| {
            DbError::Storage(format!("record of table '{}' is truncated", self.name))
        })
    }

    /// Store a fully fleshed-out row: try the last block, fall back to a
    /// fresh one when it is full.
    fn append(&mut self, row: &Row) -> DbResult<Handle> {
        let payload = self.marshal(row)?;
        let mut block = self.file.get(self.file.last_block())?;
        let record_id = match block.add(&payload) {
            Ok(id) => id,
            Err(DbError::NoRoom(_)) => {
                block = self.file.get_new()?;
                block.add(&payload).map_err(|err| match err {
                    DbError::NoRoom(_) => DbError::Relation(format!(
                        "row of {} bytes does not fit in a single block",
                        payload.len()
                    )),
                    other => other,
                })?
            }
            Err(other) => return Err(other),
        };
        self.file.put(&block)?;
        Ok(Handle::new(block.block_id(), record_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BlockId;
    use tempfile::tempdir;

    fn config(dir: &tempfile::TempDir) -> Config {
        Config::builder().data_dir(dir.path().to_path_buf()).build()
    }

    fn test_table(dir: &tempfile::TempDir) -> HeapTable {
        let mut table = HeapTable::new(
            &config(dir),
            "foo",
            vec![
                Column::new("id", SqlType::Int),
                Column::new("data", SqlType::Text),
            ],
        );
        table.create().unwrap();
        table
    }

    fn row(id: i32, data: &str) -> Row {
        Row::from([
            ("id".to_string(), Value::Int(id)),
            ("data".to_string(), Value::from(data)),
        ])
    }

    #[test]
    fn insert_then_project_returns_the_row_verbatim() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);

        let hello = table.insert(&row(1, "hello")).unwrap();
        let world = table.insert(&row(2, "world")).unwrap();

        assert_eq!(table.project(hello).unwrap(), row(1, "hello"));
        assert_eq!(table.project(world).unwrap(), row(2, "world"));
        assert_eq!(table.select().unwrap(), vec![hello, world]);
    }

    #[test]
    fn marshal_unmarshal_round_trips_through_bytes() {
        let dir = tempdir().unwrap();
        let table = test_table(&dir);
        let original = row(-42, "snow day");

        let bytes = table.marshal(&original).unwrap();
        assert_eq!(bytes.len(), 4 + 2 + "snow day".len());
        assert_eq!(table.unmarshal(&bytes).unwrap(), original);
    }

    #[test]
    fn validate_requires_every_declared_column() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let partial = Row::from([("id".to_string(), Value::Int(1))]);

        assert!(matches!(
            table.insert(&partial),
            Err(DbError::Relation(_))
        ));
    }

    #[test]
    fn validate_keeps_exactly_the_declared_columns() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let mut extra = row(1, "x");
        extra.insert("stray".to_string(), Value::Int(9));

        let handle = table.insert(&extra).unwrap();
        assert_eq!(table.project(handle).unwrap(), row(1, "x"));
    }

    #[test]
    fn marshal_rejects_mistyped_values() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let mistyped = Row::from([
            ("id".to_string(), Value::from("not an int")),
            ("data".to_string(), Value::from("x")),
        ]);

        assert!(matches!(
            table.insert(&mistyped),
            Err(DbError::Relation(_))
        ));
    }

    #[test]
    fn delete_removes_the_handle_from_select() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let first = table.insert(&row(1, "one")).unwrap();
        let second = table.insert(&row(2, "two")).unwrap();

        table.delete(first).unwrap();

        assert_eq!(table.select().unwrap(), vec![second]);
        assert!(matches!(table.project(first), Err(DbError::Storage(_))));
    }

    #[test]
    fn insert_after_delete_never_aliases_the_old_handle() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let old = table.insert(&row(1, "gone")).unwrap();
        table.delete(old).unwrap();

        let new = table.insert(&row(2, "here")).unwrap();

        assert_ne!(new, old);
        assert_eq!(table.select().unwrap(), vec![new]);
    }

    #[test]
    fn update_grows_a_record_in_place() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let first = table.insert(&row(1, "hi")).unwrap();
        let second = table.insert(&row(2, "neighbor")).unwrap();

        let free_before = {
            let block = table.file.get(first.block_id).unwrap();
            block.end_free()
        };
        let grown = "hi".repeat(51); // 100 bytes longer than "hi"
        let patch = Row::from([("data".to_string(), Value::from(grown.as_str()))]);
        table.update(first, &patch).unwrap();

        assert_eq!(table.project(first).unwrap(), row(1, grown.as_str()));
        assert_eq!(table.project(second).unwrap(), row(2, "neighbor"));
        let block = table.file.get(first.block_id).unwrap();
        assert_eq!(block.end_free(), free_before - 100);
    }

    #[test]
    fn update_merges_partial_rows() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let handle = table.insert(&row(7, "keep me")).unwrap();

        let patch = Row::from([("id".to_string(), Value::Int(8))]);
        table.update(handle, &patch).unwrap();

        assert_eq!(table.project(handle).unwrap(), row(8, "keep me"));
    }

    #[test]
    fn full_block_spills_to_a_second_without_moving_rows() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let wide = "w".repeat(500);

        let mut handles = Vec::new();
        loop {
            let handle = table.insert(&row(handles.len() as i32, &wide)).unwrap();
            if handle.block_id == BlockId(2) {
                break;
            }
            handles.push(handle);
        }

        assert!(!handles.is_empty());
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.block_id, BlockId(1));
            assert_eq!(table.project(*handle).unwrap(), row(i as i32, &wide));
        }
    }

    #[test]
    fn rows_larger_than_a_block_are_rejected() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let oversized = "x".repeat(crate::BLOCK_SZ);

        assert!(matches!(
            table.insert(&row(1, &oversized)),
            Err(DbError::Relation(_))
        ));
    }

    #[test]
    fn select_where_filters_on_equality() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        table.insert(&row(1, "a")).unwrap();
        let b = table.insert(&row(2, "b")).unwrap();
        table.insert(&row(3, "a")).unwrap();

        let predicate = Row::from([("data".to_string(), Value::from("b"))]);
        assert_eq!(table.select_where(&predicate).unwrap(), vec![b]);

        let none = Row::from([
            ("id".to_string(), Value::Int(1)),
            ("data".to_string(), Value::from("b")),
        ]);
        assert!(table.select_where(&none).unwrap().is_empty());
    }

    #[test]
    fn project_columns_rejects_unknown_names() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let handle = table.insert(&row(1, "x")).unwrap();

        let projected = table
            .project_columns(handle, &["data".to_string()])
            .unwrap();
        assert_eq!(
            projected,
            Row::from([("data".to_string(), Value::from("x"))])
        );

        assert!(matches!(
            table.project_columns(handle, &["nope".to_string()]),
            Err(DbError::Relation(_))
        ));
    }

    #[test]
    fn create_if_not_exists_opens_existing_data() {
        let dir = tempdir().unwrap();
        let mut table = test_table(&dir);
        let handle = table.insert(&row(5, "kept")).unwrap();
        table.close().unwrap();

        let mut reopened = HeapTable::new(
            &config(&dir),
            "foo",
            vec![
                Column::new("id", SqlType::Int),
                Column::new("data", SqlType::Text),
            ],
        );
        reopened.create_if_not_exists().unwrap();

        assert_eq!(reopened.select().unwrap(), vec![handle]);
        assert_eq!(reopened.project(handle).unwrap(), row(5, "kept"));
    }
}
