//! Self-describing schema catalog: the `_tables`, `_columns`, and
//! `_indices` relations, themselves plain heap tables.

use std::fs;

use common::{Config, DbError, DbResult, Row};
use log::debug;
use storage::{Column, HeapTable};
use types::{SqlType, Value};

pub const TABLES_TABLE: &str = "_tables";
pub const COLUMNS_TABLE: &str = "_columns";
pub const INDICES_TABLE: &str = "_indices";

/// The schema relations for one database directory.
///
/// A catalog is an ordinary value: the executor owns one, and tests build a
/// fresh one per temporary directory. Opening bootstraps the relations on
/// first use, including the self-referential rows describing `_tables` and
/// `_columns` themselves.
#[derive(Debug)]
pub struct Catalog {
    config: Config,
    tables: HeapTable,
    columns: HeapTable,
    indices: HeapTable,
}

fn tables_schema() -> Vec<Column> {
    vec![Column::new("table_name", SqlType::Text)]
}

fn columns_schema() -> Vec<Column> {
    vec![
        Column::new("table_name", SqlType::Text),
        Column::new("column_name", SqlType::Text),
        Column::new("data_type", SqlType::Text),
    ]
}

fn indices_schema() -> Vec<Column> {
    vec![
        Column::new("table_name", SqlType::Text),
        Column::new("index_name", SqlType::Text),
        Column::new("seq_in_index", SqlType::Int),
        Column::new("column_name", SqlType::Text),
        Column::new("index_type", SqlType::Text),
        Column::new("is_unique", SqlType::Int),
    ]
}

fn table_row(table: &str) -> Row {
    Row::from([("table_name".to_string(), Value::from(table))])
}

fn column_row(table: &str, column: &str, ty: SqlType) -> Row {
    Row::from([
        ("table_name".to_string(), Value::from(table)),
        ("column_name".to_string(), Value::from(column)),
        ("data_type".to_string(), Value::from(ty.as_str())),
    ])
}

impl Catalog {
    /// Open the schema relations under `config.data_dir`, creating and
    /// seeding them when absent.
    pub fn open(config: Config) -> DbResult<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let mut tables = HeapTable::new(&config, TABLES_TABLE, tables_schema());
        let mut columns = HeapTable::new(&config, COLUMNS_TABLE, columns_schema());
        let mut indices = HeapTable::new(&config, INDICES_TABLE, indices_schema());

        if tables.open().is_err() {
            debug!("bootstrapping schema catalog in {}", config.data_dir.display());
            tables.create()?;
            for name in [TABLES_TABLE, COLUMNS_TABLE] {
                tables.insert(&table_row(name))?;
            }
        }
        if columns.open().is_err() {
            columns.create()?;
            for (table, schema) in [
                (TABLES_TABLE, tables_schema()),
                (COLUMNS_TABLE, columns_schema()),
            ] {
                for column in schema {
                    columns.insert(&column_row(table, &column.name, column.ty))?;
                }
            }
        }
        indices.create_if_not_exists()?;

        Ok(Self {
            config,
            tables,
            columns,
            indices,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The `_tables` relation.
    pub fn tables_mut(&mut self) -> &mut HeapTable {
        &mut self.tables
    }

    /// The `_columns` relation.
    pub fn columns_mut(&mut self) -> &mut HeapTable {
        &mut self.columns
    }

    /// The `_indices` relation.
    pub fn indices_mut(&mut self) -> &mut HeapTable {
        &mut self.indices
    }

    /// Whether `name` is one of the catalog's own relations.
    pub fn is_schema_table(name: &str) -> bool {
        matches!(name, TABLES_TABLE | COLUMNS_TABLE | INDICES_TABLE)
    }

    /// Declared columns of `table`, in declaration order, read back from
    /// `_columns`. `_columns` rows are appended in declaration order and
    /// never rewritten, so select order is declaration order.
    pub fn table_schema(&mut self, table: &str) -> DbResult<Vec<Column>> {
        let handles = self.columns.select_where(&table_row(table))?;
        if handles.is_empty() {
            return Err(DbError::Relation(format!("unknown table '{table}'")));
        }
        let mut schema = Vec::with_capacity(handles.len());
        for handle in handles {
            let row = self.columns.project(handle)?;
            let name = row
                .get("column_name")
                .and_then(Value::as_text)
                .ok_or_else(|| malformed(table, handle))?;
            let tag = row
                .get("data_type")
                .and_then(Value::as_text)
                .ok_or_else(|| malformed(table, handle))?;
            let ty = SqlType::parse(tag).ok_or_else(|| {
                DbError::Relation(format!(
                    "column '{name}' of table '{table}' has unknown data type '{tag}'"
                ))
            })?;
            schema.push(Column::new(name, ty));
        }
        Ok(schema)
    }

    /// Materialize the heap table for `table` from its catalog schema.
    pub fn open_table(&mut self, table: &str) -> DbResult<HeapTable> {
        let schema = self.table_schema(table)?;
        Ok(HeapTable::new(&self.config, table, schema))
    }
}

fn malformed(table: &str, handle: common::Handle) -> DbError {
    DbError::Relation(format!(
        "malformed _columns row {handle} for table '{table}'"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_catalog(dir: &tempfile::TempDir) -> Catalog {
        let config = Config::builder().data_dir(dir.path().to_path_buf()).build();
        Catalog::open(config).unwrap()
    }

    #[test]
    fn bootstrap_seeds_the_schema_relations() {
        let dir = tempdir().unwrap();
        let mut catalog = open_catalog(&dir);

        // _tables lists itself and _columns
        assert_eq!(catalog.tables_mut().select().unwrap().len(), 2);
        // _columns carries one row per bootstrap column: 1 + 3
        assert_eq!(catalog.columns_mut().select().unwrap().len(), 4);
        assert!(catalog.indices_mut().select().unwrap().is_empty());
    }

    #[test]
    fn reopen_keeps_existing_rows_instead_of_reseeding() {
        let dir = tempdir().unwrap();
        {
            let mut catalog = open_catalog(&dir);
            catalog
                .tables_mut()
                .insert(&table_row("users"))
                .unwrap();
        }

        let mut catalog = open_catalog(&dir);
        assert_eq!(catalog.tables_mut().select().unwrap().len(), 3);
        assert_eq!(catalog.columns_mut().select().unwrap().len(), 4);
    }

    #[test]
    fn schema_tables_are_recognized() {
        assert!(Catalog::is_schema_table(TABLES_TABLE));
        assert!(Catalog::is_schema_table(COLUMNS_TABLE));
        assert!(Catalog::is_schema_table(INDICES_TABLE));
        assert!(!Catalog::is_schema_table("users"));
    }

    #[test]
    fn table_schema_reads_back_declared_columns_in_order() {
        let dir = tempdir().unwrap();
        let mut catalog = open_catalog(&dir);
        catalog.tables_mut().insert(&table_row("users")).unwrap();
        for (name, ty) in [
            ("id", SqlType::Int),
            ("name", SqlType::Text),
            ("age", SqlType::Int),
        ] {
            catalog
                .columns_mut()
                .insert(&column_row("users", name, ty))
                .unwrap();
        }

        let schema = catalog.table_schema("users").unwrap();
        assert_eq!(
            schema,
            vec![
                Column::new("id", SqlType::Int),
                Column::new("name", SqlType::Text),
                Column::new("age", SqlType::Int),
            ]
        );
    }

    #[test]
    fn unknown_tables_are_a_relation_error() {
        let dir = tempdir().unwrap();
        let mut catalog = open_catalog(&dir);

        assert!(matches!(
            catalog.table_schema("ghost"),
            Err(DbError::Relation(_))
        ));
        assert!(matches!(
            catalog.open_table("ghost"),
            Err(DbError::Relation(_))
        ));
    }

    #[test]
    fn open_table_round_trips_rows() {
        let dir = tempdir().unwrap();
        let mut catalog = open_catalog(&dir);
        catalog.tables_mut().insert(&table_row("notes")).unwrap();
        catalog
            .columns_mut()
            .insert(&column_row("notes", "body", SqlType::Text))
            .unwrap();

        let mut notes = catalog.open_table("notes").unwrap();
        notes.create().unwrap();
        let handle = notes
            .insert(&Row::from([(
                "body".to_string(),
                Value::from("remember the milk"),
            )]))
            .unwrap();

        let mut reopened = catalog.open_table("notes").unwrap();
        assert_eq!(
            reopened.project(handle).unwrap(),
            Row::from([("body".to_string(), Value::from("remember the milk"))])
        );
    }
}
