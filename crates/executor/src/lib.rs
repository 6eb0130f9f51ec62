//! DDL executor: dispatches parsed statements against the schema catalog
//! and the heap storage beneath it.
//!
//! Multi-step statements (CREATE TABLE, CREATE INDEX) compensate on
//! failure by deleting the catalog rows inserted so far; a failure during
//! that compensation is logged and swallowed so the primary error reaches
//! the caller.


use catalog::{COLUMNS_TABLE, Catalog, TABLES_TABLE};
use common::result::QueryResult;
use common::{Config, DbError, DbResult, Handle, Row};
use log::warn;
use parser::{ColumnDef, Statement};
use storage::Column;
use types::{SqlType, Value};

/// Executes DDL statements over one database directory.
pub struct SqlExecutor {
    catalog: Catalog,
}

/// Errors crossing up out of the relations and storage below become exec
/// errors; the original message is preserved. The executor's own guard
/// errors (e.g. refusing to drop a schema table) are raised directly and
/// never pass through here.
fn wrap_relation(err: DbError) -> DbError {
    match err {
        DbError::Relation(msg) | DbError::Storage(msg) => DbError::Exec(msg),
        err @ DbError::Io(_) => DbError::Exec(err.to_string()),
        other => other,
    }
}

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

impl SqlExecutor {
    /// Open the schema catalog under `config`, bootstrapping it if needed.
    pub fn new(config: Config) -> DbResult<Self> {
        Ok(Self {
            catalog: Catalog::open(config)?,
        })
    }

    /// The schema catalog, for layers above DDL (e.g. a DML engine
    /// resolving user tables).
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn execute(&mut self, statement: &Statement) -> DbResult<QueryResult> {
        match statement {
            Statement::CreateTable {
                name,
                columns,
                if_not_exists,
            } => self.create_table(name, columns, *if_not_exists),
            Statement::DropTable { name } => self.drop_table(name),
            Statement::CreateIndex {
                name,
                table,
                columns,
                index_type,
                if_not_exists,
            } => self.create_index(name, table, columns, index_type.as_deref(), *if_not_exists),
            Statement::DropIndex { table, name } => self.drop_index(table, name),
            Statement::ShowTables => self.show_tables(),
            Statement::ShowColumns { table } => self.show_columns(table),
            Statement::ShowIndex { table } => self.show_index(table),
        }
    }

    fn create_table(
        &mut self,
        name: &str,
        defs: &[ColumnDef],
        if_not_exists: bool,
    ) -> DbResult<QueryResult> {
        let mut columns = Vec::with_capacity(defs.len());
        for def in defs {
            let Some(ty) = SqlType::parse(&def.ty) else {
                return Err(DbError::Exec(format!(
                    "unrecognized data type '{}' for column '{}'",
                    def.ty, def.name
                )));
            };
            columns.push(Column::new(def.name.as_str(), ty));
        }

        let t_handle = self
            .catalog
            .tables_mut()
            .insert(&row(&[("table_name", Value::from(name))]))
            .map_err(wrap_relation)?;

        match self.create_table_entries(name, &columns, if_not_exists) {
            Ok(()) => Ok(QueryResult::message(format!("created {name}"))),
            Err(err) => {
                if let Err(undo) = self.catalog.tables_mut().delete(t_handle) {
                    warn!("could not undo _tables entry for '{name}': {undo}");
                }
                Err(err)
            }
        }
    }

    /// Insert the `_columns` rows and materialize the relation,
    /// compensating with deletes of whatever was inserted when a later
    /// step fails.
    fn create_table_entries(
        &mut self,
        name: &str,
        columns: &[Column],
        if_not_exists: bool,
    ) -> DbResult<()> {
        let mut c_handles = Vec::with_capacity(columns.len());
        let result = self
            .insert_column_rows(name, columns, &mut c_handles)
            .and_then(|()| {
                let mut table = self.catalog.open_table(name).map_err(wrap_relation)?;
                if if_not_exists {
                    table.create_if_not_exists().map_err(wrap_relation)
                } else {
                    table.create().map_err(wrap_relation)
                }
            });
        if let Err(err) = result {
            for handle in c_handles {
                if let Err(undo) = self.catalog.columns_mut().delete(handle) {
                    warn!("could not undo _columns entry {handle} for '{name}': {undo}");
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn insert_column_rows(
        &mut self,
        name: &str,
        columns: &[Column],
        handles: &mut Vec<Handle>,
    ) -> DbResult<()> {
        for column in columns {
            let column_row = row(&[
                ("table_name", Value::from(name)),
                ("column_name", Value::from(column.name.as_str())),
                ("data_type", Value::from(column.ty.as_str())),
            ]);
            handles.push(
                self.catalog
                    .columns_mut()
                    .insert(&column_row)
                    .map_err(wrap_relation)?,
            );
        }
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> DbResult<QueryResult> {
        if Catalog::is_schema_table(name) {
            return Err(DbError::Relation(format!(
                "cannot drop schema table '{name}'"
            )));
        }
        let predicate = row(&[("table_name", Value::from(name))]);
        let mut table = self.catalog.open_table(name).map_err(wrap_relation)?;

        for handle in self
            .catalog
            .columns_mut()
            .select_where(&predicate)
            .map_err(wrap_relation)?
        {
            self.catalog
                .columns_mut()
                .delete(handle)
                .map_err(wrap_relation)?;
        }
        for handle in self
            .catalog
            .indices_mut()
            .select_where(&predicate)
            .map_err(wrap_relation)?
        {
            self.catalog
                .indices_mut()
                .delete(handle)
                .map_err(wrap_relation)?;
        }
        table.destroy().map_err(wrap_relation)?;
        for handle in self
            .catalog
            .tables_mut()
            .select_where(&predicate)
            .map_err(wrap_relation)?
        {
            self.catalog
                .tables_mut()
                .delete(handle)
                .map_err(wrap_relation)?;
        }
        Ok(QueryResult::message(format!("dropped {name}")))
    }

    fn create_index(
        &mut self,
        name: &str,
        table: &str,
        index_columns: &[String],
        index_type: Option<&str>,
        if_not_exists: bool,
    ) -> DbResult<QueryResult> {
        let index_type = index_type.unwrap_or("BTREE");
        let is_unique = index_type == "BTREE";

        // the catalog must already know the table
        self.catalog.table_schema(table).map_err(wrap_relation)?;

        let index_predicate = row(&[
            ("table_name", Value::from(table)),
            ("index_name", Value::from(name)),
        ]);
        let existing = self
            .catalog
            .indices_mut()
            .select_where(&index_predicate)
            .map_err(wrap_relation)?;
        if !existing.is_empty() {
            if if_not_exists {
                return Ok(QueryResult::message(format!("index {name} already exists")));
            }
            return Err(DbError::Relation(format!(
                "index '{name}' already exists on table '{table}'"
            )));
        }

        let mut inserted = Vec::with_capacity(index_columns.len());
        match self.insert_index_rows(name, table, index_columns, index_type, is_unique, &mut inserted)
        {
            Ok(()) => Ok(QueryResult::message(format!("created index {name}"))),
            Err(err) => {
                for handle in inserted {
                    if let Err(undo) = self.catalog.indices_mut().delete(handle) {
                        warn!("could not undo _indices entry {handle} for '{name}': {undo}");
                    }
                }
                Err(err)
            }
        }
    }

    fn insert_index_rows(
        &mut self,
        name: &str,
        table: &str,
        index_columns: &[String],
        index_type: &str,
        is_unique: bool,
        handles: &mut Vec<Handle>,
    ) -> DbResult<()> {
        for (seq, column) in index_columns.iter().enumerate() {
            // validate inside the loop: an unknown later column aborts
            // mid-statement and hands the rows inserted so far to rollback
            let known = self
                .catalog
                .columns_mut()
                .select_where(&row(&[
                    ("table_name", Value::from(table)),
                    ("column_name", Value::from(column.as_str())),
                ]))
                .map_err(wrap_relation)?;
            if known.is_empty() {
                return Err(DbError::Relation(format!(
                    "unknown column '{column}' on table '{table}'"
                )));
            }
            let index_row = row(&[
                ("table_name", Value::from(table)),
                ("index_name", Value::from(name)),
                ("seq_in_index", Value::Int(seq as i32 + 1)),
                ("column_name", Value::from(column.as_str())),
                ("index_type", Value::from(index_type)),
                ("is_unique", Value::Int(i32::from(is_unique))),
            ]);
            handles.push(
                self.catalog
                    .indices_mut()
                    .insert(&index_row)
                    .map_err(wrap_relation)?,
            );
        }
        Ok(())
    }

    fn drop_index(&mut self, table: &str, name: &str) -> DbResult<QueryResult> {
        let predicate = row(&[
            ("table_name", Value::from(table)),
            ("index_name", Value::from(name)),
        ]);
        let handles = self
            .catalog
            .indices_mut()
            .select_where(&predicate)
            .map_err(wrap_relation)?;
        if handles.is_empty() {
            return Err(DbError::Relation(format!(
                "no index '{name}' on table '{table}'"
            )));
        }
        for handle in handles {
            self.catalog
                .indices_mut()
                .delete(handle)
                .map_err(wrap_relation)?;
        }
        Ok(QueryResult::message(format!("dropped index {name}")))
    }

    fn show_tables(&mut self) -> DbResult<QueryResult> {
        let column_names = vec!["table_name".to_string()];
        let handles = self.catalog.tables_mut().select().map_err(wrap_relation)?;
        let mut rows = Vec::new();
        for handle in handles {
            let projected = self
                .catalog
                .tables_mut()
                .project_columns(handle, &column_names)
                .map_err(wrap_relation)?;
            let user_table = projected
                .get("table_name")
                .and_then(Value::as_text)
                .is_some_and(|n| n != TABLES_TABLE && n != COLUMNS_TABLE);
            if user_table {
                rows.push(projected);
            }
        }
        let n = rows.len();
        Ok(QueryResult::with_rows(
            column_names,
            vec![SqlType::Text],
            rows,
            format!("successfully returned {n} rows"),
        ))
    }

    fn show_columns(&mut self, table: &str) -> DbResult<QueryResult> {
        let column_names: Vec<String> = ["table_name", "column_name", "data_type"]
            .into_iter()
            .map(String::from)
            .collect();
        let predicate = row(&[("table_name", Value::from(table))]);
        let handles = self
            .catalog
            .columns_mut()
            .select_where(&predicate)
            .map_err(wrap_relation)?;
        let mut rows = Vec::with_capacity(handles.len());
        for handle in handles {
            rows.push(
                self.catalog
                    .columns_mut()
                    .project_columns(handle, &column_names)
                    .map_err(wrap_relation)?,
            );
        }
        let n = rows.len();
        Ok(QueryResult::with_rows(
            column_names,
            vec![SqlType::Text; 3],
            rows,
            format!("successfully returned {n} rows"),
        ))
    }

    fn show_index(&mut self, table: &str) -> DbResult<QueryResult> {
        let column_names: Vec<String> = [
            "table_name",
            "index_name",
            "seq_in_index",
            "column_name",
            "index_type",
            "is_unique",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        let predicate = row(&[("table_name", Value::from(table))]);
        let handles = self
            .catalog
            .indices_mut()
            .select_where(&predicate)
            .map_err(wrap_relation)?;
        let mut rows = Vec::with_capacity(handles.len());
        for handle in handles {
            let mut projected = self
                .catalog
                .indices_mut()
                .project(handle)
                .map_err(wrap_relation)?;
            // stored as INT, presented as BOOLEAN
            let unique = projected.get("is_unique").and_then(Value::as_int);
            if let Some(flag) = unique {
                projected.insert("is_unique".to_string(), Value::Bool(flag != 0));
            }
            rows.push(projected);
        }
        let n = rows.len();
        Ok(QueryResult::with_rows(
            column_names,
            vec![
                SqlType::Text,
                SqlType::Text,
                SqlType::Int,
                SqlType::Text,
                SqlType::Text,
                SqlType::Int,
            ],
            rows,
            format!("successfully returned {n} rows"),
        ))
    }
}
