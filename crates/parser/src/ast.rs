#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
        if_not_exists: bool,
    },
    DropTable {
        name: String,
    },
    CreateIndex {
        name: String,
        table: String,
        columns: Vec<String>,
        /// Defaults to BTREE when the statement names no type.
        index_type: Option<String>,
        if_not_exists: bool,
    },
    DropIndex {
        table: String,
        name: String,
    },
    ShowTables,
    ShowColumns {
        table: String,
    },
    ShowIndex {
        table: String,
    },
}

/// Column definition as written in CREATE TABLE. The type is kept as the
/// raw tag so unsupported types (e.g. DOUBLE) surface as executor errors
/// rather than parse errors.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}
