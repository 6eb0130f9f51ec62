#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int,
    Text,
}

impl SqlType {
    /// The tag stored in the `data_type` column of the schema catalog.
    pub fn as_str(self) -> &'static str {
        match self {
            SqlType::Int => "INT",
            SqlType::Text => "TEXT",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "INT" => Some(SqlType::Int),
            "TEXT" => Some(SqlType::Text),
            _ => None,
        }
    }
}

/// Runtime value held in a row. `Bool` never reaches disk: the storage
/// layer marshals exactly `Int` and `Text`, and booleans only appear in
/// query results (e.g. `is_unique` of SHOW INDEX).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i32),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
