use crate::errors::DbError;
use bson::Bson;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;
pub(crate) const MAX_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// Mongo-style direction number: `1` ascending, `-1` descending.
    #[must_use]
    pub const fn direction(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

impl FromStr for Order {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" | "+" => Ok(Self::Asc),
            "desc" | "descending" | "-1" | "-" => Ok(Self::Desc),
            other => Err(DbError::InvalidArgument(format!("unknown sort direction '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn new(field: &str, order: Order) -> Self {
        Self { field: field.to_string(), order }
    }
}

/// Options for `find_docs`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub projection: Option<Vec<String>>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Filter {
    pub fn eq(path: &str, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.to_string(), op: CmpOp::Eq, value: value.into() }
    }

    pub fn cmp(path: &str, op: CmpOp, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.to_string(), op, value: value.into() }
    }
}

/// `$set` style update: each pair replaces (or creates) one field.
#[derive(Debug, Default, Clone)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_parses_words_and_directions() {
        assert_eq!("asc".parse::<Order>().unwrap(), Order::Asc);
        assert_eq!(" Descending ".parse::<Order>().unwrap(), Order::Desc);
        assert_eq!("-1".parse::<Order>().unwrap(), Order::Desc);
        assert_eq!("1".parse::<Order>().unwrap(), Order::Asc);
        assert!(matches!("sideways".parse::<Order>(), Err(DbError::InvalidArgument(_))));
        assert!(matches!("".parse::<Order>(), Err(DbError::InvalidArgument(_))));
    }
}
