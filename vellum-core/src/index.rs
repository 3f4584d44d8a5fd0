//! Secondary index declarations.

use serde::{Deserialize, Serialize};

/// Sort or index direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    /// Key suffix used in index names (`1` / `-1`).
    pub fn as_key(&self) -> i32 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }
}

/// A single-field index a record type wants on its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDeclaration {
    pub field: String,
    pub direction: Direction,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexDeclaration {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
            unique: false,
            sparse: false,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Ascending)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Descending)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// Store-side index name, e.g. `email_1` or `created_at_-1`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.field, self.direction.as_key())
    }
}
