//! The three physical relations behind every entity and their bookkeeping
//! columns.

use crate::field::DataType;
use serde::{Deserialize, Serialize};

/// Reserved key under which a composite record carries its child records.
pub const CHILD_RECORDS_KEY: &str = "beans";

/// Key naming the owning Bean on a child record when a Module owns several.
pub const BEAN_TAG_KEY: &str = "bean";

pub const ADDED_BY: &str = "ADDED_BY";
pub const ADDED_DATE_TIME: &str = "ADDED_DATE_TIME";
pub const UPDATED_BY: &str = "UPDATED_BY";
pub const UPDATED_DATE_TIME: &str = "UPDATED_DATE_TIME";
pub const APPROVE_BY: &str = "APPROVE_BY";
pub const APPROVE_DATE_TIME: &str = "APPROVE_DATE_TIME";
pub const REQUEST: &str = "REQUEST";
pub const STATUS: &str = "STATUS";
pub const REJECT_REMARK: &str = "REJECT_REMARK";
pub const RECTIFY_REMARK: &str = "RECTIFY_REMARK";

const STAGING_COLUMNS: &[&str] = &[
    ADDED_BY,
    ADDED_DATE_TIME,
    UPDATED_BY,
    UPDATED_DATE_TIME,
    APPROVE_BY,
    APPROVE_DATE_TIME,
    REQUEST,
    STATUS,
    RECTIFY_REMARK,
];

const AUTHORITATIVE_COLUMNS: &[&str] = &[
    ADDED_BY,
    ADDED_DATE_TIME,
    UPDATED_BY,
    UPDATED_DATE_TIME,
    APPROVE_BY,
    APPROVE_DATE_TIME,
];

const HISTORY_COLUMNS: &[&str] = &[
    ADDED_BY,
    ADDED_DATE_TIME,
    UPDATED_BY,
    UPDATED_DATE_TIME,
    APPROVE_BY,
    APPROVE_DATE_TIME,
    REQUEST,
    STATUS,
    REJECT_REMARK,
    RECTIFY_REMARK,
];

/// Which of an entity's relations a statement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Pending changes awaiting a decision
    Staging,
    /// Current truth
    Authoritative,
    /// Append-only decision log
    History,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Relation::Staging, Relation::Authoritative, Relation::History];

    pub fn suffix(&self) -> &'static str {
        match self {
            Relation::Staging => "_TEMP",
            Relation::Authoritative => "_MASTER",
            Relation::History => "_HIST",
        }
    }

    /// Physical relation name for an entity.
    pub fn table_name(&self, entity_name: &str) -> String {
        format!("{}{}", entity_name, self.suffix())
    }

    /// Bookkeeping columns carried by this relation, in column order.
    pub fn bookkeeping_columns(&self) -> &'static [&'static str] {
        match self {
            Relation::Staging => STAGING_COLUMNS,
            Relation::Authoritative => AUTHORITATIVE_COLUMNS,
            Relation::History => HISTORY_COLUMNS,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.bookkeeping_columns().contains(&column)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Staging => "staging",
            Relation::Authoritative => "authoritative",
            Relation::History => "history",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every bookkeeping column name. None may be declared as an entity field.
pub fn is_bookkeeping_column(name: &str) -> bool {
    HISTORY_COLUMNS.iter().any(|c| c.eq_ignore_ascii_case(name))
}

/// Declared type of a bookkeeping column.
pub fn bookkeeping_type(column: &str) -> DataType {
    if column.ends_with("_DATE_TIME") {
        DataType::Timestamp
    } else {
        DataType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_use_fixed_suffixes() {
        assert_eq!(Relation::Staging.table_name("EMPLOYEE"), "EMPLOYEE_TEMP");
        assert_eq!(Relation::Authoritative.table_name("EMPLOYEE"), "EMPLOYEE_MASTER");
        assert_eq!(Relation::History.table_name("EMPLOYEE"), "EMPLOYEE_HIST");
    }

    #[test]
    fn history_is_a_superset_of_the_other_relations() {
        for relation in [Relation::Staging, Relation::Authoritative] {
            for column in relation.bookkeeping_columns() {
                assert!(Relation::History.has_column(column), "{column}");
            }
        }
        assert!(!Relation::Staging.has_column(REJECT_REMARK));
        assert!(!Relation::Authoritative.has_column(STATUS));
    }

    #[test]
    fn bookkeeping_names_are_reserved_case_insensitively() {
        assert!(is_bookkeeping_column("status"));
        assert!(is_bookkeeping_column("APPROVE_BY"));
        assert!(!is_bookkeeping_column("EMP_ID"));
        assert_eq!(bookkeeping_type(ADDED_DATE_TIME), DataType::Timestamp);
        assert_eq!(bookkeeping_type(REQUEST), DataType::Text);
    }
}
