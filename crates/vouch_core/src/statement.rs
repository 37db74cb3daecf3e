//! Dynamic statement builder.
//!
//! Turns an [`Entity`] schema plus a [`Record`] into parameterized SQL for
//! one of the entity's relations. Table and column names come only from
//! metadata and are always quoted; every value is a bound parameter.
//!
//! Builders return `None` when the record carries no usable primary-key
//! value, so a missing key can never widen a read or write to the whole
//! relation.

use crate::actor::Stamp;
use crate::status::{RequestKind, RowStatus};
use vouch_db::{quote_ident, DbValue};
use vouch_schema::relation::{
    bookkeeping_type, ADDED_BY, ADDED_DATE_TIME, APPROVE_BY, APPROVE_DATE_TIME, RECTIFY_REMARK,
    REQUEST, STATUS, UPDATED_BY, UPDATED_DATE_TIME,
};
use vouch_schema::{Entity, Field, Record, Relation, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
        }
    }
}

/// A parameterized statement ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DbValue>,
    pub table: String,
    pub relation: Relation,
    pub kind: StatementKind,
}

/// What an UPDATE is for. Each target fixes the relation and the
/// bookkeeping columns written alongside the entity's non-key fields.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateTarget {
    /// Overwrite the authoritative row with approved staged values.
    ApproveAuthoritative,
    /// Checker returns the staged row to the maker.
    ReturnForRectify { remark: Option<String> },
    /// Maker resubmits a corrected staged row.
    Resubmit,
}

impl UpdateTarget {
    pub fn relation(&self) -> Relation {
        match self {
            UpdateTarget::ApproveAuthoritative => Relation::Authoritative,
            UpdateTarget::ReturnForRectify { .. } | UpdateTarget::Resubmit => Relation::Staging,
        }
    }
}

/// Builds statements for one entity.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    entity: &'a Entity,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(entity: &'a Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &'a Entity {
        self.entity
    }

    /// Rows whose primary-key fields equal the ones present in `record`.
    pub fn select(&self, relation: Relation, record: &Record) -> Option<Statement> {
        let (predicate, params) = self.key_predicate(record, false)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.projection(relation),
            self.quoted_table(relation),
            predicate
        );
        Some(self.statement(relation, StatementKind::Select, sql, params))
    }

    /// Rows matching every declared field present in `filter`.
    ///
    /// Used to resolve a Bean's rows from its parent's key values, which
    /// need not be part of the Bean's own primary key.
    pub fn select_matching(&self, relation: Relation, filter: &Record) -> Option<Statement> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        for field in self.entity.fields() {
            if let Some(value) = filter.get(&field.name).filter(|v| !v.is_null()) {
                clauses.push(format!("{} = ?", quote_ident(&field.name)));
                params.push(bind_field(field, value).to_db_value());
            }
        }
        if clauses.is_empty() {
            return None;
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.projection(relation),
            self.quoted_table(relation),
            clauses.join(" AND ")
        );
        Some(self.statement(relation, StatementKind::Select, sql, params))
    }

    /// Every row of the relation, ordered by primary key.
    pub fn select_all(&self, relation: Relation) -> Statement {
        let order = self
            .entity
            .primary_fields()
            .map(|f| quote_ident(&f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            self.projection(relation),
            self.quoted_table(relation),
            order
        );
        self.statement(relation, StatementKind::Select, sql, Vec::new())
    }

    /// Stage a change: all fields, the maker stamp, REQUEST and
    /// STATUS=PENDING.
    ///
    /// ADD stamps the maker as ADDED_*. UPDATE and DELETE stamp UPDATED_*
    /// and keep any ADDED_* values the record carries over from the
    /// authoritative row.
    pub fn insert_staging(
        &self,
        record: &Record,
        kind: RequestKind,
        maker: &Stamp,
    ) -> Option<Statement> {
        if !self.entity.has_full_key(record) {
            return None;
        }
        let mut columns = self.field_columns(record);
        match kind {
            RequestKind::Add => push_stamp(&mut columns, ADDED_BY, ADDED_DATE_TIME, maker),
            RequestKind::Update | RequestKind::Delete => {
                push_carried(&mut columns, record, &[ADDED_BY, ADDED_DATE_TIME]);
                push_stamp(&mut columns, UPDATED_BY, UPDATED_DATE_TIME, maker);
            }
        }
        columns.push((REQUEST, Value::from(kind.as_str())));
        columns.push((STATUS, Value::from(RowStatus::Pending.as_str())));
        Some(self.insert(Relation::Staging, columns))
    }

    /// Create the authoritative row on ADD approval: all fields, the
    /// maker's ADDED_* carried from staging, and the approver stamp.
    pub fn insert_authoritative(&self, record: &Record, approver: &Stamp) -> Option<Statement> {
        if !self.entity.has_full_key(record) {
            return None;
        }
        let mut columns = self.field_columns(record);
        push_carried(&mut columns, record, &[ADDED_BY, ADDED_DATE_TIME]);
        push_stamp(&mut columns, APPROVE_BY, APPROVE_DATE_TIME, approver);
        Some(self.insert(Relation::Authoritative, columns))
    }

    /// Append a decision to history.
    ///
    /// Only non-null values are written. Columns are limited to the
    /// entity's fields and the history bookkeeping columns; REQUEST and
    /// STATUS always come from the arguments.
    pub fn insert_history(
        &self,
        record: &Record,
        kind: RequestKind,
        status: RowStatus,
    ) -> Option<Statement> {
        if !self.entity.has_full_key(record) {
            return None;
        }
        let mut columns: Vec<(&str, Value)> = self
            .entity
            .fields()
            .iter()
            .filter_map(|f| {
                record
                    .get(&f.name)
                    .filter(|v| !v.is_null())
                    .map(|v| (f.name.as_str(), bind_field(f, v)))
            })
            .collect();
        for column in Relation::History.bookkeeping_columns() {
            let value = match *column {
                REQUEST => Value::from(kind.as_str()),
                STATUS => Value::from(status.as_str()),
                other => match record.get(other) {
                    Some(v) if !v.is_null() => v.clone(),
                    _ => continue,
                },
            };
            columns.push((*column, value));
        }
        Some(self.insert(Relation::History, columns))
    }

    /// SET the non-key fields plus the target's bookkeeping columns, WHERE
    /// every primary-key field matches `record`.
    pub fn update(&self, target: &UpdateTarget, record: &Record, actor: &Stamp) -> Option<Statement> {
        let (predicate, key_params) = self.key_predicate(record, true)?;
        let relation = target.relation();

        let mut sets: Vec<(&str, Value)> = self
            .entity
            .non_primary_fields()
            .map(|f| {
                let value = record.get(&f.name).map(|v| bind_field(f, v)).unwrap_or(Value::Null);
                (f.name.as_str(), value)
            })
            .collect();

        match target {
            UpdateTarget::ApproveAuthoritative => {
                push_carried(&mut sets, record, &[UPDATED_BY, UPDATED_DATE_TIME]);
                push_stamp(&mut sets, APPROVE_BY, APPROVE_DATE_TIME, actor);
            }
            UpdateTarget::ReturnForRectify { remark } => {
                push_stamp(&mut sets, APPROVE_BY, APPROVE_DATE_TIME, actor);
                sets.push((STATUS, Value::from(RowStatus::Rectify.as_str())));
                sets.push((RECTIFY_REMARK, Value::from(remark.clone())));
            }
            UpdateTarget::Resubmit => {
                push_stamp(&mut sets, UPDATED_BY, UPDATED_DATE_TIME, actor);
                sets.push((STATUS, Value::from(RowStatus::Pending.as_str())));
                sets.push((RECTIFY_REMARK, Value::Null));
            }
        }

        let assignments = sets
            .iter()
            .map(|(column, _)| format!("{} = ?", quote_ident(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<DbValue> = sets.iter().map(|(_, v)| v.to_db_value()).collect();
        params.extend(key_params);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.quoted_table(relation),
            assignments,
            predicate
        );
        Some(self.statement(relation, StatementKind::Update, sql, params))
    }

    /// DELETE the row whose full primary key is in `record`.
    pub fn delete(&self, relation: Relation, record: &Record) -> Option<Statement> {
        let (predicate, params) = self.key_predicate(record, true)?;
        let sql = format!("DELETE FROM {} WHERE {}", self.quoted_table(relation), predicate);
        Some(self.statement(relation, StatementKind::Delete, sql, params))
    }

    /// `CREATE TABLE IF NOT EXISTS` for one relation.
    ///
    /// Staging and authoritative declare the entity's primary key; history
    /// is append-only and has none.
    pub fn create_table(&self, relation: Relation) -> String {
        let mut columns: Vec<String> = self
            .entity
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(&f.name), f.data_type.sql_type()))
            .collect();
        columns.extend(relation.bookkeeping_columns().iter().map(|c| {
            format!("{} {}", quote_ident(c), bookkeeping_type(c).sql_type())
        }));
        if relation != Relation::History {
            let key = self
                .entity
                .primary_fields()
                .map(|f| quote_ident(&f.name))
                .collect::<Vec<_>>()
                .join(", ");
            columns.push(format!("PRIMARY KEY ({})", key));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quoted_table(relation),
            columns.join(", ")
        )
    }

    fn insert(&self, relation: Relation, columns: Vec<(&str, Value)>) -> Statement {
        let names = columns
            .iter()
            .map(|(c, _)| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let params = columns.iter().map(|(_, v)| v.to_db_value()).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quoted_table(relation),
            names,
            placeholders
        );
        self.statement(relation, StatementKind::Insert, sql, params)
    }

    /// Every declared field in order, coerced; absent fields bind NULL.
    fn field_columns(&self, record: &Record) -> Vec<(&'a str, Value)> {
        self.entity
            .fields()
            .iter()
            .map(|f| {
                let value = record.get(&f.name).map(|v| bind_field(f, v)).unwrap_or(Value::Null);
                (f.name.as_str(), value)
            })
            .collect()
    }

    /// AND-conjunction over primary-key fields present in `record`.
    ///
    /// With `require_all`, every key field must be present. Returns `None`
    /// when the conjunction would be empty.
    fn key_predicate(&self, record: &Record, require_all: bool) -> Option<(String, Vec<DbValue>)> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        for field in self.entity.primary_fields() {
            match record.get(&field.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    clauses.push(format!("{} = ?", quote_ident(&field.name)));
                    params.push(bind_field(field, value).to_db_value());
                }
                None if require_all => return None,
                None => {}
            }
        }
        if clauses.is_empty() {
            return None;
        }
        Some((clauses.join(" AND "), params))
    }

    fn projection(&self, relation: Relation) -> String {
        self.entity
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .chain(relation.bookkeeping_columns().iter().copied())
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn quoted_table(&self, relation: Relation) -> String {
        quote_ident(&relation.table_name(self.entity.entity_name()))
    }

    fn statement(
        &self,
        relation: Relation,
        kind: StatementKind,
        sql: String,
        params: Vec<DbValue>,
    ) -> Statement {
        Statement {
            sql,
            params,
            table: relation.table_name(self.entity.entity_name()),
            relation,
            kind,
        }
    }
}

/// Coerce to the field's type. Values that do not coerce bind unchanged
/// and are left for the backend to refuse.
fn bind_field(field: &Field, value: &Value) -> Value {
    field.coerce(value).unwrap_or_else(|_| value.clone())
}

fn push_stamp<'c>(columns: &mut Vec<(&'c str, Value)>, by: &'c str, at: &'c str, stamp: &Stamp) {
    columns.push((by, Value::from(stamp.actor.as_str())));
    columns.push((at, Value::Timestamp(stamp.at.clone())));
}

fn push_carried<'c>(columns: &mut Vec<(&'c str, Value)>, record: &Record, names: &[&'c str]) {
    for name in names {
        if let Some(value) = record.get(name).filter(|v| !v.is_null()) {
            columns.push((*name, value.clone()));
        }
    }
}
