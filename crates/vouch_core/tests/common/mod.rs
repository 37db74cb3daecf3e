#![allow(dead_code)]

use vouch_core::{Actor, LifecycleOrchestrator, TransactionalStore};
use vouch_db::DbValue;
use vouch_schema::{Catalog, DataType, Entity, Field, Record};

pub type Orchestrator = LifecycleOrchestrator<Catalog>;

pub fn employee() -> Entity {
    Entity::module(
        "EMPLOYEE",
        vec![
            Field::primary("EMP_ID").with_type(DataType::Integer),
            Field::new("NAME").required().with_max_length(40),
            Field::new("DEPT"),
            Field::new("SALARY").with_type(DataType::Real),
        ],
    )
}

/// EMPLOYEE owning ADDRESS rows joined on EMP_ID.
pub fn employee_with_address() -> Entity {
    Entity::module(
        "PERSON",
        vec![
            Field::primary("EMP_ID").with_type(DataType::Integer),
            Field::new("NAME").required(),
        ],
    )
    .with_bean(Entity::bean(
        "ADDRESS",
        vec![
            Field::primary("ADDR_ID").with_type(DataType::Integer),
            Field::new("EMP_ID").with_type(DataType::Integer),
            Field::new("CITY").required(),
        ],
    ))
}

pub fn orchestrator() -> Orchestrator {
    let catalog = Catalog::new()
        .with_entity(employee())
        .and_then(|c| c.with_entity(employee_with_address()))
        .expect("valid catalog");
    let store = TransactionalStore::open("duckdb::memory:").expect("in-memory duckdb");
    let orchestrator = LifecycleOrchestrator::new(catalog, store);
    orchestrator.ensure_relations("EMPLOYEE").unwrap();
    orchestrator.ensure_relations("PERSON").unwrap();
    orchestrator
}

pub fn maker() -> Actor {
    Actor::new("maker")
}

pub fn checker() -> Actor {
    Actor::new("checker")
}

pub fn emp(id: i64, name: &str) -> Record {
    Record::new()
        .with("EMP_ID", id)
        .with("NAME", name)
        .with("DEPT", "R&D")
}

pub fn emp_key(id: i64) -> Record {
    Record::new().with("EMP_ID", id)
}

pub fn person(id: i64, addresses: &[(i64, &str)]) -> Record {
    let children: Vec<Record> = addresses
        .iter()
        .map(|(addr_id, city)| Record::new().with("ADDR_ID", *addr_id).with("CITY", *city))
        .collect();
    Record::new()
        .with("EMP_ID", id)
        .with("NAME", "Ada")
        .with("beans", children)
}

/// Every row of `table` whose `column` equals `value`.
pub fn rows(orchestrator: &Orchestrator, table: &str, column: &str, value: i64) -> Vec<Record> {
    let sql = format!("SELECT * FROM \"{}\" WHERE \"{}\" = ?", table, column);
    orchestrator
        .store()
        .connection()
        .query_all(&sql, &[DbValue::Integer(value)])
        .unwrap()
        .into_iter()
        .map(Record::from_db_row)
        .collect()
}

pub fn count(orchestrator: &Orchestrator, table: &str) -> i64 {
    orchestrator
        .store()
        .connection()
        .query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table), &[])
        .unwrap()
}

pub fn exec(orchestrator: &Orchestrator, sql: &str) {
    orchestrator
        .store()
        .connection()
        .execute_batch(sql)
        .unwrap();
}
