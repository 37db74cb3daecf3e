mod common;

use common::*;
use vouch_core::{
    Action, DecisionStatus, LifecycleError, LifecycleOrchestrator, RectifyStatus, RequestKind,
    SubmitStatus, TransactionalStore,
};
use vouch_schema::{Entity, MetadataError, MetadataProvider, Record, Value};

fn staged_person(o: &Orchestrator, id: i64) -> (usize, usize) {
    (
        rows(o, "PERSON_TEMP", "EMP_ID", id).len(),
        rows(o, "ADDRESS_TEMP", "EMP_ID", id).len(),
    )
}

fn approve_person(o: &Orchestrator, record: &Record, id: i64) {
    assert!(o
        .submit(record, "PERSON", RequestKind::Add, &maker())
        .unwrap()
        .is_success());
    assert!(o
        .decide("PERSON", Action::Approve, &emp_key(id), None, &checker())
        .unwrap()
        .is_success());
}

#[test]
fn submit_stages_parent_and_children_with_inherited_keys() {
    let o = orchestrator();
    let status = o
        .submit(&person(7, &[(1, "Pune"), (2, "Oslo")]), "PERSON", RequestKind::Add, &maker())
        .unwrap();
    assert_eq!(status, SubmitStatus::Success(RequestKind::Add));

    assert_eq!(staged_person(&o, 7), (1, 2));
    for child in rows(&o, "ADDRESS_TEMP", "EMP_ID", 7) {
        assert_eq!(child.text("REQUEST"), Some("ADD"));
        assert_eq!(child.text("STATUS"), Some("PENDING"));
        assert_eq!(child.text("ADDED_BY"), Some("maker"));
    }
}

#[test]
fn a_failing_child_check_rejects_the_whole_submission() {
    let o = orchestrator();
    approve_person(&o, &person(7, &[(1, "Pune")]), 7);

    // ADDR_ID 2 has no authoritative row, so UPDATE cannot apply to it.
    let status = o
        .submit(&person(7, &[(1, "Pune"), (2, "Oslo")]), "PERSON", RequestKind::Update, &maker())
        .unwrap();
    assert_eq!(status, SubmitStatus::DataNotPresent);
    assert_eq!(staged_person(&o, 7), (0, 0));
}

#[test]
fn a_child_that_already_exists_blocks_an_add() {
    let o = orchestrator();
    approve_person(&o, &person(7, &[(1, "Pune")]), 7);

    // Different parent, same child key.
    let status = o
        .submit(&person(8, &[(1, "Pune")]), "PERSON", RequestKind::Add, &maker())
        .unwrap();
    assert_eq!(status, SubmitStatus::DataAlreadyPresent);
    assert_eq!(staged_person(&o, 8), (0, 0));
    assert_eq!(count(&o, "PERSON_TEMP"), 0);
}

#[test]
fn a_failing_child_insert_rolls_back_the_parent() {
    let o = orchestrator();
    exec(
        &o,
        r#"DROP TABLE "ADDRESS_TEMP";
           CREATE TABLE "ADDRESS_TEMP" (
               "ADDR_ID" BIGINT, "EMP_ID" BIGINT, "CITY" VARCHAR,
               "ADDED_BY" VARCHAR, "ADDED_DATE_TIME" TIMESTAMP,
               "UPDATED_BY" VARCHAR, "UPDATED_DATE_TIME" TIMESTAMP,
               "APPROVE_BY" VARCHAR, "APPROVE_DATE_TIME" TIMESTAMP,
               "REQUEST" VARCHAR, "STATUS" VARCHAR, "RECTIFY_REMARK" VARCHAR,
               "AUDIT_REF" VARCHAR NOT NULL,
               PRIMARY KEY ("ADDR_ID"))"#,
    );

    let status = o
        .submit(&person(7, &[(1, "Pune")]), "PERSON", RequestKind::Add, &maker())
        .unwrap();
    assert_eq!(status, SubmitStatus::PersistenceFailed);
    assert_eq!(count(&o, "PERSON_TEMP"), 0);
    assert_eq!(count(&o, "ADDRESS_TEMP"), 0);
}

#[test]
fn approve_moves_parent_and_children_together() {
    let o = orchestrator();
    approve_person(&o, &person(7, &[(1, "Pune"), (2, "Oslo")]), 7);

    assert_eq!(staged_person(&o, 7), (0, 0));
    assert_eq!(rows(&o, "PERSON_MASTER", "EMP_ID", 7).len(), 1);
    assert_eq!(rows(&o, "ADDRESS_MASTER", "EMP_ID", 7).len(), 2);
    assert_eq!(rows(&o, "PERSON_HIST", "EMP_ID", 7).len(), 1);
    assert_eq!(rows(&o, "ADDRESS_HIST", "EMP_ID", 7).len(), 2);

    let found = o.fetch_by_key("EMP_ID", 7_i64, "PERSON").unwrap();
    assert_eq!(found.len(), 1);
    let addresses = found[0].get("ADDRESS").and_then(Value::as_records).unwrap();
    let mut cities: Vec<_> = addresses.iter().filter_map(|a| a.text("CITY")).collect();
    cities.sort();
    assert_eq!(cities, vec!["Oslo", "Pune"]);
}

#[test]
fn a_failing_child_history_append_rolls_back_the_decision() {
    let o = orchestrator();
    o.submit(&person(7, &[(1, "Pune")]), "PERSON", RequestKind::Add, &maker())
        .unwrap();
    exec(&o, r#"DROP TABLE "ADDRESS_HIST""#);

    let status = o
        .decide("PERSON", Action::Approve, &emp_key(7), None, &checker())
        .unwrap();
    assert_eq!(status, DecisionStatus::ActionFailed(Action::Approve));

    assert_eq!(staged_person(&o, 7), (1, 1));
    assert_eq!(count(&o, "PERSON_MASTER"), 0);
    assert_eq!(count(&o, "ADDRESS_MASTER"), 0);
    assert_eq!(count(&o, "PERSON_HIST"), 0);
}

#[test]
fn reject_and_rectify_apply_to_children() {
    let o = orchestrator();
    o.submit(&person(7, &[(1, "Pune")]), "PERSON", RequestKind::Add, &maker())
        .unwrap();

    o.decide("PERSON", Action::Rectify, &emp_key(7), Some("check city"), &checker())
        .unwrap();
    let children = rows(&o, "ADDRESS_TEMP", "EMP_ID", 7);
    assert_eq!(children[0].text("STATUS"), Some("RECTIFY"));
    assert_eq!(children[0].text("RECTIFY_REMARK"), Some("check city"));

    o.decide("PERSON", Action::Reject, &emp_key(7), Some("duplicate"), &checker())
        .unwrap();
    assert_eq!(staged_person(&o, 7), (0, 0));
    let history = rows(&o, "ADDRESS_HIST", "EMP_ID", 7);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text("STATUS"), Some("REJECT"));
    assert_eq!(history[0].text("REJECT_REMARK"), Some("duplicate"));
}

#[test]
fn maker_rectify_merges_children_by_key() {
    let o = orchestrator();
    o.submit(&person(7, &[(1, "Pune"), (2, "Oslo")]), "PERSON", RequestKind::Add, &maker())
        .unwrap();
    o.decide("PERSON", Action::Rectify, &emp_key(7), Some("fix city"), &checker())
        .unwrap();

    let correction = emp_key(7).with(
        "beans",
        vec![Record::new().with("ADDR_ID", 2_i64).with("CITY", "Bergen")],
    );
    let status = o.rectify(&correction, "PERSON", &maker()).unwrap();
    assert_eq!(status, RectifyStatus::RectificationSuccessful);

    let children = rows(&o, "ADDRESS_TEMP", "EMP_ID", 7);
    assert_eq!(children.len(), 2);
    for child in &children {
        assert_eq!(child.text("STATUS"), Some("PENDING"));
        let expected = if child.get("ADDR_ID") == Some(&Value::Integer(2)) {
            "Bergen"
        } else {
            "Pune"
        };
        assert_eq!(child.text("CITY"), Some(expected));
    }
    assert_eq!(rows(&o, "PERSON_TEMP", "EMP_ID", 7)[0].text("NAME"), Some("Ada"));
}

#[test]
fn maker_rectify_fails_for_an_unknown_child() {
    let o = orchestrator();
    o.submit(&person(7, &[(1, "Pune")]), "PERSON", RequestKind::Add, &maker())
        .unwrap();
    o.decide("PERSON", Action::Rectify, &emp_key(7), None, &checker())
        .unwrap();

    let correction = person(7, &[(1, "Pune"), (3, "Rome")]);
    let status = o.rectify(&correction, "PERSON", &maker()).unwrap();
    assert_eq!(status, RectifyStatus::RectificationFailed);

    let children = rows(&o, "ADDRESS_TEMP", "EMP_ID", 7);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].text("STATUS"), Some("RECTIFY"));
}

#[test]
fn fetch_all_attaches_an_empty_child_list_when_there_are_none() {
    let o = orchestrator();
    approve_person(&o, &person(7, &[]), 7);

    let all = o.fetch_all("PERSON").unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].get("ADDRESS").and_then(Value::as_records).map(<[_]>::len), Some(0));
}

fn is_not_a_module(err: &LifecycleError) -> bool {
    matches!(err, LifecycleError::Metadata(MetadataError::NotAModule(name)) if name == "ADDRESS")
}

#[test]
fn a_bean_cannot_be_decided_apart_from_its_module() {
    let o = orchestrator();
    o.submit(&person(7, &[(1, "Pune")]), "PERSON", RequestKind::Add, &maker())
        .unwrap();

    let key = Record::new().with("ADDR_ID", 1_i64);
    let err = o
        .decide("ADDRESS", Action::Approve, &key, None, &checker())
        .unwrap_err();
    assert!(is_not_a_module(&err));

    assert_eq!(staged_person(&o, 7), (1, 1));
    assert_eq!(count(&o, "ADDRESS_MASTER"), 0);
    assert_eq!(count(&o, "ADDRESS_HIST"), 0);
}

#[test]
fn a_bean_cannot_be_submitted_or_read_on_its_own() {
    let o = orchestrator();
    let orphan = Record::new()
        .with("ADDR_ID", 1_i64)
        .with("EMP_ID", 7_i64)
        .with("CITY", "Pune");

    let err = o
        .submit(&orphan, "ADDRESS", RequestKind::Add, &maker())
        .unwrap_err();
    assert!(is_not_a_module(&err));
    assert_eq!(count(&o, "ADDRESS_TEMP"), 0);

    assert!(is_not_a_module(&o.rectify(&orphan, "ADDRESS", &maker()).unwrap_err()));
    assert!(is_not_a_module(&o.fetch_all("ADDRESS").unwrap_err()));
    assert!(is_not_a_module(
        &o.fetch_by_key("ADDR_ID", 1_i64, "ADDRESS").unwrap_err()
    ));
}

/// Resolves every name, Beans included.
struct FlatMetadata;

impl MetadataProvider for FlatMetadata {
    fn schema(&self, _entity_name: &str) -> Result<Entity, MetadataError> {
        let person = employee_with_address();
        Ok(person.beans()[0].clone())
    }
}

#[test]
fn beans_from_any_provider_are_refused() {
    let store = TransactionalStore::open("duckdb::memory:").unwrap();
    let o = LifecycleOrchestrator::new(FlatMetadata, store);
    let key = Record::new().with("ADDR_ID", 1_i64);

    let err = o
        .decide("ADDRESS", Action::Approve, &key, None, &checker())
        .unwrap_err();
    assert!(is_not_a_module(&err));
}
