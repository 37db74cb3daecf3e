//! Maker-checker lifecycle over staging, authoritative and history.
//!
//! # State machine
//!
//! ```text
//! submit ──► staging (PENDING) ──approve──► authoritative + history(APPROVE)
//!                 │    ▲       └─reject───► history(REJECT)
//!          rectify│    │rectify (maker)
//!        (checker)▼    │
//!             staging (RECTIFY)
//! ```
//!
//! Each write operation (submit, decide, rectify) runs in exactly one
//! transaction covering the parent row, every child row and the history
//! append. Any failed step rolls the whole set back.

use crate::actor::{Actor, Stamp};
use crate::decompose::{compose, decompose, prepare_child, route, Decomposed};
use crate::error::LifecycleError;
use crate::statement::{StatementBuilder, UpdateTarget};
use crate::status::{
    Action, DecisionStatus, RectifyStatus, RequestKind, RowStatus, SubmitStatus, ValidationErrors,
};
use crate::store::{StoreError, StoreTx, TransactionalStore};
use crate::validation::{SchemaValidator, ValidationService};
use tracing::{error, info, info_span, warn};
use vouch_db::BackendError;
use vouch_schema::relation::{
    ADDED_BY, ADDED_DATE_TIME, APPROVE_BY, APPROVE_DATE_TIME, REJECT_REMARK, REQUEST, STATUS,
};
use vouch_schema::{
    Entity, MetadataError, MetadataProvider, Record, Relation, Value, BEAN_TAG_KEY,
    CHILD_RECORDS_KEY,
};

/// Why a transaction closure stopped early.
enum Abort<S> {
    /// A lifecycle precondition failed; the status goes back to the caller.
    Outcome(S),
    Store(StoreError),
}

impl<S> From<BackendError> for Abort<S> {
    fn from(err: BackendError) -> Self {
        Abort::Store(StoreError::Backend(err))
    }
}

impl<S> From<StoreError> for Abort<S> {
    fn from(err: StoreError) -> Self {
        Abort::Store(err)
    }
}

/// Top-level read, submit, decide and rectify operations.
pub struct LifecycleOrchestrator<M, V = SchemaValidator> {
    metadata: M,
    validator: V,
    store: TransactionalStore,
}

impl<M: MetadataProvider> LifecycleOrchestrator<M, SchemaValidator> {
    pub fn new(metadata: M, store: TransactionalStore) -> Self {
        Self::with_validator(metadata, SchemaValidator, store)
    }
}

impl<M: MetadataProvider, V: ValidationService> LifecycleOrchestrator<M, V> {
    pub fn with_validator(metadata: M, validator: V, store: TransactionalStore) -> Self {
        Self {
            metadata,
            validator,
            store,
        }
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn store(&self) -> &TransactionalStore {
        &self.store
    }

    /// Resolve a Module. Beans are only reachable through their owner.
    fn module(&self, entity_name: &str) -> Result<Entity, LifecycleError> {
        let entity = self.metadata.schema(entity_name)?;
        if entity.is_sub_bean() {
            warn!("{} is a bean and cannot be used on its own", entity_name);
            return Err(MetadataError::NotAModule(entity_name.to_string()).into());
        }
        Ok(entity)
    }

    /// Create the relations backing `entity_name` and its beans.
    pub fn ensure_relations(&self, entity_name: &str) -> Result<(), LifecycleError> {
        let entity = self.module(entity_name)?;
        self.store.ensure_relations(&entity)?;
        Ok(())
    }

    /// Authoritative rows whose primary-key field `field_name` equals
    /// `value`, each with its children attached under the Bean's name.
    pub fn fetch_by_key(
        &self,
        field_name: &str,
        value: impl Into<Value>,
        entity_name: &str,
    ) -> Result<Vec<Record>, LifecycleError> {
        let entity = self.module(entity_name)?;
        let _span = info_span!("lifecycle.fetch_by_key", entity = entity_name, field = field_name)
            .entered();

        if !entity.is_primary_field(field_name) {
            warn!("{} is not a primary-key field of {}", field_name, entity_name);
            return Err(LifecycleError::NotPrimaryKeyField {
                entity: entity_name.to_string(),
                field: field_name.to_string(),
            });
        }

        let filter = Record::new().with(field_name, value);
        let rows = self
            .store
            .read(StatementBuilder::new(&entity).select(Relation::Authoritative, &filter))?;
        if rows.is_empty() {
            return Err(LifecycleError::DataNotAvailable(entity_name.to_string()));
        }
        rows.into_iter()
            .map(|row| self.attach_children(&entity, row))
            .collect()
    }

    /// Every authoritative row, children attached.
    pub fn fetch_all(&self, entity_name: &str) -> Result<Vec<Record>, LifecycleError> {
        let entity = self.module(entity_name)?;
        let _span = info_span!("lifecycle.fetch_all", entity = entity_name).entered();

        let rows = self.store.read(Some(
            StatementBuilder::new(&entity).select_all(Relation::Authoritative),
        ))?;
        if rows.is_empty() {
            return Err(LifecycleError::DataNotAvailable(entity_name.to_string()));
        }
        rows.into_iter()
            .map(|row| self.attach_children(&entity, row))
            .collect()
    }

    /// Stage a change for approval.
    ///
    /// Validation runs first and nothing is written if it reports errors.
    /// The parent, then each child in order, must have no staged row and
    /// must be absent from (ADD) or present in (UPDATE, DELETE) the
    /// authoritative relation. The first failed check rolls back every
    /// staging row written so far.
    pub fn submit(
        &self,
        record: &Record,
        entity_name: &str,
        kind: RequestKind,
        actor: &Actor,
    ) -> Result<SubmitStatus, LifecycleError> {
        let entity = self.module(entity_name)?;
        let _span =
            info_span!("lifecycle.submit", entity = entity_name, request = %kind).entered();

        let errors = self.validator.validate(&entity, record);
        if !errors.is_empty() {
            warn!(errors = errors.len(), "Submission failed validation");
            return Ok(SubmitStatus::ValidationFailed(errors));
        }
        let rows = match submission_rows(&entity, record) {
            Ok(rows) => rows,
            Err(errors) => {
                warn!(errors = errors.len(), "Submission failed validation");
                return Ok(SubmitStatus::ValidationFailed(errors));
            }
        };

        let maker = Stamp::now(actor);
        let result = self.store.transaction(|tx| -> Result<usize, Abort<SubmitStatus>> {
            for (target, row) in &rows {
                let builder = StatementBuilder::new(target);
                let mut staged = row.clone();
                if let Some(current) = check_submission(tx, &builder, row, kind)? {
                    staged.fill_missing_from(&current, [ADDED_BY, ADDED_DATE_TIME]);
                }
                tx.apply(builder.insert_staging(&staged, kind, &maker))?;
            }
            Ok(rows.len())
        });

        Ok(match result {
            Ok(staged) => {
                info!(rows = staged, "Submission staged for approval");
                SubmitStatus::Success(kind)
            }
            Err(Abort::Outcome(status)) => {
                warn!(status = status.code(), "Submission rejected");
                status
            }
            Err(Abort::Store(err)) => {
                error!("Submission rolled back: {}", err);
                SubmitStatus::PersistenceFailed
            }
        })
    }

    /// Apply a checker's decision to every staged row under `key`.
    ///
    /// `key` must carry at least one primary-key field of the entity. The
    /// parent's staged rows and each Bean's staged rows matching the key
    /// are decided together; each row branches on its own REQUEST.
    pub fn decide(
        &self,
        entity_name: &str,
        action: Action,
        key: &Record,
        remarks: Option<&str>,
        actor: &Actor,
    ) -> Result<DecisionStatus, LifecycleError> {
        let entity = self.module(entity_name)?;
        let _span =
            info_span!("lifecycle.decide", entity = entity_name, action = %action).entered();

        let key = entity.key_of(key);
        if key.is_empty() {
            let field = key_names(&entity);
            warn!("Decision request carries no primary-key field ({})", field);
            return Err(LifecycleError::NotPrimaryKeyField {
                entity: entity_name.to_string(),
                field,
            });
        }

        let checker = Stamp::now(actor);
        let result = self.store.transaction(|tx| -> Result<usize, Abort<DecisionStatus>> {
            let mut pending: Vec<(&Entity, Record)> = tx
                .read(StatementBuilder::new(&entity).select(Relation::Staging, &key))?
                .into_iter()
                .map(|row| (&entity, row))
                .collect();
            for bean in entity.beans() {
                let filter = parent_key_filter(&entity, bean, &key);
                let rows = tx.read(
                    StatementBuilder::new(bean).select_matching(Relation::Staging, &filter),
                )?;
                pending.extend(rows.into_iter().map(|row| (bean, row)));
            }

            if pending.is_empty() {
                return Err(Abort::Outcome(DecisionStatus::NoRequestPending));
            }
            for (target, row) in &pending {
                apply_decision(tx, target, row, action, remarks, &checker)?;
            }
            Ok(pending.len())
        });

        Ok(match result {
            Ok(decided) => {
                info!(rows = decided, "Decision applied");
                DecisionStatus::ActionSuccessful(action)
            }
            Err(Abort::Outcome(status)) => {
                warn!(status = status.code(), "Nothing to decide");
                status
            }
            Err(Abort::Store(err)) => {
                error!("Decision rolled back: {}", err);
                DecisionStatus::ActionFailed(action)
            }
        })
    }

    /// Maker-side correction of a row the checker returned for
    /// rectification.
    ///
    /// Submitted values overlay the staged ones; staged children are
    /// matched by primary key. The merged composite is validated, then
    /// every staged row of the parent goes back to PENDING.
    pub fn rectify(
        &self,
        record: &Record,
        entity_name: &str,
        actor: &Actor,
    ) -> Result<RectifyStatus, LifecycleError> {
        let entity = self.module(entity_name)?;
        let _span = info_span!("lifecycle.rectify", entity = entity_name).entered();

        let Decomposed { parent, children } = decompose(record);
        let parent = match entity.coerce_record(&parent) {
            Ok(coerced) => coerced,
            Err(_) => parent,
        };
        let key = entity.key_of(&parent);

        let maker = Stamp::now(actor);
        let result = self.store.transaction(|tx| -> Result<usize, Abort<RectifyStatus>> {
            let builder = StatementBuilder::new(&entity);
            let Some(mut merged) = tx
                .read(builder.select(Relation::Staging, &key))?
                .into_iter()
                .next()
            else {
                return Err(Abort::Outcome(RectifyStatus::NoRequestPending));
            };
            if merged.text(STATUS) != Some(RowStatus::Rectify.as_str()) {
                return Err(Abort::Outcome(RectifyStatus::NoRequestPending));
            }
            merged.overlay(&entity.project(&parent));

            let mut staged_children: Vec<(&Entity, Record)> = Vec::new();
            for bean in entity.beans() {
                let filter = parent_key_filter(&entity, bean, &merged);
                let rows = tx.read(
                    StatementBuilder::new(bean).select_matching(Relation::Staging, &filter),
                )?;
                staged_children.extend(rows.into_iter().map(|row| (bean, row)));
            }

            for (index, child) in children.iter().enumerate() {
                let bean = route(&entity, child).map_err(|err| {
                    let mut errors = ValidationErrors::new();
                    errors.insert(format!("{}[{}]", CHILD_RECORDS_KEY, index), err.to_string());
                    Abort::Outcome(RectifyStatus::ValidationFailed(errors))
                })?;
                let prepared = prepare_child(&entity, bean, &merged, child);
                let prepared = match bean.coerce_record(&prepared) {
                    Ok(coerced) => coerced,
                    Err(_) => prepared,
                };
                if !bean.has_full_key(&prepared) {
                    return Err(Abort::Outcome(RectifyStatus::RectificationFailed));
                }
                let child_key = bean.key_of(&prepared);
                let slot = staged_children.iter_mut().find(|(owner, row)| {
                    owner.entity_name() == bean.entity_name() && bean.key_of(row) == child_key
                });
                match slot {
                    Some((_, row)) => row.overlay(&bean.project(&prepared)),
                    None => {
                        warn!(bean = bean.entity_name(), "Rectified child has no staged row");
                        return Err(Abort::Outcome(RectifyStatus::RectificationFailed));
                    }
                }
            }

            let composite = recompose(&entity, &merged, &staged_children);
            let errors = self.validator.validate(&entity, &composite);
            if !errors.is_empty() {
                return Err(Abort::Outcome(RectifyStatus::ValidationFailed(errors)));
            }

            tx.apply(builder.update(&UpdateTarget::Resubmit, &merged, &maker))?;
            for (bean, row) in &staged_children {
                tx.apply(StatementBuilder::new(bean).update(&UpdateTarget::Resubmit, row, &maker))?;
            }
            Ok(1 + staged_children.len())
        });

        Ok(match result {
            Ok(rows) => {
                info!(rows, "Rectification resubmitted for approval");
                RectifyStatus::RectificationSuccessful
            }
            Err(Abort::Outcome(status)) => {
                warn!(status = status.code(), "Rectification rejected");
                status
            }
            Err(Abort::Store(err)) => {
                error!("Rectification rolled back: {}", err);
                RectifyStatus::RectificationFailed
            }
        })
    }

    fn attach_children(&self, entity: &Entity, row: Record) -> Result<Record, LifecycleError> {
        if !entity.has_beans() {
            return Ok(row);
        }
        let mut children = Vec::with_capacity(entity.beans().len());
        for bean in entity.beans() {
            let filter = parent_key_filter(entity, bean, &row);
            let rows = self.store.read(
                StatementBuilder::new(bean).select_matching(Relation::Authoritative, &filter),
            )?;
            children.push((bean.entity_name().to_string(), rows));
        }
        Ok(compose(row, children))
    }
}

/// The rows a submission stages, parent first: declared fields only,
/// coerced, children routed to their Bean with parent keys inherited.
fn submission_rows<'e>(
    entity: &'e Entity,
    record: &Record,
) -> Result<Vec<(&'e Entity, Record)>, ValidationErrors> {
    let Decomposed { parent, children } = decompose(record);
    let parent = entity
        .coerce_record(&parent)
        .map_err(|err| single_error(err.field.clone(), err.to_string()))?;

    let mut rows = Vec::with_capacity(1 + children.len());
    rows.push((entity, entity.project(&parent)));
    for (index, child) in children.iter().enumerate() {
        let prefix = format!("{}[{}]", CHILD_RECORDS_KEY, index);
        let bean = route(entity, child).map_err(|err| single_error(prefix.clone(), err.to_string()))?;
        let prepared = prepare_child(entity, bean, &parent, child);
        let coerced = bean
            .coerce_record(&prepared)
            .map_err(|err| single_error(format!("{}.{}", prefix, err.field), err.to_string()))?;
        rows.push((bean, bean.project(&coerced)));
    }
    Ok(rows)
}

/// The existence checks for one row. Returns the current authoritative
/// row, if any.
fn check_submission(
    tx: &mut StoreTx<'_, '_>,
    builder: &StatementBuilder<'_>,
    row: &Record,
    kind: RequestKind,
) -> Result<Option<Record>, Abort<SubmitStatus>> {
    if tx.exists(builder.select(Relation::Staging, row))? {
        return Err(Abort::Outcome(SubmitStatus::ApprovalPending));
    }
    let current = tx
        .read(builder.select(Relation::Authoritative, row))?
        .into_iter()
        .next();
    match (kind, current) {
        (RequestKind::Add, Some(_)) => Err(Abort::Outcome(SubmitStatus::DataAlreadyPresent)),
        (RequestKind::Update | RequestKind::Delete, None) => {
            Err(Abort::Outcome(SubmitStatus::DataNotPresent))
        }
        (_, current) => Ok(current),
    }
}

fn apply_decision(
    tx: &mut StoreTx<'_, '_>,
    entity: &Entity,
    row: &Record,
    action: Action,
    remarks: Option<&str>,
    checker: &Stamp,
) -> Result<(), StoreError> {
    let builder = StatementBuilder::new(entity);
    let kind = staged_request(entity, row)?;

    match action {
        Action::Approve => {
            match kind {
                RequestKind::Add => tx.apply(builder.insert_authoritative(row, checker))?,
                RequestKind::Update => {
                    tx.apply(builder.update(&UpdateTarget::ApproveAuthoritative, row, checker))?
                }
                RequestKind::Delete => tx.apply(builder.delete(Relation::Authoritative, row))?,
            };
            tx.apply(builder.delete(Relation::Staging, row))?;
            let history = decided(row, checker);
            tx.apply(builder.insert_history(&history, kind, RowStatus::Approve))?;
        }
        Action::Reject => {
            tx.apply(builder.delete(Relation::Staging, row))?;
            let history = decided(row, checker).with(REJECT_REMARK, remarks.map(str::to_string));
            tx.apply(builder.insert_history(&history, kind, RowStatus::Reject))?;
        }
        Action::Rectify => {
            let target = UpdateTarget::ReturnForRectify {
                remark: remarks.map(str::to_string),
            };
            tx.apply(builder.update(&target, row, checker))?;
        }
    }
    Ok(())
}

fn staged_request(entity: &Entity, row: &Record) -> Result<RequestKind, StoreError> {
    row.text(REQUEST)
        .ok_or_else(|| "missing REQUEST".to_string())
        .and_then(str::parse)
        .map_err(|reason| StoreError::MalformedRow {
            table: Relation::Staging.table_name(entity.entity_name()),
            reason,
        })
}

/// A staged row stamped with the checker who decided it.
fn decided(row: &Record, checker: &Stamp) -> Record {
    row.clone()
        .with(APPROVE_BY, checker.actor.as_str())
        .with(APPROVE_DATE_TIME, checker.at.clone())
}

/// The parent's primary-key values for the fields `bean` also declares.
fn parent_key_filter(module: &Entity, bean: &Entity, parent: &Record) -> Record {
    module
        .key_of(parent)
        .into_iter()
        .filter(|(name, _)| bean.field(name).is_some())
        .collect()
}

/// Rebuild a composite from merged staged rows so it can be validated like
/// a submission.
fn recompose(entity: &Entity, parent: &Record, children: &[(&Entity, Record)]) -> Record {
    if !entity.has_beans() {
        return parent.clone();
    }
    let tagged = entity.beans().len() > 1;
    let children = children
        .iter()
        .map(|(bean, row)| {
            if tagged {
                row.clone().with(BEAN_TAG_KEY, bean.entity_name())
            } else {
                row.clone()
            }
        })
        .collect::<Vec<_>>();
    parent.clone().with(CHILD_RECORDS_KEY, children)
}

fn key_names(entity: &Entity) -> String {
    entity.primary_field_names().join(", ")
}

fn single_error(field: String, message: String) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.insert(field, message);
    errors
}
