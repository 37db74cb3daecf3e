//! Splitting composite records into parent and children, and putting read
//! results back together.

use thiserror::Error;
use vouch_schema::{Entity, Record, Value, BEAN_TAG_KEY, CHILD_RECORDS_KEY};

/// A composite record split at the reserved child key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decomposed {
    pub parent: Record,
    pub children: Vec<Record>,
}

/// Remove the child list from `record`.
///
/// Anything under the child key that is not a list of records is dropped;
/// validation reports it before any decomposition happens.
pub fn decompose(record: &Record) -> Decomposed {
    let mut parent = record.clone();
    let children = match parent.remove(CHILD_RECORDS_KEY) {
        Some(Value::Records(children)) => children,
        _ => Vec::new(),
    };
    Decomposed { parent, children }
}

/// Attach resolved children to a parent row under each Bean's entity name.
pub fn compose(mut parent: Record, children: Vec<(String, Vec<Record>)>) -> Record {
    for (bean_name, rows) in children {
        parent.insert(bean_name, Value::Records(rows));
    }
    parent
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("{0} owns no beans")]
    NoBeans(String),

    #[error("child record must name its bean under '{}'", BEAN_TAG_KEY)]
    Untagged,

    #[error("unknown bean '{0}'")]
    UnknownBean(String),
}

/// Which of `module`'s beans a child record belongs to.
///
/// A Module with one Bean takes every child. With several, the child must
/// carry the Bean's entity name under the tag key.
pub fn route<'e>(module: &'e Entity, child: &Record) -> Result<&'e Entity, RouteError> {
    match module.beans() {
        [] => Err(RouteError::NoBeans(module.entity_name().to_string())),
        [only] if !child.has_value(BEAN_TAG_KEY) => Ok(only),
        _ => {
            let tag = child.text(BEAN_TAG_KEY).ok_or(RouteError::Untagged)?;
            module
                .bean_named(tag)
                .ok_or_else(|| RouteError::UnknownBean(tag.to_string()))
        }
    }
}

/// A child record ready to persist: tag removed, and any primary-key value
/// of the parent that the Bean also declares filled in when absent.
pub fn prepare_child(module: &Entity, bean: &Entity, parent: &Record, child: &Record) -> Record {
    let mut prepared = child.clone();
    prepared.remove(BEAN_TAG_KEY);
    let inherited = module
        .primary_field_names()
        .into_iter()
        .filter(|name| bean.field(name).is_some());
    prepared.fill_missing_from(parent, inherited);
    prepared
}
