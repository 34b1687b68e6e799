//! Snapshots of runtime values captured from a learner program's frames.
//!
//! The execution engine owns the live objects; by the time a traceback reaches
//! this crate every local has been converted into a [`Value`]. Most values are
//! plain data, but [`Value::Dynamic`] keeps a handle to an object whose own
//! representation logic runs on demand and may misbehave.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::ReprError;

/// Hook for objects whose textual form is produced by learner code.
///
/// Implementations are allowed to fail or panic: [`SafeRepr`](crate::SafeRepr)
/// contains both.
pub trait ObjectRepr: fmt::Debug + Send + Sync {
    /// Name of the object's runtime type, e.g. `Point`.
    fn type_name(&self) -> &str;

    /// The object's own representation, as the learner program defines it.
    fn repr(&self) -> Result<String, ReprError>;
}

/// A runtime value captured from a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    /// An object the engine already rendered. `repr` is `None` when the
    /// object's representation raised.
    Opaque { type_name: String, repr: Option<String> },
    /// A live object rendered lazily through its [`ObjectRepr`] hook.
    #[serde(skip)]
    Dynamic(Arc<dyn ObjectRepr>),
}

impl Value {
    /// Wraps an [`ObjectRepr`] implementation.
    pub fn dynamic(object: impl ObjectRepr + 'static) -> Self {
        Self::Dynamic(Arc::new(object))
    }

    #[must_use]
    pub fn opaque(type_name: impl Into<String>, repr: Option<String>) -> Self {
        Self::Opaque {
            type_name: type_name.into(),
            repr,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}
