//! Error taxonomy and the world's error sink.
//!
//! Registration mistakes are reported as [`EcsError`]. Failures raised while a
//! tick runs are `anyhow::Error`s and go to the [`ErrorSink`] instead of
//! unwinding out of [`crate::world::World::step`].

use std::fmt;

use tracing::error;

use crate::ecs::Entity;

/// Misuse of the world's registration or query API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Systems were added after the world spawned an entity or stepped.
    ScheduleFrozen,
    /// A system declared an empty query or one naming a type twice.
    MalformedQuery { system: String, key: String },
    /// A system asked for a query it never declared.
    UndeclaredQuery { system: String, key: String },
    /// No registered system declared this query.
    UnknownQuery { key: String },
    /// Entity is not indexed under the query's key.
    NotInQuery { entity: Entity, key: String },
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::ScheduleFrozen => {
                f.write_str("cannot add systems once the world has spawned or stepped")
            }
            EcsError::MalformedQuery { system, key } => {
                write!(f, "system `{system}` declares malformed query {key}")
            }
            EcsError::UndeclaredQuery { system, key } => {
                write!(f, "system `{system}` did not declare query {key}")
            }
            EcsError::UnknownQuery { key } => write!(f, "query {key} is not registered"),
            EcsError::NotInQuery { entity, key } => {
                write!(f, "entity {entity} does not match query {key}")
            }
        }
    }
}

impl std::error::Error for EcsError {}

/// Receiver for errors raised by systems and [`crate::world::World::catch`].
pub struct ErrorSink(Box<dyn FnMut(anyhow::Error) + Send>);

impl ErrorSink {
    pub fn new(f: impl FnMut(anyhow::Error) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn report(&mut self, err: anyhow::Error) {
        (self.0)(err)
    }
}

impl Default for ErrorSink {
    /// Logs through `tracing` at error level.
    fn default() -> Self {
        Self::new(|err| error!(error = ?err, "unhandled system error"))
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorSink")
    }
}
