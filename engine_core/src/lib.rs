//! `engine_core`
//!
//! Simulation core shared by every host.
//!
//! Design goals:
//! - Deferred mutation: systems read the last committed state and queue
//!   writes, which land together at commit.
//! - Deterministic and modular where practical; systems run sequentially.
//! - Collision split into a uniform-grid broad phase and a shape narrow phase.
//! - No `unsafe`.

pub mod collision;
pub mod commands;
pub mod config;
pub mod ecs;
pub mod error;
pub mod geometry;
pub mod grouper;
pub mod math;
pub mod physics;
pub mod query;
pub mod resources;
pub mod schedule;
pub mod store;
pub mod world;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::commands::CommitStats;
    pub use crate::config::*;
    pub use crate::ecs::{BoxedComponent, Bundle, Component, ComponentType, Components, Entity};
    pub use crate::error::{EcsError, ErrorSink};
    pub use crate::geometry::*;
    pub use crate::math::*;
    pub use crate::physics::*;
    pub use crate::query::{ComponentSet, Query, QueryKey};
    pub use crate::resources::{Frame, TickDelta};
    pub use crate::schedule::{Context, System};
    pub use crate::world::{StepReport, World};
}
