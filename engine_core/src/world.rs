//! The world: store, command buffer, resources and schedule in one owner.
//!
//! Lifecycle:
//! - Building: systems may be added; each declared query is validated and
//!   registered immediately.
//! - Running: entered on the first spawn or step. Adding systems now fails
//!   with [`EcsError::ScheduleFrozen`].
//!
//! A host typically queues external events, calls [`World::commit`] so they
//! become visible, then calls [`World::step`].

use std::{
    any::{type_name, Any},
    fmt, mem,
};

use tracing::trace;

use crate::{
    commands::{CommandBuffer, CommitStats},
    ecs::{Bundle, Component, Components, Entity},
    error::{EcsError, ErrorSink},
    query::{ComponentSet, Query, QueryKey},
    resources::Resources,
    schedule::{Schedule, ScheduledSystem, System},
    store::Store,
};

enum Phase {
    Building(Vec<ScheduledSystem>),
    Running(Schedule),
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Building(Vec::new())
    }
}

/// Outcome of one [`World::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Systems whose handler returned an error this tick.
    pub failed_systems: usize,
    pub commit: CommitStats,
}

#[derive(Default)]
pub struct World {
    store: Store,
    commands: CommandBuffer,
    resources: Resources,
    sink: ErrorSink,
    phase: Phase,
}

impl World {
    /// Creates a world whose errors are logged through `tracing`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_sink(sink: impl FnMut(anyhow::Error) + Send + 'static) -> Self {
        Self {
            sink: ErrorSink::new(sink),
            ..Self::default()
        }
    }

    pub fn set_error_sink(&mut self, sink: impl FnMut(anyhow::Error) + Send + 'static) {
        self.sink = ErrorSink::new(sink);
    }

    /// Registers systems, validating every declared query first.
    ///
    /// Either all systems are added or none are.
    pub fn add_systems(&mut self, systems: impl IntoIterator<Item = System>) -> Result<(), EcsError> {
        let Phase::Building(_) = self.phase else {
            return Err(EcsError::ScheduleFrozen);
        };

        let systems: Vec<System> = systems.into_iter().collect();
        for system in &systems {
            if let Some(key) = system.queries.iter().find(|k| !k.is_well_formed()) {
                return Err(EcsError::MalformedQuery {
                    system: system.name.clone(),
                    key: key.to_string(),
                });
            }
        }

        let mut scheduled = Vec::with_capacity(systems.len());
        for system in systems {
            let keys = system
                .queries
                .iter()
                .map(|k| self.store.register_key(k.clone()))
                .collect();
            scheduled.push(ScheduledSystem::new(system, keys));
        }
        if let Phase::Building(pending) = &mut self.phase {
            pending.extend(scheduled);
        }
        Ok(())
    }

    pub fn add_system(&mut self, system: System) -> Result<(), EcsError> {
        self.add_systems([system])
    }

    /// Indexes `Q` without attaching it to a system, so it can be read via
    /// [`World::query`]. Allowed at any time; existing entities are indexed.
    pub fn register_query<Q: ComponentSet>(&mut self) -> Result<(), EcsError> {
        let key = QueryKey::of::<Q>();
        if !key.is_well_formed() {
            return Err(EcsError::MalformedQuery {
                system: "<world>".to_string(),
                key: key.to_string(),
            });
        }
        self.store.register_key(key);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    /// Number of scheduled systems in either phase.
    pub fn system_count(&self) -> usize {
        match &self.phase {
            Phase::Building(pending) => pending.len(),
            Phase::Running(schedule) => schedule.len(),
        }
    }

    fn freeze(&mut self) {
        if let Phase::Building(pending) = &mut self.phase {
            let systems = mem::take(pending);
            self.phase = Phase::Running(Schedule::new(systems));
        }
    }

    /// Creates an empty entity now and queues `bundle` for it. Freezes the schedule.
    ///
    /// The entity is alive immediately but matches no query until commit.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        self.freeze();
        let entity = self.commands.spawn(bundle);
        self.store.create(entity);
        entity
    }

    pub fn spawn_many<I, B>(&mut self, bundles: I) -> Vec<Entity>
    where
        I: IntoIterator<Item = B>,
        B: Bundle,
    {
        bundles.into_iter().map(|b| self.spawn(b)).collect()
    }

    pub fn apply<B: Bundle>(&mut self, entity: Entity, bundle: B) {
        self.commands.apply(entity, bundle);
    }

    pub fn apply_many<I, B>(&mut self, items: I)
    where
        I: IntoIterator<Item = (Entity, B)>,
        B: Bundle,
    {
        self.commands.apply_many(items);
    }

    pub fn unapply<S: ComponentSet>(&mut self, entity: Entity) {
        self.commands.unapply::<S>(entity);
    }

    pub fn unapply_many<S: ComponentSet>(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.commands.unapply_many::<S>(entities);
    }

    pub fn kill(&mut self, entity: Entity) {
        self.commands.kill(entity);
    }

    pub fn kill_many(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.commands.kill_many(entities);
    }

    pub fn schedule_transform<T, F>(&mut self, entity: Entity, f: F)
    where
        T: Component,
        F: FnOnce(T) -> T + Send + 'static,
    {
        self.commands.schedule_transform(entity, f);
    }

    /// Number of queued, uncommitted operations.
    pub fn pending(&self) -> usize {
        self.commands.len()
    }

    /// Applies every queued operation.
    pub fn commit(&mut self) -> CommitStats {
        let stats = self.commands.flush(&mut self.store);
        trace!(?stats, entities = self.store.len(), "commit");
        stats
    }

    /// Runs every system once, then commits.
    pub fn step(&mut self) -> StepReport {
        self.freeze();
        let Self {
            store,
            commands,
            resources,
            sink,
            phase,
        } = &mut *self;
        let failed_systems = match phase {
            Phase::Running(schedule) => schedule.run(store, commands, resources, sink),
            Phase::Building(_) => 0,
        };
        let commit = self.commit();
        StepReport {
            failed_systems,
            commit,
        }
    }

    /// Reads `Q` outside of a system.
    ///
    /// # Panics
    ///
    /// Panics if no system declared `Q` and it was never registered.
    pub fn query<Q: ComponentSet>(&self) -> Query<'_, Q> {
        match self.try_query::<Q>() {
            Ok(query) => query,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_query<Q: ComponentSet>(&self) -> Result<Query<'_, Q>, EcsError> {
        let key = QueryKey::of::<Q>();
        match self.store.key_id(&key) {
            Some(id) => Ok(Query::new(&self.store, id)),
            None => Err(EcsError::UnknownQuery {
                key: key.to_string(),
            }),
        }
    }

    pub fn insert_resource<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.resources.insert(value)
    }

    /// # Panics
    ///
    /// Panics if no `T` resource is set.
    pub fn resource<T: Any + Send + Sync>(&self) -> &T {
        match self.resources.get::<T>() {
            Some(value) => value,
            None => panic!("resource `{}` is not set", type_name::<T>()),
        }
    }

    /// # Panics
    ///
    /// Panics if no `T` resource is set.
    pub fn resource_mut<T: Any + Send + Sync>(&mut self) -> &mut T {
        match self.resources.get_mut::<T>() {
            Some(value) => value,
            None => panic!("resource `{}` is not set", type_name::<T>()),
        }
    }

    pub fn try_resource<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.resources.get::<T>()
    }

    pub fn try_resource_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.resources.get_mut::<T>()
    }

    pub fn remove_resource<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.resources.remove::<T>()
    }

    /// Runs a fallible block outside of a system, sending its error to the sink.
    pub fn catch<R>(&mut self, f: impl FnOnce(&mut Self) -> anyhow::Result<R>) -> Option<R> {
        match f(self) {
            Ok(value) => Some(value),
            Err(err) => {
                self.sink.report(err);
                None
            }
        }
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.contains(entity)
    }

    /// Committed components of `entity`.
    pub fn components(&self, entity: Entity) -> Option<&Components> {
        self.store.components(entity)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.store.components(entity).and_then(|cs| cs.get::<T>())
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.store.len())
            .field("queries", &self.store.key_count())
            .field("systems", &self.system_count())
            .field("running", &self.is_running())
            .field("pending", &self.commands.len())
            .field("resources", &self.resources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_entities_become_visible_at_commit() {
        let mut world = World::new();
        world.register_query::<(i32,)>().unwrap();
        let e = world.spawn((3i32,));

        assert!(world.is_alive(e));
        assert_eq!(world.components(e).map(Components::len), Some(0));
        assert!(world.query::<(i32,)>().is_empty());

        world.commit();
        assert!(world.is_alive(e));
        assert_eq!(world.query::<(i32,)>().get(e), Some((&3,)));
        assert_eq!(world.get::<i32>(e), Some(&3));
    }

    #[test]
    fn add_systems_after_spawn_is_rejected() {
        let mut world = World::new();
        world.spawn(());
        let err = world
            .add_system(System::new("late").run(|_| Ok(())))
            .unwrap_err();
        assert_eq!(err, EcsError::ScheduleFrozen);
        assert!(world.is_running());
    }

    #[test]
    fn malformed_query_rejects_whole_batch() {
        let mut world = World::new();
        let ok = System::new("ok").query::<(i32,)>().run(|_| Ok(()));
        let bad = System::new("bad").query::<(i32, i32)>().run(|_| Ok(()));
        let err = world.add_systems([ok, bad]).unwrap_err();
        assert!(matches!(err, EcsError::MalformedQuery { ref system, .. } if system == "bad"));
        assert_eq!(world.system_count(), 0);
    }

    #[test]
    fn unknown_query_is_an_error() {
        let world = World::new();
        assert!(matches!(
            world.try_query::<(u8,)>(),
            Err(EcsError::UnknownQuery { .. })
        ));
    }

    #[test]
    fn resources_are_owned_by_world() {
        let mut world = World::new();
        world.insert_resource(10u32);
        *world.resource_mut::<u32>() += 1;
        assert_eq!(*world.resource::<u32>(), 11);
        assert_eq!(world.remove_resource::<u32>(), Some(11));
        assert!(world.try_resource::<u32>().is_none());
    }

    #[test]
    #[should_panic(expected = "is not set")]
    fn missing_resource_panics_with_type_name() {
        let world = World::new();
        let _ = world.resource::<String>();
    }
}
