//! Systems and the per-tick schedule.
//!
//! A [`System`] is a named handler plus the queries it reads. Queries are
//! declared up front so the store can maintain their indices from the first
//! commit on. Handlers run sequentially in registration order and talk to the
//! world only through [`Context`].

use std::any::{type_name, Any};

use tracing::debug_span;

use crate::{
    commands::CommandBuffer,
    ecs::{Bundle, Component, Components, Entity},
    error::{EcsError, ErrorSink},
    query::{ComponentSet, Query, QueryKey},
    resources::Resources,
    store::{KeyId, Store},
};

type Handler = Box<dyn FnMut(&mut Context<'_>) -> anyhow::Result<()> + Send>;

/// A named per-tick handler with its declared queries.
pub struct System {
    pub(crate) name: String,
    pub(crate) queries: Vec<QueryKey>,
    pub(crate) handler: Handler,
}

impl System {
    /// Starts building a system.
    ///
    /// ```ignore
    /// let sys = System::new("movement")
    ///     .query::<(Position, Velocity)>()
    ///     .run(|cx| {
    ///         for (e, (pos, vel)) in cx.query::<(Position, Velocity)>().all() {
    ///             cx.apply(e, (Position(pos.0 + vel.0),));
    ///         }
    ///         Ok(())
    ///     });
    /// ```
    pub fn new(name: impl Into<String>) -> SystemBuilder {
        SystemBuilder {
            name: name.into(),
            queries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queries(&self) -> &[QueryKey] {
        &self.queries
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("queries", &self.queries)
            .finish()
    }
}

/// Collects query declarations before the handler is attached.
#[derive(Debug, Clone)]
pub struct SystemBuilder {
    name: String,
    queries: Vec<QueryKey>,
}

impl SystemBuilder {
    pub fn query<Q: ComponentSet>(self) -> Self {
        self.query_key(QueryKey::of::<Q>())
    }

    pub fn query_key(mut self, key: QueryKey) -> Self {
        self.queries.push(key);
        self
    }

    pub fn run<F>(self, handler: F) -> System
    where
        F: FnMut(&mut Context<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        System {
            name: self.name,
            queries: self.queries,
            handler: Box::new(handler),
        }
    }
}

pub(crate) struct ScheduledSystem {
    name: String,
    keys: Vec<KeyId>,
    handler: Handler,
}

impl ScheduledSystem {
    pub(crate) fn new(system: System, keys: Vec<KeyId>) -> Self {
        Self {
            name: system.name,
            keys,
            handler: system.handler,
        }
    }
}

/// Frozen, ordered list of systems.
#[derive(Default)]
pub(crate) struct Schedule {
    systems: Vec<ScheduledSystem>,
}

impl Schedule {
    pub(crate) fn new(systems: Vec<ScheduledSystem>) -> Self {
        Self { systems }
    }

    pub(crate) fn len(&self) -> usize {
        self.systems.len()
    }

    /// Runs every system once. Returns how many of them failed.
    pub(crate) fn run(
        &mut self,
        store: &Store,
        commands: &mut CommandBuffer,
        resources: &mut Resources,
        sink: &mut ErrorSink,
    ) -> usize {
        let mut failed = 0;
        for system in &mut self.systems {
            let _span = debug_span!("system", name = %system.name).entered();
            let mut cx = Context {
                store,
                commands: &mut *commands,
                resources: &mut *resources,
                sink: &mut *sink,
                system: &system.name,
                declared: &system.keys,
            };
            if let Err(err) = (system.handler)(&mut cx) {
                failed += 1;
                sink.report(err.context(format!("system `{}` failed", system.name)));
            }
        }
        failed
    }
}

/// Everything a handler may touch during one tick.
///
/// Reads see the state of the last commit; writes are queued.
pub struct Context<'w> {
    store: &'w Store,
    commands: &'w mut CommandBuffer,
    resources: &'w mut Resources,
    sink: &'w mut ErrorSink,
    system: &'w str,
    declared: &'w [KeyId],
}

impl<'w> Context<'w> {
    /// Name of the running system.
    pub fn system_name(&self) -> &str {
        self.system
    }

    /// The declared query `Q`.
    ///
    /// # Panics
    ///
    /// Panics if the running system did not declare `Q`.
    pub fn query<Q: ComponentSet>(&self) -> Query<'w, Q> {
        match self.try_query::<Q>() {
            Ok(query) => query,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_query<Q: ComponentSet>(&self) -> Result<Query<'w, Q>, EcsError> {
        let key = QueryKey::of::<Q>();
        match self.store.key_id(&key) {
            Some(id) if self.declared.contains(&id) => Ok(Query::new(self.store, id)),
            _ => Err(EcsError::UndeclaredQuery {
                system: self.system.to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Committed components of any entity, regardless of queries.
    pub fn components(&self, entity: Entity) -> Option<&'w Components> {
        let store = self.store;
        store.components(entity)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.contains(entity)
    }

    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        self.commands.spawn(bundle)
    }

    pub fn spawn_many<I, B>(&mut self, bundles: I) -> Vec<Entity>
    where
        I: IntoIterator<Item = B>,
        B: Bundle,
    {
        self.commands.spawn_many(bundles)
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

    pub fn insert_resource<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.resources.insert(value)
    }

    /// Runs a fallible block, sending its error to the sink.
    ///
    /// Use this to isolate per-item failures so one bad entity does not abort
    /// the rest of the system.
    pub fn catch<R>(&mut self, f: impl FnOnce(&mut Self) -> anyhow::Result<R>) -> Option<R> {
        match f(self) {
            Ok(value) => Some(value),
            Err(err) => {
                let err = err.context(format!("in system `{}`", self.system));
                self.sink.report(err);
                None
            }
        }
    }

    /// Sends an error to the sink without aborting the system.
    pub fn report(&mut self, err: anyhow::Error) {
        self.sink.report(err);
    }
}
