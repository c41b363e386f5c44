//! Deferred mutations.
//!
//! Systems never touch the store directly. They queue spawns, upserts,
//! removals, kills and transforms here, and [`CommandBuffer::flush`] applies
//! them in a fixed order at commit time:
//!
//! 1. spawns (empty component sets)
//! 2. removals
//! 3. additions
//! 4. kills
//! 5. transforms
//!
//! Removing before adding lets one tick retire and replace a component.
//! Kills run after both, so edits queued against a dying entity are harmless.
//! Transforms observe the post-structural state.

use tracing::debug;

use crate::{
    ecs::{BoxedComponent, Bundle, Component, ComponentType, Entity, ErasedComponent},
    query::ComponentSet,
    store::Store,
};

pub(crate) type TransformFn = Box<dyn FnOnce(ErasedComponent) -> ErasedComponent + Send>;

struct Transform {
    entity: Entity,
    ty: ComponentType,
    apply: TransformFn,
}

/// What a commit actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub spawned: usize,
    pub removals: usize,
    pub additions: usize,
    pub killed: usize,
    pub transformed: usize,
    /// Queued operations whose target entity no longer existed.
    pub dropped: usize,
}

/// Queue of pending world mutations.
#[derive(Default)]
pub struct CommandBuffer {
    next_entity: u64,
    spawned: Vec<Entity>,
    removals: Vec<(Entity, Vec<ComponentType>)>,
    additions: Vec<(Entity, Vec<BoxedComponent>)>,
    kills: Vec<Entity>,
    transforms: Vec<Transform>,
}

impl CommandBuffer {
    /// Allocates a fresh id and queues `bundle` for addition.
    ///
    /// The id is usable immediately (e.g. as a target for [`CommandBuffer::apply`]),
    /// but the entity only becomes queryable after the next commit.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        self.next_entity += 1;
        let entity = Entity(self.next_entity);
        self.spawned.push(entity);
        let components = bundle.into_components();
        if !components.is_empty() {
            self.additions.push((entity, components));
        }
        entity
    }

    pub fn spawn_many<I, B>(&mut self, bundles: I) -> Vec<Entity>
    where
        I: IntoIterator<Item = B>,
        B: Bundle,
    {
        bundles.into_iter().map(|b| self.spawn(b)).collect()
    }

    /// Queues an upsert; a component replaces any existing one of the same type.
    pub fn apply<B: Bundle>(&mut self, entity: Entity, bundle: B) {
        self.additions.push((entity, bundle.into_components()));
    }

    pub fn apply_many<I, B>(&mut self, items: I)
    where
        I: IntoIterator<Item = (Entity, B)>,
        B: Bundle,
    {
        self.additions
            .extend(items.into_iter().map(|(e, b)| (e, b.into_components())));
    }

    /// Queues removal of every component type in `S`.
    pub fn unapply<S: ComponentSet>(&mut self, entity: Entity) {
        self.removals.push((entity, S::component_types()));
    }

    pub fn unapply_many<S: ComponentSet>(&mut self, entities: impl IntoIterator<Item = Entity>) {
        let types = S::component_types();
        self.removals
            .extend(entities.into_iter().map(|e| (e, types.clone())));
    }

    /// Queues removal of explicitly listed types.
    pub fn unapply_types(&mut self, entity: Entity, types: Vec<ComponentType>) {
        self.removals.push((entity, types));
    }

    /// Queues destruction. Killing the same entity twice is harmless.
    pub fn kill(&mut self, entity: Entity) {
        self.kills.push(entity);
    }

    pub fn kill_many(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.kills.extend(entities);
    }

    /// Queues `f(old)` as the new value of `entity`'s `T` component.
    ///
    /// Applied after all structural changes of the commit. Silently skipped if
    /// the entity or the component is gone by then.
    pub fn schedule_transform<T, F>(&mut self, entity: Entity, f: F)
    where
        T: Component,
        F: FnOnce(T) -> T + Send + 'static,
    {
        let apply: TransformFn =
            Box::new(move |old: ErasedComponent| -> ErasedComponent {
                match old.downcast::<T>() {
                    Ok(value) => Box::new(f(*value)) as ErasedComponent,
                    Err(other) => other,
                }
            });
        self.transforms.push(Transform {
            entity,
            ty: ComponentType::of::<T>(),
            apply,
        });
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.spawned.len()
            + self.removals.len()
            + self.additions.len()
            + self.kills.len()
            + self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies every queued operation to `store` and empties the queues.
    pub(crate) fn flush(&mut self, store: &mut Store) -> CommitStats {
        let mut stats = CommitStats::default();

        for entity in self.spawned.drain(..) {
            store.create(entity);
            stats.spawned += 1;
        }

        for (entity, types) in self.removals.drain(..) {
            if store.remove_components(entity, &types) {
                stats.removals += 1;
            } else {
                debug!(%entity, "dropping removal for missing entity");
                stats.dropped += 1;
            }
        }

        for (entity, components) in self.additions.drain(..) {
            if store.add_components(entity, components) {
                stats.additions += 1;
            } else {
                debug!(%entity, "dropping addition for missing entity");
                stats.dropped += 1;
            }
        }

        for entity in self.kills.drain(..) {
            if store.kill(entity) {
                stats.killed += 1;
            }
        }

        for Transform { entity, ty, apply } in self.transforms.drain(..) {
            if store.transform(entity, ty.id(), apply) {
                stats.transformed += 1;
            }
        }

        stats
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("spawned", &self.spawned.len())
            .field("removals", &self.removals.len())
            .field("additions", &self.additions.len())
            .field("kills", &self.kills.len())
            .field("transforms", &self.transforms.len())
            .finish()
    }
}
