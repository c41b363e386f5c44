//! Typed read views over the store.
//!
//! A [`QueryKey`] is an ordered list of component types. The store keeps, per
//! registered key, the set of entities whose committed components are a
//! superset of the key. A [`Query`] reads that index; it never sees mutations
//! queued in the current tick.

use std::{collections::HashSet, fmt, marker::PhantomData};

use crate::{
    ecs::{Component, ComponentType, Components, Entity},
    error::EcsError,
    store::{KeyId, Store},
};

/// Ordered component-type list describing a query's shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    types: Vec<ComponentType>,
}

impl QueryKey {
    pub fn new(types: Vec<ComponentType>) -> Self {
        Self { types }
    }

    pub fn of<Q: ComponentSet>() -> Self {
        Self::new(Q::component_types())
    }

    pub fn types(&self) -> &[ComponentType] {
        &self.types
    }

    /// Non-empty and free of repeated types.
    pub fn is_well_formed(&self) -> bool {
        let mut seen = HashSet::new();
        !self.types.is_empty() && self.types.iter().all(|ty| seen.insert(ty.id()))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, ty) in self.types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(ty.name())?;
        }
        f.write_str(")")
    }
}

/// A tuple of component types that can be read together.
///
/// Implemented for tuples of one to eight components; the item is the tuple
/// of shared references, e.g. `(Position, Velocity)` yields
/// `(&Position, &Velocity)`.
pub trait ComponentSet: 'static {
    type Item<'w>;

    fn component_types() -> Vec<ComponentType>;

    fn fetch(components: &Components) -> Option<Self::Item<'_>>;
}

macro_rules! impl_component_set {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentSet for ($($t,)+) {
            type Item<'w> = ($(&'w $t,)+);

            fn component_types() -> Vec<ComponentType> {
                vec![$(ComponentType::of::<$t>()),+]
            }

            fn fetch(components: &Components) -> Option<Self::Item<'_>> {
                Some(($(components.get::<$t>()?,)+))
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

/// View over the entities matching `Q`, valid for the current tick.
pub struct Query<'w, Q: ComponentSet> {
    store: &'w Store,
    key: KeyId,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: ComponentSet> Clone for Query<'_, Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q: ComponentSet> Copy for Query<'_, Q> {}

impl<'w, Q: ComponentSet> Query<'w, Q> {
    pub(crate) fn new(store: &'w Store, key: KeyId) -> Self {
        Self {
            store,
            key,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'w QueryKey {
        let store = self.store;
        store.key(self.key)
    }

    /// Component tuple for `entity`, or `None` if it is not indexed under this key.
    pub fn get(&self, entity: Entity) -> Option<Q::Item<'w>> {
        let store = self.store;
        if !store.members(self.key).contains(&entity) {
            return None;
        }
        store.components(entity).and_then(|cs| Q::fetch(cs))
    }

    /// Like [`Query::get`], but a non-member is an error.
    pub fn fetch(&self, entity: Entity) -> Result<Q::Item<'w>, EcsError> {
        self.get(entity).ok_or_else(|| EcsError::NotInQuery {
            entity,
            key: self.key().to_string(),
        })
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.store.members(self.key).contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.store.members(self.key).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every matching entity with its components, in index order (unspecified).
    pub fn all(&self) -> impl Iterator<Item = (Entity, Q::Item<'w>)> + 'w {
        let store = self.store;
        store.members(self.key).iter().filter_map(move |&entity| {
            store
                .components(entity)
                .and_then(|cs| Q::fetch(cs))
                .map(|item| (entity, item))
        })
    }

    /// Matching entity ids only.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + 'w {
        let store = self.store;
        store.members(self.key).iter().copied()
    }
}

impl<Q: ComponentSet> fmt::Debug for Query<'_, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("key", self.key())
            .field("len", &self.len())
            .finish()
    }
}
