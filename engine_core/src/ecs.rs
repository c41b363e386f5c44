//! Entity/component vocabulary.
//!
//! Components are arbitrary `'static + Send + Sync` values stored type-erased
//! per entity, at most one value per type. Mutation always goes through the
//! command buffer and becomes visible at commit; see [`crate::world::World`].

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::query::QueryKey;

/// Opaque entity id. Ids are never reused within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity(pub u64);

impl Entity {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that can be attached to an entity.
pub trait Component: Any + Send + Sync {}

impl<T: Any + Send + Sync> Component for T {}

pub(crate) type ErasedComponent = Box<dyn Any + Send + Sync>;

/// Runtime token naming a component type.
#[derive(Debug, Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    pub fn of<T: Component>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl Hash for ComponentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A component value whose type is only known at runtime.
///
/// Used to build heterogeneous batches, e.g. for [`crate::world::World::apply_many`].
pub struct BoxedComponent {
    ty: ComponentType,
    value: ErasedComponent,
}

impl BoxedComponent {
    pub fn new<T: Component>(value: T) -> Self {
        Self {
            ty: ComponentType::of::<T>(),
            value: Box::new(value),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.ty
    }

    pub(crate) fn into_parts(self) -> (ComponentType, ErasedComponent) {
        (self.ty, self.value)
    }
}

impl fmt::Debug for BoxedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedComponent").field("type", &self.ty.name).finish()
    }
}

/// The committed components of one entity.
#[derive(Default)]
pub struct Components {
    map: HashMap<TypeId, ErasedComponent>,
}

impl Components {
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn contains<T: Component>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// True when every type named by `key` is present.
    pub fn satisfies(&self, key: &QueryKey) -> bool {
        key.types().iter().all(|ty| self.map.contains_key(&ty.id()))
    }

    pub(crate) fn insert(&mut self, ty: TypeId, value: ErasedComponent) {
        self.map.insert(ty, value);
    }

    pub(crate) fn remove(&mut self, ty: TypeId) -> Option<ErasedComponent> {
        self.map.remove(&ty)
    }
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Components").field("len", &self.map.len()).finish()
    }
}

/// A group of components added together.
///
/// Implemented for `()`, tuples of up to eight components, a single
/// [`BoxedComponent`] and `Vec<BoxedComponent>`.
pub trait Bundle {
    fn into_components(self) -> Vec<BoxedComponent>;
}

impl Bundle for () {
    fn into_components(self) -> Vec<BoxedComponent> {
        Vec::new()
    }
}

impl Bundle for BoxedComponent {
    fn into_components(self) -> Vec<BoxedComponent> {
        vec![self]
    }
}

impl Bundle for Vec<BoxedComponent> {
    fn into_components(self) -> Vec<BoxedComponent> {
        self
    }
}

macro_rules! impl_bundle {
    ($($t:ident),+) => {
        impl<$($t: Component),+> Bundle for ($($t,)+) {
            #[allow(non_snake_case)]
            fn into_components(self) -> Vec<BoxedComponent> {
                let ($($t,)+) = self;
                vec![$(BoxedComponent::new($t)),+]
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
