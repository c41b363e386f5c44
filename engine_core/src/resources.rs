//! Per-world typed singletons.
//!
//! One value per Rust type, owned by the world and dropped with it. Hosts use
//! this to inject tick-scoped data (delta time, frame counter, message queues).

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt,
};

/// Seconds elapsed since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickDelta(pub f32);

/// Index of the tick currently being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame(pub u64);

/// In-memory resource map keyed by type.
#[derive(Default)]
pub struct Resources {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    names: HashMap<TypeId, &'static str>,
}

impl Resources {
    /// Inserts a resource, returning the previous value of that type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.names.insert(TypeId::of::<T>(), type_name::<T>());
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.names.remove(&TypeId::of::<T>());
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names.values().collect();
        names.sort();
        f.debug_struct("Resources").field("types", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut res = Resources::default();
        assert_eq!(res.insert(TickDelta(0.5)), None);
        assert_eq!(res.insert(TickDelta(0.25)), Some(TickDelta(0.5)));
        assert_eq!(res.get::<TickDelta>(), Some(&TickDelta(0.25)));
        assert_eq!(res.len(), 1);
    }

    #[test]
    fn get_mut_and_remove() {
        let mut res = Resources::default();
        res.insert(Frame(1));
        if let Some(frame) = res.get_mut::<Frame>() {
            frame.0 += 1;
        }
        assert_eq!(res.remove::<Frame>(), Some(Frame(2)));
        assert!(!res.contains::<Frame>());
        assert!(res.is_empty());
    }
}
