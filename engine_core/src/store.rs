//! Entity/component storage and per-key indices.
//!
//! Every registered [`QueryKey`] owns a set of the entities currently
//! satisfying it. The store is only mutated by [`crate::commands::CommandBuffer::flush`],
//! so indices change exclusively at commit boundaries.

use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
};

use crate::{
    commands::TransformFn,
    ecs::{BoxedComponent, ComponentType, Components, Entity},
    query::QueryKey,
};

pub(crate) type KeyId = usize;

#[derive(Default)]
pub struct Store {
    entities: HashMap<Entity, Components>,
    entity_keys: HashMap<Entity, HashSet<KeyId>>,
    keys: Vec<QueryKey>,
    key_ids: HashMap<QueryKey, KeyId>,
    key_entities: Vec<HashSet<Entity>>,
    type_keys: HashMap<TypeId, HashSet<KeyId>>,
}

impl Store {
    /// Number of live (committed) entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn components(&self, entity: Entity) -> Option<&Components> {
        self.entities.get(&entity)
    }

    /// Number of registered query keys.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Registers `key` (idempotent) and returns its index slot.
    pub(crate) fn register_key(&mut self, key: QueryKey) -> KeyId {
        if let Some(&id) = self.key_ids.get(&key) {
            return id;
        }
        let id = self.keys.len();
        for ty in key.types() {
            self.type_keys.entry(ty.id()).or_default().insert(id);
        }
        let members: HashSet<Entity> = self
            .entities
            .iter()
            .filter(|(_, cs)| cs.satisfies(&key))
            .map(|(e, _)| *e)
            .collect();
        for entity in &members {
            self.entity_keys.entry(*entity).or_default().insert(id);
        }
        self.key_ids.insert(key.clone(), id);
        self.keys.push(key);
        self.key_entities.push(members);
        id
    }

    pub(crate) fn key_id(&self, key: &QueryKey) -> Option<KeyId> {
        self.key_ids.get(key).copied()
    }

    pub(crate) fn key(&self, id: KeyId) -> &QueryKey {
        &self.keys[id]
    }

    pub(crate) fn members(&self, id: KeyId) -> &HashSet<Entity> {
        &self.key_entities[id]
    }

    /// Creates an empty component set. No-op for existing entities.
    pub(crate) fn create(&mut self, entity: Entity) {
        self.entities.entry(entity).or_default();
        self.entity_keys.entry(entity).or_default();
    }

    /// Upserts components and indexes the entity under every key it now satisfies.
    ///
    /// Returns `false` if the entity does not exist.
    pub(crate) fn add_components(&mut self, entity: Entity, components: Vec<BoxedComponent>) -> bool {
        let Some(cs) = self.entities.get_mut(&entity) else {
            return false;
        };

        let mut candidates: HashSet<KeyId> = HashSet::new();
        for component in components {
            let (ty, value) = component.into_parts();
            if let Some(keys) = self.type_keys.get(&ty.id()) {
                candidates.extend(keys.iter().copied());
            }
            cs.insert(ty.id(), value);
        }

        let recorded = self.entity_keys.entry(entity).or_default();
        for id in candidates {
            if !recorded.contains(&id) && cs.satisfies(&self.keys[id]) {
                self.key_entities[id].insert(entity);
                recorded.insert(id);
            }
        }
        true
    }

    /// Removes components and drops the entity from keys it no longer satisfies.
    ///
    /// Returns `false` if the entity does not exist.
    pub(crate) fn remove_components(&mut self, entity: Entity, types: &[ComponentType]) -> bool {
        let Some(cs) = self.entities.get_mut(&entity) else {
            return false;
        };
        for ty in types {
            cs.remove(ty.id());
        }

        if let Some(recorded) = self.entity_keys.get_mut(&entity) {
            let keys = &self.keys;
            let dropped: Vec<KeyId> = recorded
                .iter()
                .copied()
                .filter(|&id| !cs.satisfies(&keys[id]))
                .collect();
            for id in dropped {
                recorded.remove(&id);
                self.key_entities[id].remove(&entity);
            }
        }
        true
    }

    /// Destroys an entity and purges its bookkeeping. Returns `false` if it was already gone.
    pub(crate) fn kill(&mut self, entity: Entity) -> bool {
        if let Some(recorded) = self.entity_keys.remove(&entity) {
            for id in recorded {
                self.key_entities[id].remove(&entity);
            }
        }
        self.entities.remove(&entity).is_some()
    }

    /// Replaces one component with `apply(old)`. Returns `false` if entity or component is absent.
    pub(crate) fn transform(&mut self, entity: Entity, ty: TypeId, apply: TransformFn) -> bool {
        let Some(cs) = self.entities.get_mut(&entity) else {
            return false;
        };
        match cs.remove(ty) {
            Some(old) => {
                cs.insert(ty, apply(old));
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn recorded_keys(&self, entity: Entity) -> Option<&HashSet<KeyId>> {
        self.entity_keys.get(&entity)
    }
}
