//! Collision orchestration.
//!
//! Glues the broad phase ([`BboxGrouper`]) and the narrow phase
//! ([`collide`]) to the ECS. Each tick every `(Position, Collider)` entity is
//! bucketed by its positioned bounding box; pairs sharing a cell are tested
//! once, and each entity receives its full contact list as one [`Contacts`]
//! component.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::{
    collision::collide,
    config::CollisionConfig,
    ecs::Entity,
    geometry::Shape,
    grouper::BboxGrouper,
    math::Vec2,
    schedule::System,
};

/// World-space position of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

/// Collision shape, relative to the entity's [`Position`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider(pub Shape);

/// One overlap seen from the receiving entity's side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub other: Entity,
    /// Push to apply to the receiving entity to separate it from `other`.
    pub push: Vec2,
}

/// All contacts found for an entity in the last detection pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contacts(pub Vec<Contact>);

impl Contacts {
    /// Sum of every push.
    pub fn total_push(&self) -> Vec2 {
        self.0.iter().fold(Vec2::ZERO, |acc, c| acc + c.push)
    }
}

/// Counters from one detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionStats {
    pub entries: usize,
    /// Entries whose bounding box could not be placed on the grid.
    pub skipped: usize,
    pub cells: usize,
    /// Pairs produced by the grid, duplicates across cells included.
    pub candidate_pairs: usize,
    pub unique_pairs: usize,
    /// Pairs that actually overlapped.
    pub contacts: usize,
}

/// Finds every overlapping pair among positioned shapes.
pub fn find_contacts(
    shapes: impl IntoIterator<Item = (Entity, Shape)>,
    config: &CollisionConfig,
) -> (HashMap<Entity, Vec<Contact>>, CollisionStats) {
    let mut grouper = BboxGrouper::new(config.chunk_size);
    let mut stats = CollisionStats::default();
    for (entity, shape) in shapes {
        stats.entries += 1;
        if !grouper.push((entity, shape), &shape.bbox()) {
            stats.skipped += 1;
        }
    }
    stats.cells = grouper.len();

    let mut seen: HashSet<(Entity, Entity)> = HashSet::new();
    let mut contacts: HashMap<Entity, Vec<Contact>> = HashMap::new();
    for region in grouper.regions() {
        for (i, (a, shape_a)) in region.iter().enumerate() {
            for (b, shape_b) in &region[i + 1..] {
                stats.candidate_pairs += 1;
                let pair = if a < b { (*a, *b) } else { (*b, *a) };
                if a == b || !seen.insert(pair) {
                    continue;
                }
                stats.unique_pairs += 1;
                if let Some(push) = collide(shape_a, shape_b, config.damping) {
                    stats.contacts += 1;
                    contacts
                        .entry(*a)
                        .or_default()
                        .push(Contact { other: *b, push });
                    contacts
                        .entry(*b)
                        .or_default()
                        .push(Contact { other: *a, push: -push });
                }
            }
        }
    }
    (contacts, stats)
}

/// Attaches [`Contacts`] to every colliding `(Position, Collider)` entity.
pub fn detect_collisions_system(config: CollisionConfig) -> System {
    System::new("detect_collisions")
        .query::<(Position, Collider)>()
        .run(move |cx| {
            let bodies = cx.query::<(Position, Collider)>();
            let shapes = bodies
                .all()
                .map(|(entity, (pos, collider))| (entity, collider.0.shift(pos.0)));
            let (contacts, stats) = find_contacts(shapes, &config);
            trace!(
                entries = stats.entries,
                skipped = stats.skipped,
                cells = stats.cells,
                candidates = stats.candidate_pairs,
                unique = stats.unique_pairs,
                contacts = stats.contacts,
                "collision pass"
            );
            cx.apply_many(
                contacts
                    .into_iter()
                    .map(|(entity, list)| (entity, (Contacts(list),))),
            );
            Ok(())
        })
}

/// Removes last tick's [`Contacts`] so stale contacts never linger.
///
/// Its order relative to [`detect_collisions_system`] does not matter:
/// removals commit before additions, so fresh contacts always survive.
pub fn clear_contacts_system() -> System {
    System::new("clear_contacts")
        .query::<(Contacts,)>()
        .run(|cx| {
            let stale: Vec<Entity> = cx.query::<(Contacts,)>().entities().collect();
            cx.unapply_many::<(Contacts,)>(stale);
            Ok(())
        })
}
