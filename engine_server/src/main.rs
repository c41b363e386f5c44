//! Standalone demo host.
//!
//! Usage:
//!   cargo run -p engine_server -- [--config engine.json] [--tick-hz 100] [--ticks 1000] [--bots 4] [--seed 7]
//!
//! Runs a small arena: bot pilots steer circles around static walls. Contacts
//! with walls either push the pilot out or, for glancing hits, ricochet it.
//! Outgoing events are counted and logged instead of being sent anywhere.

use std::{collections::HashMap, env, fs};

use anyhow::Context as _;
use engine_core::prelude::*;
use engine_server::{ClientId, Inbox, Outbox, SessionHooks, SimServer};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const PILOT_RADIUS: f32 = 12.0;
const PILOT_SPEED: f32 = 200.0;
const ARENA: Vec2 = Vec2::new(800.0, 600.0);
const STEER_EVERY: u64 = 25;

/// Client input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ArenaInput {
    Steer { heading: Vec2 },
}

/// Server output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ArenaEvent {
    Welcome { entity: Entity },
    Joined { client: ClientId, username: String },
    Left { client: ClientId },
    Ricochet { entity: Entity, against: Entity },
}

#[derive(Debug, Clone, Copy)]
struct Velocity(Vec2);

#[derive(Debug, Clone, Copy)]
struct Pilot {
    client: ClientId,
}

#[derive(Debug, Clone, Copy)]
struct Solid;

struct Args {
    cfg: EngineConfig,
    ticks: u64,
    bots: usize,
    seed: u64,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();
    let mut cfg = EngineConfig::default();
    let mut tick_hz = None;
    let mut ticks = 1000;
    let mut bots = 4;
    let mut seed = 7;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                let path = &args[i + 1];
                let raw = fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
                cfg = EngineConfig::from_json_str(&raw)
                    .with_context(|| format!("parse config {path}"))?;
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                tick_hz = Some(args[i + 1].parse().context("parse --tick-hz")?);
                i += 2;
            }
            "--ticks" if i + 1 < args.len() => {
                ticks = args[i + 1].parse().context("parse --ticks")?;
                i += 2;
            }
            "--bots" if i + 1 < args.len() => {
                bots = args[i + 1].parse().context("parse --bots")?;
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                seed = args[i + 1].parse().context("parse --seed")?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    // Explicit flag wins over the config file regardless of order.
    if let Some(hz) = tick_hz {
        cfg.tick_hz = hz;
    }
    Ok(Args {
        cfg,
        ticks,
        bots,
        seed,
    })
}

struct ArenaHooks {
    rng: StdRng,
    pilots: HashMap<ClientId, Entity>,
}

impl SessionHooks for ArenaHooks {
    fn on_join(&mut self, world: &mut World, client: ClientId, username: &str) {
        let pos = Vec2::new(
            self.rng.gen_range(100.0..ARENA.x - 100.0),
            self.rng.gen_range(100.0..ARENA.y - 100.0),
        );
        let heading = Vec2::from_angle(self.rng.gen_range(0.0..std::f32::consts::TAU));
        let entity = world.spawn((
            Pilot { client },
            Position(pos),
            Velocity(heading * PILOT_SPEED),
            Collider(Circle::new(Vec2::ZERO, PILOT_RADIUS).into()),
        ));
        self.pilots.insert(client, entity);
        if let Some(outbox) = world.try_resource_mut::<Outbox<ArenaEvent>>() {
            outbox.send_single(client, ArenaEvent::Welcome { entity });
            outbox.send_broadcast(ArenaEvent::Joined {
                client,
                username: username.to_string(),
            });
        }
        debug!(%client, %entity, "pilot spawned");
    }

    fn on_leave(&mut self, world: &mut World, client: ClientId) {
        if let Some(entity) = self.pilots.remove(&client) {
            world.kill(entity);
        }
        if let Some(outbox) = world.try_resource_mut::<Outbox<ArenaEvent>>() {
            outbox.send_broadcast(ArenaEvent::Left { client });
        }
    }
}

fn apply_inputs_system() -> System {
    System::new("apply_inputs")
        .query::<(Pilot, Velocity)>()
        .run(|cx| {
            let pilots = cx.query::<(Pilot, Velocity)>();
            for (entity, (pilot, _)) in pilots.all() {
                let inputs = cx.resource_mut::<Inbox<ArenaInput>>().pop(pilot.client);
                if let Some(ArenaInput::Steer { heading }) = inputs.last() {
                    cx.apply(entity, (Velocity(heading.normalized() * PILOT_SPEED),));
                }
            }
            Ok(())
        })
}

fn movement_system() -> System {
    System::new("movement")
        .query::<(Position, Velocity)>()
        .run(|cx| {
            let TickDelta(dt) = *cx.resource::<TickDelta>();
            let movers = cx.query::<(Position, Velocity)>();
            cx.apply_many(
                movers
                    .all()
                    .map(|(e, (pos, vel))| (e, (Position(pos.0 + vel.0 * dt),))),
            );
            Ok(())
        })
}

/// Pushes pilots out of whatever they hit; glancing wall hits reflect instead.
fn resolve_contacts_system(ricochet: RicochetConfig) -> System {
    System::new("resolve_contacts")
        .query::<(Pilot, Velocity, Contacts)>()
        .query::<(Solid,)>()
        .run(move |cx| {
            let pilots = cx.query::<(Pilot, Velocity, Contacts)>();
            let solids = cx.query::<(Solid,)>();
            for (entity, (pilot, vel, contacts)) in pilots.all() {
                let mut total = Vec2::ZERO;
                for contact in &contacts.0 {
                    if !cx.is_alive(contact.other) {
                        continue;
                    }
                    if solids.contains(contact.other)
                        && ricochet.is_glancing(vel.0.alignment(contact.push))
                    {
                        let normal = contact.push.normalized();
                        cx.schedule_transform::<Velocity, _>(entity, move |v| {
                            Velocity(v.0 - normal * (2.0 * v.0.dot(normal)))
                        });
                        cx.resource_mut::<Outbox<ArenaEvent>>().send_single(
                            pilot.client,
                            ArenaEvent::Ricochet {
                                entity,
                                against: contact.other,
                            },
                        );
                    }
                    total += contact.push;
                }
                cx.schedule_transform::<Position, _>(entity, move |p| Position(p.0 + total));
            }
            Ok(())
        })
}

fn build_world(cfg: &EngineConfig) -> anyhow::Result<World> {
    let mut world = World::new();
    world
        .add_systems([
            apply_inputs_system(),
            movement_system(),
            clear_contacts_system(),
            detect_collisions_system(cfg.collision),
            resolve_contacts_system(cfg.ricochet),
        ])
        .context("register arena systems")?;

    let t = 20.0;
    let walls = [
        Aabb::new(Vec2::new(-t, -t), Vec2::new(ARENA.x + t, 0.0)),
        Aabb::new(Vec2::new(-t, ARENA.y), Vec2::new(ARENA.x + t, ARENA.y + t)),
        Aabb::new(Vec2::new(-t, 0.0), Vec2::new(0.0, ARENA.y)),
        Aabb::new(Vec2::new(ARENA.x, 0.0), Vec2::new(ARENA.x + t, ARENA.y)),
        Aabb::new(Vec2::new(50.0, 200.0), Vec2::new(90.0, 400.0)),
        Aabb::new(Vec2::new(50.0, 270.0), Vec2::new(150.0, 330.0)),
    ];
    world.spawn_many(
        walls
            .into_iter()
            .map(|wall| (Solid, Position(Vec2::ZERO), Collider(wall.into()))),
    );
    world.spawn((
        Solid,
        Position(Vec2::new(500.0, 300.0)),
        Collider(Circle::new(Vec2::ZERO, 80.0).into()),
    ));
    world.commit();
    Ok(world)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;
    info!(
        tick_hz = args.cfg.tick_hz,
        ticks = args.ticks,
        bots = args.bots,
        seed = args.seed,
        "Starting arena"
    );

    let world = build_world(&args.cfg)?;
    let hooks = ArenaHooks {
        rng: StdRng::seed_from_u64(args.seed),
        pilots: HashMap::new(),
    };
    let mut server: SimServer<ArenaInput, ArenaEvent> = SimServer::new(args.cfg.clone(), world, hooks);

    let bots: Vec<ClientId> = (0..args.bots)
        .map(|i| server.connect(format!("bot-{i}")))
        .collect();
    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let mut events = 0usize;
    let mut ricochets = 0usize;
    let report_every = u64::from(args.cfg.tick_hz.max(1));

    let mut remaining = args.ticks;
    while remaining > 0 {
        for &bot in &bots {
            let heading = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU));
            server.push_message(bot, ArenaInput::Steer { heading });
        }

        let chunk = remaining.min(STEER_EVERY);
        server
            .run_for_ticks(chunk, |frame, bundle| {
                events += bundle.len();
                ricochets += bundle
                    .single
                    .values()
                    .flatten()
                    .filter(|e| matches!(e, ArenaEvent::Ricochet { .. }))
                    .count();
                if frame % report_every == 0 {
                    if let Some(first) = bundle.broadcast.first() {
                        debug!(frame, event = %serde_json::to_string(first).unwrap_or_default(), "sample event");
                    }
                    info!(frame, events, ricochets, "arena status");
                }
            })
            .await;
        remaining -= chunk;
    }

    for bot in bots {
        server.disconnect(bot);
    }
    let last = server.step(args.cfg.tick_delta());
    info!(
        frames = server.frame(),
        entities = server.world().entity_count(),
        farewell = last.len(),
        events,
        ricochets,
        "Arena finished"
    );
    Ok(())
}
