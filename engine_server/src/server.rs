//! Headless simulation host.
//!
//! Drives a [`World`] the way a networked server would, minus the network:
//!
//! - Clients connect and disconnect through [`SimServer::connect`] and
//!   [`SimServer::disconnect`]; both only queue the change.
//! - Each [`SimServer::step`] first applies queued joins and leaves through
//!   [`SessionHooks`], commits them, injects [`TickDelta`]/[`Frame`], steps the
//!   world and returns the outbox contents.
//!
//! Determinism notes:
//! - `step` takes the delta explicitly; only `run_for_ticks` reads the clock.
//! - Joins and leaves are applied in arrival order.

use std::{collections::HashMap, marker::PhantomData};

use engine_core::{
    config::EngineConfig,
    resources::{Frame, TickDelta},
    world::World,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::net::{ClientId, Inbox, MessageBundle, Outbox, PlayerQueue};

/// Game-specific reactions to clients entering and leaving.
///
/// Called between ticks, before the commit that precedes the step, so
/// anything queued here is visible to systems in that same tick.
pub trait SessionHooks: Send {
    fn on_join(&mut self, world: &mut World, client: ClientId, username: &str);
    fn on_leave(&mut self, world: &mut World, client: ClientId);
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl SessionHooks for NoHooks {
    fn on_join(&mut self, _world: &mut World, _client: ClientId, _username: &str) {}
    fn on_leave(&mut self, _world: &mut World, _client: ClientId) {}
}

/// Host owning one world, with `In` client messages and `Out` server messages.
pub struct SimServer<In, Out> {
    cfg: EngineConfig,
    world: World,
    hooks: Box<dyn SessionHooks>,
    joins: PlayerQueue,
    leaves: PlayerQueue,
    usernames: HashMap<ClientId, String>,
    next_client: u64,
    frame: u64,
    _messages: PhantomData<fn(In) -> Out>,
}

impl<In, Out> SimServer<In, Out>
where
    In: Send + Sync + 'static,
    Out: Send + Sync + 'static,
{
    /// Wraps a world whose systems are already registered.
    ///
    /// Installs an empty [`Inbox<In>`] and [`Outbox<Out>`] as resources.
    pub fn new(cfg: EngineConfig, mut world: World, hooks: impl SessionHooks + 'static) -> Self {
        world.insert_resource(Inbox::<In>::default());
        world.insert_resource(Outbox::<Out>::default());
        world.insert_resource(TickDelta(cfg.tick_delta()));
        world.insert_resource(Frame(0));
        Self {
            cfg,
            world,
            hooks: Box::new(hooks),
            joins: PlayerQueue::default(),
            leaves: PlayerQueue::default(),
            usernames: HashMap::new(),
            next_client: 0,
            frame: 0,
            _messages: PhantomData,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Index of the next tick to run.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Connected clients, including ones not yet joined into the world.
    pub fn client_count(&self) -> usize {
        self.usernames.len()
    }

    pub fn username(&self, client: ClientId) -> Option<&str> {
        self.usernames.get(&client).map(String::as_str)
    }

    /// Registers a client; it is joined into the world on the next step.
    pub fn connect(&mut self, username: impl Into<String>) -> ClientId {
        self.next_client += 1;
        let client = ClientId(self.next_client);
        let username = username.into();
        info!(%client, %username, "client connected");
        self.usernames.insert(client, username);
        self.joins.add(client);
        client
    }

    /// Queues removal of a client. Unknown clients are ignored.
    pub fn disconnect(&mut self, client: ClientId) {
        if self.usernames.contains_key(&client) {
            info!(%client, "client disconnected");
            self.leaves.add(client);
        } else {
            debug!(%client, "disconnect for unknown client");
        }
    }

    /// Queues a decoded message from `client` for the next step.
    pub fn push_message(&mut self, client: ClientId, message: In) {
        match self.world.try_resource_mut::<Inbox<In>>() {
            Some(inbox) => inbox.push(client, message),
            None => warn!(%client, "inbox resource missing; message dropped"),
        }
    }

    /// Runs one tick with a simulated delta of `dt` seconds.
    pub fn step(&mut self, dt: f32) -> MessageBundle<Out> {
        for client in self.joins.pop() {
            let username = self.usernames.get(&client).cloned().unwrap_or_default();
            self.hooks.on_join(&mut self.world, client, &username);
        }
        for client in self.leaves.pop() {
            self.hooks.on_leave(&mut self.world, client);
            if let Some(inbox) = self.world.try_resource_mut::<Inbox<In>>() {
                let dropped = inbox.discard(client);
                if dropped > 0 {
                    debug!(%client, dropped, "discarded unread messages");
                }
            }
            self.usernames.remove(&client);
        }
        self.world.commit();

        self.world.insert_resource(TickDelta(dt));
        self.world.insert_resource(Frame(self.frame));
        let report = self.world.step();
        if report.failed_systems > 0 {
            warn!(
                frame = self.frame,
                failed = report.failed_systems,
                "systems failed this tick"
            );
        }

        let bundle = self
            .world
            .try_resource_mut::<Outbox<Out>>()
            .map(Outbox::take_bundle)
            .unwrap_or_default();
        self.frame += 1;
        bundle
    }

    /// Runs `ticks` steps paced at the configured tick rate.
    ///
    /// Each step receives the wall-clock time since the previous one; the
    /// first uses the nominal tick delta. Every bundle is passed to `on_bundle`
    /// along with the frame that produced it.
    pub async fn run_for_ticks(
        &mut self,
        ticks: u64,
        mut on_bundle: impl FnMut(u64, MessageBundle<Out>),
    ) {
        let interval = self.cfg.tick_interval();
        let mut next = Instant::now();
        let mut last: Option<Instant> = None;

        for _ in 0..ticks {
            let now = Instant::now();
            let dt = match last {
                Some(prev) => (now - prev).as_secs_f32(),
                None => self.cfg.tick_delta(),
            };
            last = Some(now);
            next += interval;

            let frame = self.frame;
            let bundle = self.step(dt);
            on_bundle(frame, bundle);
            tokio::time::sleep_until(next).await;
        }
    }
}

impl<In, Out> std::fmt::Debug for SimServer<In, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimServer")
            .field("frame", &self.frame)
            .field("clients", &self.usernames.len())
            .field("world", &self.world)
            .finish()
    }
}
