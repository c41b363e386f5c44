//! In-memory message plumbing between a transport and the world.
//!
//! No sockets here: a transport pushes decoded client messages into the
//! [`Inbox`], systems drain it and write replies to the [`Outbox`], and the
//! host hands the resulting [`MessageBundle`] back to the transport each tick.

use std::{collections::HashMap, fmt, mem};

use serde::{Deserialize, Serialize};

/// Connection id assigned by the host. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Messages received from clients, grouped per client in arrival order.
#[derive(Debug)]
pub struct Inbox<M> {
    messages: HashMap<ClientId, Vec<M>>,
}

impl<M> Default for Inbox<M> {
    fn default() -> Self {
        Self {
            messages: HashMap::new(),
        }
    }
}

impl<M> Inbox<M> {
    pub fn push(&mut self, client: ClientId, message: M) {
        self.messages.entry(client).or_default().push(message);
    }

    /// Takes every queued message from `client`.
    pub fn pop(&mut self, client: ClientId) -> Vec<M> {
        self.messages.remove(&client).unwrap_or_default()
    }

    /// Drops whatever `client` left behind.
    pub fn discard(&mut self, client: ClientId) -> usize {
        self.messages.remove(&client).map_or(0, |m| m.len())
    }

    /// Total queued messages across clients.
    pub fn pending(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }
}

/// Messages for clients, produced by systems during one tick.
#[derive(Debug)]
pub struct Outbox<M> {
    broadcast: Vec<M>,
    single: HashMap<ClientId, Vec<M>>,
}

impl<M> Default for Outbox<M> {
    fn default() -> Self {
        Self {
            broadcast: Vec::new(),
            single: HashMap::new(),
        }
    }
}

impl<M> Outbox<M> {
    pub fn send_broadcast(&mut self, message: M) {
        self.broadcast.push(message);
    }

    pub fn send_single(&mut self, client: ClientId, message: M) {
        self.single.entry(client).or_default().push(message);
    }

    /// Moves everything queued so far into a bundle, leaving the outbox empty.
    pub fn take_bundle(&mut self) -> MessageBundle<M> {
        MessageBundle {
            broadcast: mem::take(&mut self.broadcast),
            single: mem::take(&mut self.single),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.broadcast.is_empty() && self.single.is_empty()
    }
}

/// One tick's worth of outgoing messages.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBundle<M> {
    pub broadcast: Vec<M>,
    pub single: HashMap<ClientId, Vec<M>>,
}

impl<M> Default for MessageBundle<M> {
    fn default() -> Self {
        Self {
            broadcast: Vec::new(),
            single: HashMap::new(),
        }
    }
}

impl<M> MessageBundle<M> {
    /// What `client` should receive: its own messages first, then broadcasts.
    pub fn for_client(&self, client: ClientId) -> impl Iterator<Item = &M> + '_ {
        self.single
            .get(&client)
            .into_iter()
            .flatten()
            .chain(self.broadcast.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.broadcast.is_empty() && self.single.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.broadcast.len() + self.single.values().map(Vec::len).sum::<usize>()
    }
}

/// FIFO of clients waiting to be joined into (or removed from) the world.
#[derive(Debug, Default)]
pub struct PlayerQueue {
    players: Vec<ClientId>,
}

impl PlayerQueue {
    pub fn add(&mut self, client: ClientId) {
        self.players.push(client);
    }

    /// Takes every queued client in insertion order.
    pub fn pop(&mut self) -> Vec<ClientId> {
        mem::take(&mut self.players)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
