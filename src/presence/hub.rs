//! Presence hub: who is in the store and what they last announced

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::ws::protocol::{PlayerState, ServerMsg, WirePlayerState};

/// Fan-out buffer per subscriber
pub const EVENT_CAPACITY: usize = 256;

/// A relayed message and the connection it came from, so that writers can
/// skip echoing it back
#[derive(Debug, Clone)]
pub struct RelayEvent {
    pub origin: String,
    pub msg: ServerMsg,
}

/// Shared roster plus broadcast fan-out to every connection
pub struct PresenceHub {
    players: DashMap<String, PlayerState>,
    /// Open sockets per player id; the same account may be open in several tabs
    connections: DashMap<String, usize>,
    events_tx: broadcast::Sender<RelayEvent>,
}

impl PresenceHub {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            players: DashMap::new(),
            connections: DashMap::new(),
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events_tx.subscribe()
    }

    /// Track a player and announce them. Returns everyone else.
    pub fn join(&self, state: PlayerState) -> Vec<WirePlayerState> {
        let id = state.id.clone();
        let announce = ServerMsg::PlayerUpdate(WirePlayerState::from(&state));
        let rejoined = self.players.insert(id.clone(), state).is_some();

        info!(
            player_id = %id,
            rejoined,
            player_count = self.players.len(),
            "Player joined store"
        );

        self.publish(&id, announce);
        self.roster_for(&id)
    }

    /// Record and relay a motion update. Unknown ids are tracked on the spot.
    pub fn update(&self, state: PlayerState) {
        let id = state.id.clone();
        let msg = ServerMsg::PlayerUpdate(WirePlayerState::from(&state));
        self.players.insert(id.clone(), state);
        self.publish(&id, msg);
    }

    /// Register an open socket for `id`. Returns how many are now open.
    pub fn connect(&self, id: &str) -> usize {
        let mut count = self.connections.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// A socket for `id` closed. The player is forgotten and the disconnect
    /// notice sent only once their last socket is gone. Idempotent.
    pub fn leave(&self, id: &str) -> bool {
        let removed = match self.connections.entry(id.to_string()) {
            Entry::Occupied(mut open) => {
                let count = open.get_mut();
                *count = count.saturating_sub(1);
                if *count > 0 {
                    debug!(
                        player_id = %id,
                        open_connections = *count,
                        "Connection closed, player still present"
                    );
                    return false;
                }
                open.remove();
                self.players.remove(id).is_some()
            }
            Entry::Vacant(_) => self.players.remove(id).is_some(),
        };

        if removed {
            info!(player_id = %id, player_count = self.players.len(), "Player left store");
            self.publish(id, ServerMsg::PlayerLeft { id: id.to_string() });
        }
        removed
    }

    /// Everyone except `id`
    pub fn roster_for(&self, id: &str) -> Vec<WirePlayerState> {
        self.players
            .iter()
            .filter(|entry| entry.key() != id)
            .map(|entry| WirePlayerState::from(entry.value()))
            .collect()
    }

    pub fn snapshot(&self) -> Vec<WirePlayerState> {
        self.players
            .iter()
            .map(|entry| WirePlayerState::from(entry.value()))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn publish(&self, origin: &str, msg: ServerMsg) {
        // No subscribers is fine
        let _ = self.events_tx.send(RelayEvent {
            origin: origin.to_string(),
            msg,
        });
    }
}

impl Default for PresenceHub {
    fn default() -> Self {
        Self::new()
    }
}
