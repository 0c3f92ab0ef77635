//! Client connection management and input queuing
//!
//! Tracks connected clients, the avatar entity each one controls, and the
//! actions they have sent but the simulation has not yet applied.

use log::info;
use shared::{EntityId, InputState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client and its queued actions
///
/// Each client keeps its connection metadata, the highest input sequence
/// applied so far, and the actions still waiting for the next tick.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest input sequence number we've processed
    pub last_processed_input: u32,
    /// Buffered inputs waiting to be processed
    pub pending_inputs: Vec<InputState>,
    /// Entity driven by this client's actions
    pub avatar: Option<EntityId>,
}

impl Client {
    /// Creates a client that has just been heard from
    ///
    /// The client starts with no processed inputs and no avatar.
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_processed_input: 0,
            pending_inputs: Vec::new(),
            avatar: None,
        }
    }

    /// Queues an input, keeping the buffer in sequence order
    pub fn add_input(&mut self, input: InputState) {
        self.last_seen = Instant::now();
        self.pending_inputs.push(input);
        // Packets may arrive out of order
        self.pending_inputs.sort_by_key(|i| i.sequence);
    }

    /// Checks whether the client has been silent longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// A client dropped for inactivity, with the avatar it left behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOutClient {
    pub client_id: u32,
    pub avatar: Option<EntityId>,
}

/// Manages all connected clients and their input processing
///
/// Inputs from every client are handed to the simulation in timestamp order,
/// so the outcome of contested actions (two players hitting the same target)
/// does not depend on which client's packet happened to be read first.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Silence after which a client is dropped
    timeout: Duration,
}

impl ClientManager {
    /// Creates an empty roster with a capacity limit and inactivity timeout
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Registers a client, or returns None when the server is full
    ///
    /// The new client has no avatar until [`ClientManager::set_avatar`] is
    /// called for it.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client and returns the avatar it controlled
    ///
    /// Used for explicit disconnects, reconnects from the same address and
    /// timeout cleanup alike. The caller destroys the returned entity.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<EntityId> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        client.avatar
    }

    /// Finds a client ID by network address
    ///
    /// Returns None if no client is connected from `addr`.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Binds the entity a client drives, returning false for unknown clients
    pub fn set_avatar(&mut self, client_id: u32, avatar: EntityId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.avatar = Some(avatar);
                true
            }
            None => false,
        }
    }

    /// Entity controlled by a client, if it is connected and has one
    pub fn avatar_of(&self, client_id: u32) -> Option<EntityId> {
        self.clients.get(&client_id).and_then(|client| client.avatar)
    }

    /// Marks a client as alive without queuing anything
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Queues an action for a client
    ///
    /// Returns false if the client is not connected. Receiving input also
    /// refreshes the client's timeout.
    pub fn add_input(&mut self, client_id: u32, input: InputState) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.add_input(input);
            true
        } else {
            false
        }
    }

    /// Unprocessed inputs of every client, sorted by timestamp
    ///
    /// Inputs at or below a client's last processed sequence are left out,
    /// so duplicated packets are applied only once.
    pub fn get_chronological_inputs(&self) -> Vec<(u32, InputState)> {
        let mut all_inputs: Vec<(u32, InputState)> = Vec::new();

        for (client_id, client) in &self.clients {
            for input in &client.pending_inputs {
                if input.sequence > client.last_processed_input {
                    all_inputs.push((*client_id, input.clone()));
                }
            }
        }

        all_inputs.sort_by_key(|(_, input)| input.timestamp);
        all_inputs
    }

    /// Records that a client's inputs up to `sequence` have been applied
    ///
    /// The watermark never moves backwards.
    pub fn mark_input_processed(&mut self, client_id: u32, sequence: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_processed_input = client.last_processed_input.max(sequence);
        }
    }

    /// Drops inputs that have already been applied
    pub fn cleanup_processed_inputs(&mut self) {
        for client in self.clients.values_mut() {
            client
                .pending_inputs
                .retain(|input| input.sequence > client.last_processed_input);
        }
    }

    /// Removes clients that have been silent longer than the timeout
    ///
    /// Each dropped client is returned with its avatar so the server can
    /// destroy the entity and tell everyone else.
    pub fn check_timeouts(&mut self) -> Vec<TimedOutClient> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(self.timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .into_iter()
            .map(|client_id| TimedOutClient {
                client_id,
                avatar: self.remove_client(&client_id),
            })
            .collect()
    }

    /// Client IDs and addresses, used to broadcast replication packets
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
