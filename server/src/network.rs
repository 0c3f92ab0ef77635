//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::{ClientManager, TimedOutClient};
use crate::entity::Entity;
use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{
    decode_packet, encode_packet, encode_properties, EntityId, InputState, Packet,
    CLIENT_TIMEOUT_SECS, DEFAULT_MAX_CLIENTS, DEFAULT_TICK_RATE, MAX_PACKET_SIZE,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
        avatar: Option<EntityId>,
    },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub client_timeout: Duration,
    /// Training dummies spawned at startup
    pub training_dummies: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs(1) / DEFAULT_TICK_RATE,
            max_clients: DEFAULT_MAX_CLIENTS,
            client_timeout: Duration::from_secs(CLIENT_TIMEOUT_SECS),
            training_dummies: 1,
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().min(i64::MAX as u128) as i64)
        .unwrap_or(0)
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let mut game_state = GameState::new();
        for _ in 0..config.training_dummies {
            game_state.spawn_training_dummy()?;
        }

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            game_state,
            tick_duration: config.tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender that can stop the server loop with [`ServerMessage::Shutdown`]
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode_packet(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for TimedOutClient { client_id, avatar } in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id, avatar }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = encode_packet(packet)?;
        if data.len() > MAX_PACKET_SIZE {
            warn!(
                "Packet of {} bytes to {} exceeds the receive buffer",
                data.len(),
                addr
            );
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn broadcast_packet(&self, packet: &Packet, exclude: Option<u32>) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket {
            packet: packet.clone(),
            exclude,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Full state of an entity, diffed against its prototype's defaults
    fn spawn_packet(&self, entity: &Entity) -> Option<Packet> {
        let defaults = self.game_state.prototypes().defaults(entity.prototype);
        match encode_properties(entity.properties(), defaults) {
            Ok(properties) => Some(Packet::EntitySpawned {
                entity: entity.id,
                prototype: entity.prototype,
                properties,
            }),
            Err(e) => {
                error!("Failed to encode properties of {:?}: {}", entity.id, e);
                None
            }
        }
    }

    /// Removes a departed client's avatar and tells everyone else
    async fn destroy_avatar(&mut self, avatar: Option<EntityId>) {
        let Some(entity) = avatar else {
            return;
        };
        if self.game_state.remove_entity(entity).is_some() {
            self.broadcast_packet(&Packet::EntityDestroyed { entity }, None)
                .await;
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            warn!(
                "Rejecting {}: protocol version {} (expected {})",
                addr, client_version, PROTOCOL_VERSION
            );
            let response = Packet::Disconnected {
                reason: format!(
                    "Protocol version mismatch: server {}, client {}",
                    PROTOCOL_VERSION, client_version
                ),
            };
            self.send_packet(&response, addr).await;
            return;
        }

        // Remove existing connection if present
        let stale_avatar = {
            let mut clients = self.clients.write().await;
            match clients.find_client_by_addr(addr) {
                Some(existing_id) => {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    clients.remove_client(&existing_id)
                }
                None => None,
            }
        };
        self.destroy_avatar(stale_avatar).await;

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let Some(client_id) = client_id else {
            let response = Packet::Disconnected {
                reason: "Server full".to_string(),
            };
            self.send_packet(&response, addr).await;
            return;
        };

        let avatar = match self.game_state.add_player(client_id, now_ms()) {
            Ok(avatar) => avatar,
            Err(e) => {
                error!("Failed to spawn avatar for client {}: {}", client_id, e);
                self.clients.write().await.remove_client(&client_id);
                let response = Packet::Disconnected {
                    reason: "Failed to spawn avatar".to_string(),
                };
                self.send_packet(&response, addr).await;
                return;
            }
        };
        self.clients.write().await.set_avatar(client_id, avatar);

        self.send_packet(&Packet::Connected { client_id, avatar }, addr)
            .await;

        let mut entities: Vec<&Entity> = self.game_state.entities().collect();
        entities.sort_by_key(|entity| entity.id);
        let spawns: Vec<Packet> = entities
            .into_iter()
            .filter_map(|entity| self.spawn_packet(entity))
            .collect();
        for packet in &spawns {
            self.send_packet(packet, addr).await;
        }

        if let Some(packet) = self
            .game_state
            .entity(avatar)
            .and_then(|entity| self.spawn_packet(entity))
        {
            self.broadcast_packet(&packet, Some(client_id)).await;
        }
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(client_version, addr).await;
            }

            Packet::Input {
                sequence,
                timestamp,
                action,
            } => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.add_input(
                        client_id,
                        InputState {
                            sequence,
                            timestamp,
                            action,
                        },
                    );
                }
            }

            Packet::KeepAlive => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.touch(client_id);
                }
            }

            Packet::Disconnect => {
                let avatar = {
                    let mut clients = self.clients.write().await;
                    match clients.find_client_by_addr(addr) {
                        Some(client_id) => clients.remove_client(&client_id),
                        None => None,
                    }
                };
                self.destroy_avatar(avatar).await;
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Applies queued actions in timestamp order across all clients
    async fn process_inputs(&mut self) {
        let mut clients = self.clients.write().await;
        let all_inputs = clients.get_chronological_inputs();
        if all_inputs.is_empty() {
            return;
        }

        for (client_id, input) in all_inputs {
            if let Some(avatar) = clients.avatar_of(client_id) {
                let outcome = self.game_state.apply_action(avatar, &input.action);
                debug!(
                    "Client {} input {}: {:?} -> {:?}",
                    client_id, input.sequence, input.action, outcome
                );
            }
            clients.mark_input_processed(client_id, input.sequence);
        }

        clients.cleanup_processed_inputs();
    }

    /// Sends every property that changed this tick to all clients
    async fn broadcast_deltas(&mut self) {
        let changes = self.game_state.collect_changes();
        if changes.is_empty() {
            return;
        }

        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };
        if client_count == 0 {
            return;
        }

        for (entity, store) in changes {
            match encode_properties(&store, None) {
                Ok(properties) => {
                    let packet = Packet::PropertyDelta {
                        tick: self.game_state.tick,
                        entity,
                        properties,
                    };
                    self.broadcast_packet(&packet, None).await;
                }
                Err(e) => error!("Failed to encode changes of {:?}: {}", entity, e),
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id, avatar }) => {
                            info!("Client {} timed out", client_id);
                            self.destroy_avatar(avatar).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.process_inputs().await;
                    self.game_state.update();
                    self.broadcast_deltas().await;

                    if self.game_state.tick % 100 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };
                        if client_count > 0 {
                            debug!("Tick {}: {} clients, {} entities",
                                   self.game_state.tick, client_count, self.game_state.len());
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
