use crate::game::ReplicaWorld;
use log::{debug, error, info, warn};
use shared::{
    decode_packet, encode_packet, EntityId, Packet, PlayerAction, MAX_PACKET_SIZE,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);
const ACTION_INTERVAL: Duration = Duration::from_millis(250);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().min(u64::MAX as u128) as u64)
        .unwrap_or(0)
}

/// Headless client that mirrors the server's entities
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    avatar: Option<EntityId>,
    connected: bool,

    world: ReplicaWorld,
    next_sequence: u32,
    auto_attack: bool,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        auto_attack: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            avatar: None,
            connected: false,
            world: ReplicaWorld::new(),
            next_sequence: 1,
            auto_attack,
        })
    }

    pub fn world(&self) -> &ReplicaWorld {
        &self.world
    }

    pub fn avatar(&self) -> Option<EntityId> {
        self.avatar
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = encode_packet(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id, avatar } => {
                info!("Connected! Client ID: {}, avatar {:?}", client_id, avatar);
                self.client_id = Some(client_id);
                self.avatar = Some(avatar);
                self.connected = true;
            }

            Packet::EntitySpawned {
                entity,
                prototype,
                properties,
            } => {
                if let Err(e) = self.world.apply_spawn(entity, prototype, &properties) {
                    warn!("Failed to spawn {:?}: {}", entity, e);
                }
            }

            Packet::PropertyDelta {
                tick,
                entity,
                properties,
            } => match self.world.apply_delta(tick, entity, &properties) {
                Ok(applied) => debug!("Tick {}: {} changes to {:?}", tick, applied, entity),
                Err(e) => warn!("Bad delta for {:?} at tick {}: {}", entity, tick, e),
            },

            Packet::EntityDestroyed { entity } => {
                if self.world.destroy(entity) {
                    debug!("Destroyed {:?}", entity);
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.avatar = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Queues the next action for the avatar, if there is anything to do
    fn next_action(&self) -> Option<PlayerAction> {
        let avatar = self.avatar?;
        let replica = self.world.get(avatar)?;
        if replica.is_dead() {
            return None;
        }
        match self.world.pick_target(avatar) {
            Some(target) => Some(PlayerAction::Attack { target }),
            None => Some(PlayerAction::Rest),
        }
    }

    async fn send_action(&mut self, action: PlayerAction) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            return Ok(());
        }

        let packet = Packet::Input {
            sequence: self.next_sequence,
            timestamp: now_ms(),
            action,
        };
        self.next_sequence += 1;

        self.send_packet(&packet).await
    }

    fn log_world(&self) {
        let mut ids: Vec<EntityId> = self.world.entities().map(|replica| replica.id).collect();
        ids.sort();
        for id in ids {
            if let Some(description) = self.world.describe(id) {
                info!("{}", description);
            }
        }
    }

    /// Runs until `duration` elapses, or forever when it is None
    pub async fn run(&mut self, duration: Option<Duration>) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut keepalive_interval = interval(KEEPALIVE_INTERVAL);
        let mut action_interval = interval(ACTION_INTERVAL);
        let deadline = sleep(duration.unwrap_or(Duration::MAX));
        tokio::pin!(deadline);

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match decode_packet(&buffer[..len]) {
                            Ok(packet) => self.handle_packet(packet),
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = keepalive_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::KeepAlive).await {
                            error!("Error sending keepalive: {}", e);
                        }
                    }
                },

                _ = action_interval.tick(), if self.auto_attack => {
                    if let Some(action) = self.next_action() {
                        if let Err(e) = self.send_action(action).await {
                            error!("Error sending input: {}", e);
                        }
                    }
                },

                _ = &mut deadline => break,
            }
        }

        self.log_world();

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::encode_properties;
    use shared::prototypes::{PrototypeLibrary, AVATAR, TRAINING_DUMMY};

    async fn create_test_client() -> Client {
        Client::new("127.0.0.1:40002", true).await.unwrap()
    }

    fn spawn(entity: EntityId, prototype: shared::PrototypeId) -> Packet {
        let library = PrototypeLibrary::builtin();
        let defaults = library.defaults(prototype).unwrap();
        Packet::EntitySpawned {
            entity,
            prototype,
            properties: encode_properties(defaults, Some(defaults)).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_connected_sets_avatar() {
        let mut client = create_test_client().await;
        assert!(!client.is_connected());

        client.handle_packet(Packet::Connected {
            client_id: 3,
            avatar: EntityId(5),
        });

        assert!(client.is_connected());
        assert_eq!(client.avatar(), Some(EntityId(5)));
    }

    #[tokio::test]
    async fn test_replication_packets_update_world() {
        let mut client = create_test_client().await;
        client.handle_packet(spawn(EntityId(1), TRAINING_DUMMY));
        client.handle_packet(spawn(EntityId(2), AVATAR));
        assert_eq!(client.world().len(), 2);

        client.handle_packet(Packet::EntityDestroyed {
            entity: EntityId(1),
        });
        assert_eq!(client.world().len(), 1);
        assert!(client.world().get(EntityId(2)).is_some());
    }

    #[tokio::test]
    async fn test_next_action() {
        let mut client = create_test_client().await;
        assert_eq!(client.next_action(), None);

        client.handle_packet(Packet::Connected {
            client_id: 1,
            avatar: EntityId(2),
        });
        client.handle_packet(spawn(EntityId(2), AVATAR));
        assert_eq!(client.next_action(), Some(PlayerAction::Rest));

        client.handle_packet(spawn(EntityId(1), TRAINING_DUMMY));
        assert_eq!(
            client.next_action(),
            Some(PlayerAction::Attack {
                target: EntityId(1)
            })
        );
    }

    #[tokio::test]
    async fn test_disconnected_clears_session() {
        let mut client = create_test_client().await;
        client.handle_packet(Packet::Connected {
            client_id: 1,
            avatar: EntityId(2),
        });
        client.handle_packet(Packet::Disconnected {
            reason: "Server full".to_string(),
        });

        assert!(!client.is_connected());
        assert_eq!(client.avatar(), None);
    }
}
