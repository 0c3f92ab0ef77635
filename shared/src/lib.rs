use properties::{ArchiveMode, CodecError, PackArchive, PropertyStore, UnpackArchive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod kinds;
pub mod prototypes;

pub use prototypes::{Prototype, PrototypeId, PrototypeLibrary};

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TICK_RATE: u32 = 20;
pub const DEFAULT_MAX_CLIENTS: usize = 16;
pub const CLIENT_TIMEOUT_SECS: u64 = 5;
pub const MAX_PACKET_SIZE: usize = 2048;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Input {
        sequence: u32,
        timestamp: u64,
        action: PlayerAction,
    },
    /// Keeps an idle client from timing out
    KeepAlive,
    Disconnect,

    Connected {
        client_id: u32,
        avatar: EntityId,
    },
    /// Properties are replication-encoded against the prototype's defaults
    EntitySpawned {
        entity: EntityId,
        prototype: PrototypeId,
        properties: Vec<u8>,
    },
    /// Properties changed during a tick, replication-encoded
    PropertyDelta {
        tick: u32,
        entity: EntityId,
        properties: Vec<u8>,
    },
    EntityDestroyed {
        entity: EntityId,
    },
    Disconnected {
        reason: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    Attack { target: EntityId },
    Rest,
}

#[derive(Debug, Clone)]
pub struct InputState {
    pub sequence: u32,
    pub timestamp: u64,
    pub action: PlayerAction,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("packet encoding failed: {0}")]
    Packet(#[from] bincode::Error),
    #[error(transparent)]
    Properties(#[from] CodecError),
    #[error("unknown prototype {0:?}")]
    UnknownPrototype(PrototypeId),
    #[error("prototype {0:?} is already registered")]
    DuplicatePrototype(PrototypeId),
}

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    Ok(bincode::serialize(packet)?)
}

pub fn decode_packet(bytes: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Replication-encodes `store`, skipping values equal to `defaults`
pub fn encode_properties(
    store: &PropertyStore,
    defaults: Option<&PropertyStore>,
) -> Result<Vec<u8>, ProtocolError> {
    let mut ar = PackArchive::new(ArchiveMode::Replication);
    store.encode(&mut ar, defaults, kinds::registry())?;
    Ok(ar.finish().to_vec())
}

/// Applies a replication payload on top of `store`
///
/// On error `store` is left as it was.
pub fn apply_properties(store: &mut PropertyStore, bytes: &[u8]) -> Result<usize, ProtocolError> {
    let mut ar = UnpackArchive::new(bytes, ArchiveMode::Replication);
    Ok(store.decode(&mut ar, kinds::registry())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use properties::{PropertyId, PropertyValue};

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        let serialized = encode_packet(&packet).unwrap();
        let deserialized = decode_packet(&serialized).unwrap();

        match deserialized {
            Packet::Connect { client_version } => assert_eq!(client_version, PROTOCOL_VERSION),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_input() {
        let packet = Packet::Input {
            sequence: 123,
            timestamp: 456789,
            action: PlayerAction::Attack {
                target: EntityId(7),
            },
        };

        let serialized = encode_packet(&packet).unwrap();
        let deserialized = decode_packet(&serialized).unwrap();

        match deserialized {
            Packet::Input {
                sequence,
                timestamp,
                action,
            } => {
                assert_eq!(sequence, 123);
                assert_eq!(timestamp, 456789);
                assert_eq!(
                    action,
                    PlayerAction::Attack {
                        target: EntityId(7)
                    }
                );
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_spawn() {
        let library = PrototypeLibrary::builtin();
        let defaults = library.defaults(prototypes::AVATAR).unwrap();

        let mut store = defaults.clone();
        store.set(
            PropertyId::new(kinds::HEALTH),
            PropertyValue::from_i64(90),
        );

        let packet = Packet::EntitySpawned {
            entity: EntityId(3),
            prototype: prototypes::AVATAR,
            properties: encode_properties(&store, Some(defaults)).unwrap(),
        };
        let deserialized = decode_packet(&encode_packet(&packet).unwrap()).unwrap();
        assert_eq!(deserialized, packet);

        match deserialized {
            Packet::EntitySpawned {
                prototype,
                properties,
                ..
            } => {
                let mut replica = library.defaults(prototype).unwrap().clone();
                assert_eq!(apply_properties(&mut replica, &properties).unwrap(), 1);
                assert_eq!(replica, store);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_apply_corrupt_properties() {
        let mut store = PropertyStore::new();
        store.set(PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(10));
        let before = store.clone();

        let result = apply_properties(&mut store, &[3, 8]);
        assert!(matches!(result, Err(ProtocolError::Properties(_))));
        assert_eq!(store, before);
    }

    #[test]
    fn test_decode_malformed_packet() {
        assert!(decode_packet(&[]).is_err());
        assert!(decode_packet(&[0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_input_state_creation() {
        let input = InputState {
            sequence: 42,
            timestamp: 123456,
            action: PlayerAction::Rest,
        };

        assert_eq!(input.sequence, 42);
        assert_eq!(input.timestamp, 123456);
        assert_eq!(input.action, PlayerAction::Rest);
    }
}
