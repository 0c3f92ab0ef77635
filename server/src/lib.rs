//! # Game Server Library
//!
//! Authoritative server for the property replication demo. The server owns
//! every entity, applies the actions clients send, and replicates property
//! changes back out over UDP.
//!
//! ## Replication Model
//!
//! Each entity is created from a prototype, whose flattened default store is
//! known to both ends. When a client connects it receives one
//! `EntitySpawned` packet per entity carrying only the properties that differ
//! from those defaults. After that, every property write made through
//! [`entity::Entity::set_property`] that actually changes a value is recorded,
//! and once per tick the recorded changes are sent as `PropertyDelta` packets.
//! Clients apply both kinds of payload on top of their replica in replication
//! mode, so ids a payload does not mention keep their current value.
//!
//! Removed properties are not replicated. Simulation code clears state by
//! writing a neutral value instead of removing the id.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection tracking, avatar ownership, input queues
//!   and timeouts
//! - `entity`: an entity's property store plus its change log
//! - `game`: combat, experience, regeneration and respawn rules
//! - `network`: UDP socket tasks and the fixed-rate tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         tick_duration: Duration::from_millis(50),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new("127.0.0.1:8080", config).await?;
//!
//!     // Receives packets, applies queued actions every tick, broadcasts
//!     // property deltas and drops clients that stop talking
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod entity;
pub mod game;
pub mod network;
