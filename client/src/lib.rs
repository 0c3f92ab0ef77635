//! # Observer Client Library
//!
//! Headless client for the property replication demo. It connects to the
//! server, mirrors every entity it is told about in a [`game::ReplicaWorld`],
//! and can optionally drive its avatar by attacking whatever is alive.
//!
//! A replica starts as a copy of its prototype's default store. The spawn
//! payload and every later property delta are decoded in replication mode on
//! top of it, so only the values that differ ever cross the wire. A spawn
//! payload that fails to decode creates nothing. A delta that fails to decode
//! drops its replica: the server sends spawns only when a client connects, so
//! the entity stays missing until the client reconnects.
//!
//! ## Module Organization
//!
//! - `game`: the replica world and its update rules
//! - `network`: UDP socket handling, keepalives and the optional action loop

pub mod game;
pub mod network;
