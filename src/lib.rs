//! `Slimy` - Fight engine and presence backend for a creature-collection game
//!
//! Two concurrent in-memory subsystems sit at the core:
//!
//! - [`fight`]: turn-based combat with exactly-once move application per
//!   encounter
//! - [`presence`]: heartbeat registry answering "who is online" within a
//!   staleness bound
//!
//! Durable storage is reached only through the traits in [`durable`].

pub mod cli;
pub mod config;
pub mod durable;
pub mod error;
pub mod fight;
pub mod observability;
pub mod presence;
pub mod server;
pub mod transport;
