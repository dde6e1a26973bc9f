//! Minecraft server address resolution and status pinging.
//!
//! [`address`] turns a typed server address into a connectable endpoint,
//! honoring `_minecraft._tcp` SRV redirects. [`pinger`] runs the Server List
//! Ping against the result.

pub mod address;
pub mod config;
pub mod metrics;
pub mod pinger;
pub mod scheduler;
