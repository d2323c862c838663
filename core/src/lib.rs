//! econbot-core: the economy bot's domain engine.
//!
//! Everything here is platform-neutral. The chat gateway plugs in
//! through platform::Platform; bot-runner drives the engine over
//! NDJSON for local play and integration.

pub mod clock;
pub mod command;
pub mod company_subsystem;
pub mod config;
pub mod economy_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod moderation_subsystem;
pub mod platform;
pub mod quest;
pub mod quest_subsystem;
pub mod request_subsystem;
pub mod response;
pub mod rng;
pub mod robbery_subsystem;
pub mod store;
pub mod subsystem;
pub mod types;
pub mod utility_subsystem;
