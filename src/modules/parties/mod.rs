// Parties module (agents, clients, partners; read-only directory port)

pub mod models;
pub mod repositories;

pub use models::{Agent, Client, Partner, PartnershipStatus, Recipient};
pub use repositories::PartyDirectory;
