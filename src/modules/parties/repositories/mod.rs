pub mod party_directory;

pub use party_directory::{derive_partner_attribution, MySqlPartyDirectory, PartyDirectory};
