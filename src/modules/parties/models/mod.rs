mod party;

pub use party::{Agent, Client, Partner, PartnershipStatus, Recipient};
