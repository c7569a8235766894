pub mod actor;
pub mod clock;
pub mod currency;
pub mod error;

pub use actor::{Actor, ActorRole};
pub use clock::{Clock, SystemClock};
pub use currency::Currency;
pub use error::{AppError, Result};
