mod commission;

pub use commission::{Commission, CommissionStatus};
