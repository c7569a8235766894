mod notice;

pub use notice::{Notice, OverdueNotice, ReminderNotice};
