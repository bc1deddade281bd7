pub mod messages;
pub mod scheduler;

pub use messages::{pick_message, pick_message_with, Tone};
pub use scheduler::{cooldown_elapsed, on_nudge_fired, should_nudge};
