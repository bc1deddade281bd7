pub mod controller;
pub mod store;
pub mod tick;

pub use controller::TickController;
pub use store::{ContextStore, TickTicket};
pub use tick::{NudgeEvent, TickLoop, TickOutcome};
