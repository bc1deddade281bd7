pub mod accumulator;
pub mod state;

pub use accumulator::{is_passive, update};
pub use state::{BehaviorSample, DriftState, DriftTuning, PageMode};
