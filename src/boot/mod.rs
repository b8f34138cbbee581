//! Staged bootstrap: phases, listeners, and the sequencer.

mod events;
mod phase;
mod sequencer;

pub use events::{Events, Listener, Signal};
pub use phase::{builtin_phases, names, order, Phase};
pub use sequencer::{PhaseResult, SequenceRun, Sequencer};
