//! Coherence protocol definitions.
//!
//! This module holds the pure-data and pure-function parts of the protocol:
//! 1. **Message Catalog:** The closed set of fifteen bus message kinds.
//! 2. **States:** The four MESI line states and their 2-bit encodings.
//! 3. **Transition Table:** The legal `(state, event)` rows and the messages they emit.
//!
//! Nothing here owns simulation state; controllers in [`crate::agent`] drive it.

/// Bus message kinds and the immutable `BusMessage` value.
pub mod message;

/// Per-line coherence states.
pub mod state;

/// Transition table and protocol policy.
pub mod transition;

pub use message::{BusMessage, MessageClass, MessageKind};
pub use state::CoherenceState;
pub use transition::{Event, Protocol, Transition};
