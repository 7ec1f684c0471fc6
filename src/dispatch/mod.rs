//! Delivery to the outbound channels.
//!
//! - [`Dispatcher`] owns the chatbox: deduplication plus the override gate
//! - [`PresenceRelay`] owns the presence channel: toggle plus rate limit

pub mod dispatcher;
pub mod gate;
pub mod presence;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use gate::OverrideGate;
pub use presence::{PresenceOutcome, PresenceRelay, PRESENCE_INTERVAL};
