//! Conversational turn orchestration for ShopVoice.
//!
//! `TurnController` takes typed or spoken input through one turn: user
//! message, backend exchange, assistant reply, spoken playback.

pub mod controller;
pub mod error;

pub use controller::{TurnController, TurnOutcome};
pub use error::ChatError;
