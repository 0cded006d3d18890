pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod types;

pub use config::ShopVoiceConfig;
pub use error::{Result, ShopVoiceError};
pub use events::SessionEvent;
pub use session::{SessionState, SharedSession, TurnRejection, TurnTicket};
pub use types::*;
