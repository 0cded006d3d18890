pub mod error;
pub mod http;
pub mod mock;

use async_trait::async_trait;
use shopvoice_core::TurnResponse;

pub use error::GatewayError;
pub use http::HttpGateway;
pub use mock::MockGateway;

/// One request/response exchange with the assistant backend per turn.
///
/// Implementations never touch session state and never retry.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn send_turn(&self, text: &str) -> Result<TurnResponse, GatewayError>;
}
