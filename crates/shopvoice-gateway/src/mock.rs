//! Scripted gateway for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shopvoice_core::TurnResponse;
use tokio::sync::Notify;

use crate::error::GatewayError;
use crate::RemoteGateway;

#[derive(Debug, Default)]
struct Inner {
    held: bool,
    script: Mutex<VecDeque<Result<TurnResponse, GatewayError>>>,
    requests: Mutex<Vec<String>>,
    release: Notify,
}

/// Gateway that answers from a script and records every request text.
///
/// An exhausted script answers with a network error. A held gateway
/// waits for `release` before each answer.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    inner: Arc<Inner>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held() -> Self {
        Self {
            inner: Arc::new(Inner {
                held: true,
                ..Inner::default()
            }),
        }
    }

    pub fn with_response(self, response: TurnResponse) -> Self {
        self.push(Ok(response));
        self
    }

    pub fn with_reply(self, reply: &str) -> Self {
        self.with_response(TurnResponse::reply(reply))
    }

    pub fn with_error(self, error: GatewayError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, result: Result<TurnResponse, GatewayError>) {
        self.inner
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(result);
    }

    /// Let one held request answer.
    pub fn release(&self) {
        self.inner.release.notify_one();
    }

    /// Texts received so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn send_turn(&self, text: &str) -> Result<TurnResponse, GatewayError> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(text.to_string());
        if self.inner.held {
            self.inner.release.notified().await;
        }
        self.inner
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Network("no scripted response".to_string())))
    }
}
