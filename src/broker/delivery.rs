//! Outbound delivery to subscribers
//!
//! A delivery POSTs the full message as JSON to the subscriber's registered
//! address. Any 2xx response counts as accepted; any other status, or a
//! transport-level failure, is a delivery failure and makes the worker
//! schedule a retry.
//!
//! The worker bounds every call with its own timeout, so implementations
//! are not required to enforce one.

use std::future::Future;

use crate::broker::message::Message;
use crate::utils::error::{DeliveryError, DeliveryResult};

/// Sends a message to a single subscriber address.
pub trait Deliver: Send + Sync + 'static {
    fn deliver(
        &self,
        address: &str,
        message: &Message,
    ) -> impl Future<Output = DeliveryResult<()>> + Send;
}

/// Delivers over HTTP with a shared, connection-pooling `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpDeliverer {
    client: reqwest::Client,
}

impl HttpDeliverer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Deliver for HttpDeliverer {
    async fn deliver(&self, address: &str, message: &Message) -> DeliveryResult<()> {
        let body = serde_json::to_vec(message)?;

        let response = self
            .client
            .post(address)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
