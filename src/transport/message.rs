use serde::{Deserialize, Serialize};

use crate::broker::Enqueued;
use crate::utils::error::BrokerError;

/// Why an ingress record was not enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Malformed,
    Unroutable,
    Unavailable,
}

/// Acknowledgement sent back for every ingress frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServerMessage {
    Enqueued {
        id: u64,
        partition: usize,
    },
    Rejected {
        reason: RejectReason,
        detail: String,
    },
}

impl From<Enqueued> for ServerMessage {
    fn from(enqueued: Enqueued) -> Self {
        ServerMessage::Enqueued {
            id: enqueued.id,
            partition: enqueued.partition,
        }
    }
}

impl From<BrokerError> for ServerMessage {
    fn from(err: BrokerError) -> Self {
        let reason = match err {
            BrokerError::Malformed(_) | BrokerError::InvalidOperation { .. } => {
                RejectReason::Malformed
            }
            BrokerError::UnroutableTopic { .. } => RejectReason::Unroutable,
            BrokerError::QueueClosed { .. } | BrokerError::InvalidConfig(_) => {
                RejectReason::Unavailable
            }
        };
        ServerMessage::Rejected {
            reason,
            detail: err.to_string(),
        }
    }
}
