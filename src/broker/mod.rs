//! The `broker` module is the routing and concurrency core.
//!
//! Topics are hashed onto a fixed set of partitions ([`partition`]). Each
//! partition is served by exactly one [`worker`] task that owns the topic
//! tables for that partition, and the [`router`] feeds the workers through
//! bounded queues. Failed deliveries re-enter the same queue after an
//! exponential backoff ([`retry`]).

pub mod delivery;
pub mod engine;
pub mod message;
pub mod partition;
pub mod retry;
pub mod router;
pub mod topic;
pub mod worker;

pub use delivery::{Deliver, HttpDeliverer};
pub use engine::Broker;
pub use message::{Action, IngressRecord, Message, Status};
pub use router::{Enqueued, Router};
