//! # ShardSub
//!
//! `shardsub` is a lightweight publish/subscribe broker. Clients create named
//! topics, subscribe callback addresses to them, and publish messages that
//! are delivered to one randomly chosen subscriber. Failed deliveries are
//! retried with exponential backoff.
//!
//! Topics are hashed onto a fixed set of partitions. Each partition is served
//! by a single worker task that exclusively owns the subscription state for
//! its topics, so no locks guard the subscription tables.
//!
//! ## Core Modules
//!
//! - `broker`: partitioning, routing, partition workers and retry scheduling.
//! - `client`: a WebSocket ingress client.
//! - `config`: loading and merging server configuration.
//! - `persistence`: batched archival of processed messages (backed by `sled`).
//! - `transport`: the WebSocket ingress server.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod persistence;
pub mod transport;
pub mod utils;
