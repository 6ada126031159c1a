//! Task queue port.
//!
//! Delivery contract is at-least-once: a leased message that is neither
//! acked nor failed (worker crash) comes back, and `fail` hands it back
//! explicitly. Bodies are opaque encoded blobs; decoding belongs to the
//! consumer (`domain::message::decode_body`).

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::QueueError;
use crate::observability::QueueCounts;

/// A leased message. The holder must finish with `ack` or `fail`.
///
/// Design intent (same split as the ledger): the queue owns message state;
/// the worker only executes and reports.
#[async_trait]
pub trait MessageLease: Send {
    /// Encoded body, untouched.
    fn body(&self) -> &str;

    /// How many times this message has been delivered, this lease included.
    fn receive_count(&self) -> u32;

    /// Delete the message permanently.
    async fn ack(self: Box<Self>) -> Result<(), QueueError>;

    /// Hand the message back; the queue decides redelivery or dead-letter.
    async fn fail(self: Box<Self>, error: String) -> Result<(), QueueError>;
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue an encoded body, optionally delaying its first delivery.
    async fn enqueue(&self, body: String, delay: Option<Duration>) -> Result<(), QueueError>;

    /// Lease one visible message, waiting until one is available.
    async fn lease(&self) -> Option<Box<dyn MessageLease>>;

    /// Observability hook.
    async fn counts(&self) -> QueueCounts;
}
