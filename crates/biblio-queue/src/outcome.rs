//! The per-message verdict a handler returns, decoupled from the broker
//! call it implies: the handler never acks or retries the transport
//! itself, keeping ack/retry decisions pure and unit-testable.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerOutcome {
    /// Processed successfully; acknowledge and discard.
    Ack,
    /// Permanently unprocessable (bad input, known-absent upstream record);
    /// acknowledge without retrying, since a retry would reproduce the same
    /// outcome.
    AckNoRetry,
    /// Transient failure; leave the message for redelivery.
    Retry { reason: String },
}
