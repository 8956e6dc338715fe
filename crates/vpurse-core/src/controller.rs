//! The remote side of a virtual purse
//!
//! A [`VirtualPurseController`] is the only surface through which a purse
//! reaches its counterparty. It moves value in both directions and reports
//! the counterparty's view of the balance as a stream of snapshots.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use vpurse_types::{Amount, AmountValue, Brand, Nat};

/// Errors reported by a controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The counterparty refused the operation
    #[error("Controller rejected: {reason}")]
    Rejected { reason: String },

    /// The counterparty could not be reached
    #[error("Controller unavailable: {reason}")]
    Unavailable { reason: String },

    /// The balance stream broke
    #[error("Balance stream failed: {reason}")]
    StreamFailed { reason: String },
}

/// One balance snapshot from the counterparty
///
/// Snapshots are absolute balances, not deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceUpdate<V = Nat> {
    Snapshot(Amount<V>),
    /// Last snapshot; the stream ends after it
    Final(Amount<V>),
}

impl<V> BalanceUpdate<V> {
    pub fn amount(&self) -> &Amount<V> {
        match self {
            Self::Snapshot(amount) | Self::Final(amount) => amount,
        }
    }
}

/// Lazy, non-restartable sequence of balance snapshots
pub type BalanceStream<V = Nat> = BoxStream<'static, Result<BalanceUpdate<V>, ControllerError>>;

/// The object that determines the remote behaviour of a virtual purse
///
/// # Failure policy
///
/// `push_amount` must never fail in normal operation. By the time a purse
/// pushes, the local value is already destroyed or escrowed and cannot be
/// returned. Implementations should sit on a transport with retries or
/// at-least-once delivery; the purse has no compensating protocol and
/// reports a failed push as fatal.
///
/// `pull_amount` may fail. Nothing has moved locally when it does.
#[async_trait]
pub trait VirtualPurseController<V: AmountValue = Nat>: Send + Sync + 'static {
    /// Send an amount from "us" to the "other side"
    async fn push_amount(&self, amount: Amount<V>) -> Result<(), ControllerError>;

    /// Bring an amount from the "other side" to "us"
    async fn pull_amount(&self, amount: Amount<V>) -> Result<(), ControllerError>;

    /// Subscribe to the counterparty's balance for `brand`
    async fn get_balances(&self, brand: &Brand) -> Result<BalanceStream<V>, ControllerError>;
}
