//! Error types for virtual purse operations
//!
//! Failures fall into three classes. Caller errors are rejected before any
//! state changes. Recoverable failures leave local and remote accounting
//! consistent. Fatal failures mean value may be stranded between the two
//! sides; they are never retried by the purse.

use thiserror::Error;
use vpurse_issuer::{IssuerError, PaymentRefused};
use vpurse_notifier::NotifierError;
use vpurse_types::AmountError;

use crate::ControllerError;

/// Irrecoverable conditions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// Local value was retained but the counterparty never received it
    #[error("Push of {amount} failed after local retention: {source}")]
    PushAfterRetain {
        amount: String,
        source: ControllerError,
    },

    /// Redemption failed after a pull, and sending the value back failed too
    #[error("Compensating push of {amount} failed ({push}) after redemption failed ({redeem})")]
    CompensationFailed {
        amount: String,
        redeem: IssuerError,
        push: ControllerError,
    },
}

/// Virtual purse errors
#[derive(Debug, Error)]
pub enum PurseError {
    /// Deposit was handed a payment that has not settled yet
    #[error("deposit does not accept unsettled payments; resolve the payment first, then deposit it")]
    UnsettledPayment,

    /// Local retention refused the payment; it is handed back unconsumed
    #[error("Retention failed: {0}")]
    Retain(#[source] PaymentRefused),

    /// Local redemption failed; the pulled amount was pushed back
    #[error("Redemption failed: {0}")]
    Redeem(#[source] IssuerError),

    /// The counterparty refused to release the amount
    #[error("Pull failed: {0}")]
    Pull(#[source] ControllerError),

    #[error("Fatal: {0}")]
    Fatal(#[from] FatalError),

    /// The balance can no longer be observed
    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(#[from] NotifierError),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PurseError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Whether local and remote accounting are known to still agree
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal() && !matches!(self, Self::BalanceUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, PurseError>;
