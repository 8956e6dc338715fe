//! vpurse Core - Virtual purses mirrored by a remote controller
//!
//! A virtual purse looks like an ordinary purse (balance, deposit, withdraw,
//! balance notifier), but its assets live with a counterparty reached only
//! through push and pull:
//!
//! - [`VirtualPurseController`]: the counterparty contract
//! - [`AssetCustodian`]: mint/burn or escrow custody of local value
//! - [`BalanceTracker`]: gap-free observation of the remote balance
//! - [`VirtualPurse`]: deposit/withdraw with an asymmetric failure policy
//! - [`LocalSimController`]: in-process counterparty for tests and demos
//!
//! # Failure Policy
//!
//! 1. A failed pull is recoverable: nothing has moved yet
//! 2. A failed redemption after a pull is compensated by pushing back
//! 3. A failed push after local retention is fatal, as is a failed
//!    compensation; the purse stops serving balances afterwards

pub mod config;
pub mod controller;
pub mod custodian;
pub mod error;
pub mod local_sim;
pub mod purse;
pub mod tracker;

pub use config::*;
pub use controller::*;
pub use custodian::*;
pub use error::*;
pub use local_sim::*;
pub use purse::*;
pub use tracker::*;

pub use vpurse_issuer::{Issuer, IssuerKit, Mint, Payment};
pub use vpurse_notifier::{Notifier, UpdateRecord};
pub use vpurse_types::{Amount, AmountValue, Brand, ERef, Nat};
