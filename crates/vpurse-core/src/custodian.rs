//! Local custody of the value mirrored by a virtual purse

use serde::{Deserialize, Serialize};
use std::fmt;
use vpurse_issuer::{Issuer, IssuerError, Mint, Payment, PaymentRefused, Purse};
use vpurse_types::{Amount, AmountValue, Nat};

/// Which custody strategy a purse runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyStrategy {
    /// Burn on retain, mint on redeem
    Mint,
    /// Deposit on retain, withdraw on redeem
    Escrow,
}

impl fmt::Display for CustodyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mint => write!(f, "mint"),
            Self::Escrow => write!(f, "escrow"),
        }
    }
}

/// Holds or destroys local value on behalf of a virtual purse
///
/// Minting suits a purse that is the sole local authority for its brand.
/// Escrow is safer in general, but can only redeem what it has retained:
/// if the other side also mints, the escrow purse may run dry.
#[derive(Debug)]
pub enum AssetCustodian<V = Nat> {
    Mint { issuer: Issuer<V>, mint: Mint<V> },
    /// Escrow purse starts empty
    Escrow { purse: Purse<V> },
}

impl<V: AmountValue> AssetCustodian<V> {
    /// Choose the strategy once: mint if a mint is supplied, else escrow
    pub fn from_kit(issuer: &Issuer<V>, mint: Option<Mint<V>>) -> Self {
        match mint {
            Some(mint) => Self::Mint {
                issuer: issuer.clone(),
                mint,
            },
            None => Self::Escrow {
                purse: issuer.make_empty_purse(),
            },
        }
    }

    pub fn strategy(&self) -> CustodyStrategy {
        match self {
            Self::Mint { .. } => CustodyStrategy::Mint,
            Self::Escrow { .. } => CustodyStrategy::Escrow,
        }
    }

    /// Consume local value, returning the amount actually retained
    pub async fn retain(
        &self,
        payment: Payment,
        opt_amount: Option<&Amount<V>>,
    ) -> Result<Amount<V>, PaymentRefused> {
        match self {
            Self::Mint { issuer, .. } => issuer.burn(payment, opt_amount).await,
            Self::Escrow { purse } => purse.deposit(payment, opt_amount).await,
        }
    }

    /// Produce local value
    pub async fn redeem(&self, amount: Amount<V>) -> Result<Payment, IssuerError> {
        match self {
            Self::Mint { mint, .. } => mint.mint_payment(amount).await,
            Self::Escrow { purse } => purse.withdraw(amount).await,
        }
    }

    /// Value currently held locally; always empty under the mint strategy
    pub async fn escrowed(&self) -> Option<Amount<V>> {
        match self {
            Self::Mint { .. } => None,
            Self::Escrow { purse } => Some(purse.get_current_amount().await),
        }
    }
}
