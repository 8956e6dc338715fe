//! vpurse Issuer - In-process asset issuance
//!
//! This crate implements the asset primitives a virtual purse custodies
//! locally. It follows the same rules a remote issuer would:
//!
//! 1. Every [`Payment`] is a single-use bearer object
//! 2. Only the [`Mint`] creates new supply; only `burn` destroys it
//! 3. [`Purse`]s move existing value and never change supply
//! 4. Issuance can be halted in an emergency
//!
//! # Usage
//!
//! ```ignore
//! let kit = IssuerKit::<Nat>::named("BLD");
//! let payment = kit.mint.mint_payment(Amount::make(kit.brand.clone(), 837)).await?;
//! let purse = kit.issuer.make_empty_purse();
//! purse.deposit(payment, None).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;
use vpurse_types::{Amount, AmountError, AmountValue, Brand, Nat};

/// Errors that can occur during issuer operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssuerError {
    #[error("Payment {payment_id} is not live")]
    PaymentNotLive { payment_id: String },

    #[error("Amount mismatch: expected {expected}, payment holds {actual}")]
    AmountMismatch { expected: String, actual: String },

    #[error("Insufficient funds: trying to withdraw {requested}, but only {available} held")]
    InsufficientFunds { requested: String, available: String },

    #[error("Issuer halted: {reason}")]
    IssuerHalted { reason: String },

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),
}

pub type Result<T> = std::result::Result<T, IssuerError>;

/// A payment the issuer declined to consume
///
/// The payment is handed back untouched so the caller keeps its value.
#[derive(Error, Debug)]
#[error("Payment {} refused: {error}", .payment.id())]
pub struct PaymentRefused {
    pub payment: Payment,
    #[source]
    pub error: IssuerError,
}

impl PaymentRefused {
    pub fn into_parts(self) -> (Payment, IssuerError) {
        (self.payment, self.error)
    }
}

/// Configuration for an issuer kit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Alleged name of the brand
    pub name: String,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            name: "fungible".to_string(),
        }
    }
}

/// Single-use bearer object for an amount held in the issuer's ledger
///
/// Payments cannot be cloned or constructed outside this crate. The amount
/// lives in the ledger, keyed by id, until the payment is consumed.
#[derive(Debug, PartialEq, Eq)]
pub struct Payment {
    id: Uuid,
    brand: Brand,
}

impl Payment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The brand this payment claims to be of
    pub fn alleged_brand(&self) -> &Brand {
        &self.brand
    }
}

/// Internal state of the issuer
#[derive(Debug)]
struct Ledger<V> {
    /// Live payments and the magnitudes they carry
    payments: HashMap<Uuid, V>,
    /// Minted minus burned
    total_supply: V,
    halt_reason: Option<String>,
}

impl<V: AmountValue> Ledger<V> {
    fn check_running(&self) -> Result<()> {
        match &self.halt_reason {
            Some(reason) => Err(IssuerError::IssuerHalted {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Everything needed to operate one brand
pub struct IssuerKit<V = Nat> {
    pub brand: Brand,
    pub issuer: Issuer<V>,
    pub mint: Mint<V>,
}

impl<V: AmountValue> IssuerKit<V> {
    pub fn new(config: IssuerConfig) -> Self {
        let brand = Brand::new(config.name);
        let issuer = Issuer {
            brand: brand.clone(),
            ledger: Arc::new(RwLock::new(Ledger {
                payments: HashMap::new(),
                total_supply: V::empty(),
                halt_reason: None,
            })),
        };
        let mint = Mint {
            issuer: issuer.clone(),
        };
        Self {
            brand,
            issuer,
            mint,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(IssuerConfig { name: name.into() })
    }
}

/// Read and consume authority over a brand's payments
#[derive(Debug)]
pub struct Issuer<V = Nat> {
    brand: Brand,
    ledger: Arc<RwLock<Ledger<V>>>,
}

impl<V> Clone for Issuer<V> {
    fn clone(&self) -> Self {
        Self {
            brand: self.brand.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<V: AmountValue> Issuer<V> {
    pub fn get_brand(&self) -> &Brand {
        &self.brand
    }

    /// Whether the payment is still unconsumed in this issuer's ledger
    pub async fn is_live(&self, payment: &Payment) -> bool {
        payment.brand == self.brand && self.ledger.read().await.payments.contains_key(&payment.id)
    }

    pub async fn get_amount_of(&self, payment: &Payment) -> Result<Amount<V>> {
        let ledger = self.ledger.read().await;
        self.check_payment(&ledger, payment, None)
    }

    /// Destroy a payment and its value
    pub async fn burn(
        &self,
        payment: Payment,
        opt_amount: Option<&Amount<V>>,
    ) -> std::result::Result<Amount<V>, PaymentRefused> {
        let mut ledger = self.ledger.write().await;
        let checked = ledger.check_running().and_then(|_| {
            let amount = self.check_payment(&ledger, &payment, opt_amount)?;
            let remaining = ledger
                .total_supply
                .checked_sub(&amount.value)
                .ok_or_else(|| AmountError::Underflow {
                    left: format!("{:?}", ledger.total_supply),
                    right: amount.to_string(),
                })?;
            Ok((amount, remaining))
        });

        match checked {
            Ok((amount, remaining)) => {
                ledger.payments.remove(&payment.id);
                ledger.total_supply = remaining;
                Ok(amount)
            }
            Err(error) => Err(PaymentRefused { payment, error }),
        }
    }

    /// Exchange a payment for a fresh one of the same amount
    pub async fn claim(
        &self,
        payment: Payment,
        opt_amount: Option<&Amount<V>>,
    ) -> std::result::Result<Payment, PaymentRefused> {
        let mut ledger = self.ledger.write().await;
        match self.check_payment(&ledger, &payment, opt_amount) {
            Ok(amount) => {
                ledger.payments.remove(&payment.id);
                Ok(self.issue(&mut ledger, amount.value))
            }
            Err(error) => Err(PaymentRefused { payment, error }),
        }
    }

    pub fn make_empty_purse(&self) -> Purse<V> {
        Purse {
            issuer: self.clone(),
            balance: Arc::new(RwLock::new(V::empty())),
        }
    }

    async fn consume(
        &self,
        payment: Payment,
        opt_amount: Option<&Amount<V>>,
    ) -> std::result::Result<Amount<V>, PaymentRefused> {
        let mut ledger = self.ledger.write().await;
        match self.check_payment(&ledger, &payment, opt_amount) {
            Ok(amount) => {
                ledger.payments.remove(&payment.id);
                Ok(amount)
            }
            Err(error) => Err(PaymentRefused { payment, error }),
        }
    }

    async fn issue_payment(&self, value: V) -> Payment {
        let mut ledger = self.ledger.write().await;
        self.issue(&mut ledger, value)
    }

    fn issue(&self, ledger: &mut Ledger<V>, value: V) -> Payment {
        let id = Uuid::new_v4();
        ledger.payments.insert(id, value);
        Payment {
            id,
            brand: self.brand.clone(),
        }
    }

    fn check_payment(
        &self,
        ledger: &Ledger<V>,
        payment: &Payment,
        opt_amount: Option<&Amount<V>>,
    ) -> Result<Amount<V>> {
        if payment.brand != self.brand {
            return Err(AmountError::BrandMismatch {
                expected: self.brand.to_string(),
                actual: payment.brand.to_string(),
            }
            .into());
        }
        let value = ledger
            .payments
            .get(&payment.id)
            .ok_or_else(|| IssuerError::PaymentNotLive {
                payment_id: payment.id.to_string(),
            })?;
        let amount = Amount::make(self.brand.clone(), value.clone());

        if let Some(expected) = opt_amount {
            let expected = expected.clone().coerce(&self.brand)?;
            if !amount.is_equal(&expected)? {
                return Err(IssuerError::AmountMismatch {
                    expected: expected.to_string(),
                    actual: amount.to_string(),
                });
            }
        }
        Ok(amount)
    }
}

/// Authority to create new supply
#[derive(Debug)]
pub struct Mint<V = Nat> {
    issuer: Issuer<V>,
}

impl<V> Clone for Mint<V> {
    fn clone(&self) -> Self {
        Self {
            issuer: self.issuer.clone(),
        }
    }
}

impl<V: AmountValue> Mint<V> {
    pub fn get_issuer(&self) -> &Issuer<V> {
        &self.issuer
    }

    pub async fn mint_payment(&self, amount: Amount<V>) -> Result<Payment> {
        let amount = amount.coerce(&self.issuer.brand)?;
        let mut ledger = self.issuer.ledger.write().await;
        ledger.check_running()?;
        ledger.total_supply = ledger
            .total_supply
            .checked_add(&amount.value)
            .ok_or_else(|| AmountError::Overflow {
                left: format!("{:?}", ledger.total_supply),
                right: amount.to_string(),
            })?;
        Ok(self.issuer.issue(&mut ledger, amount.value))
    }

    pub async fn total_supply(&self) -> Amount<V> {
        let ledger = self.issuer.ledger.read().await;
        Amount::make(self.issuer.brand.clone(), ledger.total_supply.clone())
    }

    /// Halt minting and burning (emergency stop)
    pub async fn halt(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Issuer '{}' halted: {}", self.issuer.brand, reason);
        self.issuer.ledger.write().await.halt_reason = Some(reason);
    }

    pub async fn resume(&self) {
        tracing::info!("Issuer '{}' resumed", self.issuer.brand);
        self.issuer.ledger.write().await.halt_reason = None;
    }

    pub async fn is_halted(&self) -> bool {
        self.issuer.ledger.read().await.halt_reason.is_some()
    }
}

/// Holds existing value of one brand
#[derive(Debug)]
pub struct Purse<V = Nat> {
    issuer: Issuer<V>,
    balance: Arc<RwLock<V>>,
}

impl<V> Clone for Purse<V> {
    fn clone(&self) -> Self {
        Self {
            issuer: self.issuer.clone(),
            balance: self.balance.clone(),
        }
    }
}

impl<V: AmountValue> Purse<V> {
    pub async fn get_current_amount(&self) -> Amount<V> {
        Amount::make(self.issuer.brand.clone(), self.balance.read().await.clone())
    }

    /// Consume a payment into this purse, returning the amount added
    pub async fn deposit(
        &self,
        payment: Payment,
        opt_amount: Option<&Amount<V>>,
    ) -> std::result::Result<Amount<V>, PaymentRefused> {
        let mut balance = self.balance.write().await;
        let sum = match self.issuer.get_amount_of(&payment).await {
            Ok(amount) => balance.checked_add(&amount.value).ok_or_else(|| {
                IssuerError::from(AmountError::Overflow {
                    left: format!("{:?}", *balance),
                    right: amount.to_string(),
                })
            }),
            Err(error) => Err(error),
        };
        let sum = match sum {
            Ok(sum) => sum,
            Err(error) => return Err(PaymentRefused { payment, error }),
        };

        let amount = self.issuer.consume(payment, opt_amount).await?;
        *balance = sum;
        Ok(amount)
    }

    pub async fn withdraw(&self, amount: Amount<V>) -> Result<Payment> {
        let amount = amount.coerce(&self.issuer.brand)?;
        {
            let mut balance = self.balance.write().await;
            *balance = balance.checked_sub(&amount.value).ok_or_else(|| {
                IssuerError::InsufficientFunds {
                    requested: amount.to_string(),
                    available: format!("{:?} {}", *balance, self.issuer.brand),
                }
            })?;
        }
        Ok(self.issuer.issue_payment(amount.value).await)
    }
}
