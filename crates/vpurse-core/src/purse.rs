//! The virtual purse
//!
//! A purse-shaped facade over value that actually lives with a remote
//! counterparty. Every deposit retains value locally and pushes it to the
//! other side; every withdrawal pulls it back and redeems it locally.
//!
//! Operations are not serialized against each other. Each one keeps its own
//! invariants when interleaved with others on the same purse.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, warn};
use vpurse_issuer::{Issuer, IssuerKit, Mint, Payment};
use vpurse_notifier::Notifier;
use vpurse_types::{Amount, AmountValue, Brand, ERef, Nat};

use crate::{
    AssetCustodian, BalanceTracker, CustodyStrategy, FatalError, PurseError, Result,
    SharedBrand, VirtualPurseConfig, VirtualPurseController,
};

/// The local issuer kit a virtual purse custodies with
///
/// Without a mint, the purse escrows local value instead of minting and
/// burning it.
pub struct VirtualPurseKit<V = Nat> {
    pub brand: ERef<Brand>,
    pub issuer: Issuer<V>,
    pub mint: Option<Mint<V>>,
}

impl<V: AmountValue> VirtualPurseKit<V> {
    /// Escrow-only kit for an issuer we cannot mint with
    pub fn escrow(issuer: Issuer<V>) -> Self {
        Self {
            brand: issuer.get_brand().clone().into(),
            issuer,
            mint: None,
        }
    }
}

impl<V: AmountValue> From<IssuerKit<V>> for VirtualPurseKit<V> {
    fn from(kit: IssuerKit<V>) -> Self {
        Self {
            brand: kit.brand.into(),
            issuer: kit.issuer,
            mint: Some(kit.mint),
        }
    }
}

struct Inner<V> {
    label: String,
    brand: SharedBrand,
    custodian: AssetCustodian<V>,
    controller: Arc<dyn VirtualPurseController<V>>,
    tracker: BalanceTracker<V>,
    fatal: AtomicBool,
}

/// A purse whose assets are mirrored by a remote controller
pub struct VirtualPurse<V = Nat> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for VirtualPurse<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: AmountValue> VirtualPurse<V> {
    /// Wire a custodian, the controller and a balance tracker together
    ///
    /// Must be called inside a tokio runtime; balance observation starts
    /// immediately.
    pub fn new(
        controller: Arc<dyn VirtualPurseController<V>>,
        kit: VirtualPurseKit<V>,
        config: VirtualPurseConfig,
    ) -> Result<Self> {
        let VirtualPurseKit {
            brand,
            issuer,
            mint,
        } = kit;

        if let Some(mint) = &mint {
            if mint.get_issuer().get_brand() != issuer.get_brand() {
                return Err(PurseError::Config {
                    message: format!(
                        "mint for {} does not belong to issuer of {}",
                        mint.get_issuer().get_brand(),
                        issuer.get_brand()
                    ),
                });
            }
        }

        let custodian = AssetCustodian::from_kit(&issuer, mint);
        let brand: SharedBrand = brand.resolve().boxed().shared();
        let tracker = BalanceTracker::spawn(
            config.label.clone(),
            brand.clone(),
            issuer.get_brand().clone(),
            controller.clone(),
            config.balance_history,
        );

        info!(
            "Virtual purse '{}' created for {} with {} custody",
            config.label,
            issuer.get_brand(),
            custodian.strategy()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                label: config.label,
                brand,
                custodian,
                controller,
                tracker,
                fatal: AtomicBool::new(false),
            }),
        })
    }

    pub async fn get_alleged_brand(&self) -> Brand {
        self.inner.brand.clone().await
    }

    /// Latest balance reported by the counterparty
    pub async fn get_current_amount(&self) -> Result<Amount<V>> {
        self.inner.tracker.current().await
    }

    pub fn get_current_amount_notifier(&self) -> Notifier<Amount<V>> {
        self.inner.tracker.notifier()
    }

    pub fn get_deposit_facet(&self) -> DepositFacet<V> {
        DepositFacet {
            inner: self.inner.clone(),
        }
    }

    pub fn custody_strategy(&self) -> CustodyStrategy {
        self.inner.custodian.strategy()
    }

    /// Whether this purse has hit a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.inner.fatal.load(Ordering::SeqCst)
    }

    /// Retain a settled payment locally and push its amount to the other side
    ///
    /// An unsettled payment or a foreign-brand `opt_amount` is rejected before
    /// custody is touched; the payment is dropped but stays live with its
    /// issuer.
    pub async fn deposit(
        &self,
        payment: impl Into<ERef<Payment>>,
        opt_amount: Option<Amount<V>>,
    ) -> Result<Amount<V>> {
        self.inner.deposit(payment.into(), opt_amount).await
    }

    /// Pull an amount from the other side and redeem it as a local payment
    pub async fn withdraw(&self, amount: Amount<V>) -> Result<Payment> {
        self.inner.withdraw(amount).await
    }
}

/// Deposit-only view of a virtual purse
pub struct DepositFacet<V = Nat> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for DepositFacet<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: AmountValue> DepositFacet<V> {
    pub async fn receive(
        &self,
        payment: impl Into<ERef<Payment>>,
        opt_amount: Option<Amount<V>>,
    ) -> Result<Amount<V>> {
        self.inner.deposit(payment.into(), opt_amount).await
    }
}

impl<V: AmountValue> Inner<V> {
    async fn deposit(&self, payment: ERef<Payment>, opt_amount: Option<Amount<V>>) -> Result<Amount<V>> {
        let payment = payment
            .into_ready()
            .map_err(|_| PurseError::UnsettledPayment)?;
        let brand = self.brand.clone().await;
        let opt_amount = opt_amount.map(|amount| amount.coerce(&brand)).transpose()?;

        // Retention consumes the payment; from here the push must succeed.
        let amount = self
            .custodian
            .retain(payment, opt_amount.as_ref())
            .await
            .map_err(|refused| {
                warn!("Virtual purse '{}' refused deposit: {}", self.label, refused);
                PurseError::Retain(refused)
            })?;

        if let Err(e) = self.controller.push_amount(amount.clone()).await {
            return Err(self.fatal(FatalError::PushAfterRetain {
                amount: amount.to_string(),
                source: e,
            }));
        }

        info!("Virtual purse '{}' deposited {}", self.label, amount);
        Ok(amount)
    }

    async fn withdraw(&self, amount: Amount<V>) -> Result<Payment> {
        let brand = self.brand.clone().await;
        let amount = amount.coerce(&brand)?;

        self.controller
            .pull_amount(amount.clone())
            .await
            .map_err(|e| {
                warn!("Virtual purse '{}' pull of {} failed: {}", self.label, amount, e);
                PurseError::Pull(e)
            })?;

        // The other side has released the amount; redeem it or send it back.
        match self.custodian.redeem(amount.clone()).await {
            Ok(payment) => {
                info!("Virtual purse '{}' withdrew {}", self.label, amount);
                Ok(payment)
            }
            Err(redeem) => {
                warn!(
                    "Virtual purse '{}' could not redeem {}: {}; pushing it back",
                    self.label, amount, redeem
                );
                match self.controller.push_amount(amount.clone()).await {
                    Ok(()) => Err(PurseError::Redeem(redeem)),
                    Err(push) => Err(self.fatal(FatalError::CompensationFailed {
                        amount: amount.to_string(),
                        redeem,
                        push,
                    })),
                }
            }
        }
    }

    fn fatal(&self, fatal: FatalError) -> PurseError {
        error!("Virtual purse '{}' FATAL: {}", self.label, fatal);
        self.fatal.store(true, Ordering::SeqCst);
        self.tracker.fail(fatal.to_string());
        PurseError::Fatal(fatal)
    }
}
