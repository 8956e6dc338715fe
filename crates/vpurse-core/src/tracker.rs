//! Balance observation
//!
//! The tracker owns a background task that drains the controller's balance
//! stream into a notifier kit. Readers never poll the controller; they wait
//! on the notifier's update counter.

use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use vpurse_notifier::{make_notifier_kit_with_history, Notifier, Updater};
use vpurse_types::{Amount, AmountValue, Brand, Nat};

use crate::{BalanceUpdate, PurseError, Result, VirtualPurseController};

/// Brand that may still be resolving, shareable between tasks
pub type SharedBrand = Shared<BoxFuture<'static, Brand>>;

/// Latest known balance of a virtual purse, or its terminal failure
pub struct BalanceTracker<V = Nat> {
    notifier: Notifier<Amount<V>>,
    updater: Updater<Amount<V>>,
    task: JoinHandle<()>,
}

impl<V: AmountValue> BalanceTracker<V> {
    /// Start observing `controller` for `brand`
    ///
    /// The empty amount is published as soon as the brand resolves, before
    /// the first snapshot arrives. The notifier keeps the last `history`
    /// balances. Must be called inside a tokio runtime.
    pub fn spawn(
        label: String,
        brand: SharedBrand,
        expected: Brand,
        controller: Arc<dyn VirtualPurseController<V>>,
        history: usize,
    ) -> Self {
        let (notifier, updater) = make_notifier_kit_with_history(history);
        let task = tokio::spawn(observe(label, brand, expected, controller, updater.clone()));
        Self {
            notifier,
            updater,
            task,
        }
    }

    /// Latest balance, or the failure that ended observation
    pub async fn current(&self) -> Result<Amount<V>> {
        self.notifier
            .get_current()
            .await
            .map_err(PurseError::BalanceUnavailable)
    }

    pub fn notifier(&self) -> Notifier<Amount<V>> {
        self.notifier.clone()
    }

    pub fn update_count(&self) -> u64 {
        self.notifier.update_count()
    }

    /// Stop serving balances; terminal
    pub fn fail(&self, reason: impl Into<String>) {
        self.updater.fail(reason);
        self.task.abort();
    }

    pub fn is_terminal(&self) -> bool {
        self.updater.is_terminal()
    }
}

impl<V> Drop for BalanceTracker<V> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn observe<V: AmountValue>(
    label: String,
    brand: SharedBrand,
    expected: Brand,
    controller: Arc<dyn VirtualPurseController<V>>,
    updater: Updater<Amount<V>>,
) {
    let brand = brand.await;
    if brand != expected {
        error!(
            "Virtual purse '{}': brand {} does not belong to the issuer of {}",
            label, brand, expected
        );
        updater.fail(format!("brand {} does not match issuer brand {}", brand, expected));
        return;
    }

    let mut latest = Amount::empty(brand.clone());
    updater.update_state(latest.clone());
    let mut first = true;

    let mut balances = match controller.get_balances(&brand).await {
        Ok(balances) => balances,
        Err(e) => {
            error!("Virtual purse '{}': cannot observe balances: {}", label, e);
            updater.fail(e.to_string());
            return;
        }
    };
    info!("Virtual purse '{}' observing {} balances", label, brand);

    while let Some(next) = balances.next().await {
        let update = match next {
            Ok(update) => update,
            Err(e) => {
                error!("Virtual purse '{}': balance stream failed: {}", label, e);
                updater.fail(e.to_string());
                return;
            }
        };

        let is_final = matches!(update, BalanceUpdate::Final(_));
        let amount = match update.amount().clone().coerce(&brand) {
            Ok(amount) => amount,
            Err(e) => {
                error!("Virtual purse '{}': foreign balance snapshot: {}", label, e);
                updater.fail(e.to_string());
                return;
            }
        };

        if is_final {
            debug!("Virtual purse '{}' final balance {}", label, amount);
            updater.finish(amount);
            return;
        }

        // The eager empty amount already stands for an empty first snapshot
        if std::mem::replace(&mut first, false) && amount == latest {
            continue;
        }
        debug!("Virtual purse '{}' balance {}", label, amount);
        if !updater.update_state(amount.clone()) {
            // Failed by the purse itself
            return;
        }
        latest = amount;
    }

    info!("Virtual purse '{}' balance stream ended at {}", label, latest);
    updater.finish(latest);
}
