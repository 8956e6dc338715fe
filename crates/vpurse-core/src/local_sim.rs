//! LocalSim controller — an in-process counterparty for virtual purses.
//!
//! Mirrors one brand's balance the way a remote chain or vat would: pushes
//! credit the mirror, pulls debit it, and every change is published on a
//! balance stream. Used by tests and demos; supports failure injection for
//! each leg of the push/pull protocol.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::debug;
use vpurse_notifier::{make_notifier_kit, Notifier, NotifierError, Updater};
use vpurse_types::{Amount, AmountValue, Brand, Nat};

use crate::{BalanceStream, BalanceUpdate, ControllerError, VirtualPurseController};

/// A controller call, as seen by the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall<V = Nat> {
    Push(Amount<V>),
    Pull(Amount<V>),
    GetBalances(Brand),
}

#[derive(Debug, Clone)]
enum Injected {
    Once(String),
    Always(String),
}

/// Take the injected failure for one call, if any
fn trip(slot: &mut Option<Injected>) -> Option<String> {
    match slot.take() {
        Some(Injected::Once(reason)) => Some(reason),
        Some(Injected::Always(reason)) => {
            *slot = Some(Injected::Always(reason.clone()));
            Some(reason)
        }
        None => None,
    }
}

#[derive(Debug)]
struct SimState<V> {
    balance: Amount<V>,
    calls: Vec<SimCall<V>>,
    push_failure: Option<Injected>,
    pull_failure: Option<Injected>,
    balances_failure: Option<String>,
}

/// In-process counterparty mirroring a single brand
pub struct LocalSimController<V = Nat> {
    brand: Brand,
    state: Mutex<SimState<V>>,
    notifier: Notifier<Amount<V>>,
    updater: Updater<Amount<V>>,
}

impl<V: AmountValue> LocalSimController<V> {
    /// Start with an empty mirrored balance
    pub fn new(brand: Brand) -> Self {
        let (notifier, updater) = make_notifier_kit();
        let balance = Amount::empty(brand.clone());
        updater.update_state(balance.clone());
        Self {
            brand,
            state: Mutex::new(SimState {
                balance,
                calls: Vec::new(),
                push_failure: None,
                pull_failure: None,
                balances_failure: None,
            }),
            notifier,
            updater,
        }
    }

    /// The mirrored balance as the other side sees it
    pub async fn balance(&self) -> Amount<V> {
        self.state.lock().await.balance.clone()
    }

    /// Credit the mirror directly, as if value arrived from elsewhere
    pub async fn credit(&self, amount: Amount<V>) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        let balance = state.balance.checked_add(&amount).map_err(rejected)?;
        self.publish(&mut state, balance);
        Ok(())
    }

    pub async fn calls(&self) -> Vec<SimCall<V>> {
        self.state.lock().await.calls.clone()
    }

    pub async fn fail_next_push(&self, reason: impl Into<String>) {
        self.state.lock().await.push_failure = Some(Injected::Once(reason.into()));
    }

    pub async fn fail_pushes(&self, reason: impl Into<String>) {
        self.state.lock().await.push_failure = Some(Injected::Always(reason.into()));
    }

    pub async fn fail_next_pull(&self, reason: impl Into<String>) {
        self.state.lock().await.pull_failure = Some(Injected::Once(reason.into()));
    }

    /// Refuse new balance subscriptions
    pub async fn refuse_balances(&self, reason: impl Into<String>) {
        self.state.lock().await.balances_failure = Some(reason.into());
    }

    /// Break every live balance stream; terminal
    pub fn fail_balances(&self, reason: impl Into<String>) {
        self.updater.fail(reason);
    }

    /// End every live balance stream at the current balance
    pub async fn finish_balances(&self) {
        let state = self.state.lock().await;
        self.updater.finish(state.balance.clone());
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.push_failure = None;
        state.pull_failure = None;
        state.balances_failure = None;
    }

    fn publish(&self, state: &mut SimState<V>, balance: Amount<V>) {
        debug!("LocalSim {} balance {}", self.brand, balance);
        state.balance = balance.clone();
        self.updater.update_state(balance);
    }
}

fn rejected(e: impl std::fmt::Display) -> ControllerError {
    ControllerError::Rejected {
        reason: e.to_string(),
    }
}

#[async_trait]
impl<V: AmountValue> VirtualPurseController<V> for LocalSimController<V> {
    async fn push_amount(&self, amount: Amount<V>) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        state.calls.push(SimCall::Push(amount.clone()));
        if let Some(reason) = trip(&mut state.push_failure) {
            return Err(ControllerError::Unavailable { reason });
        }
        let balance = state.balance.checked_add(&amount).map_err(rejected)?;
        self.publish(&mut state, balance);
        Ok(())
    }

    async fn pull_amount(&self, amount: Amount<V>) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        state.calls.push(SimCall::Pull(amount.clone()));
        if let Some(reason) = trip(&mut state.pull_failure) {
            return Err(ControllerError::Unavailable { reason });
        }
        let balance = state.balance.checked_sub(&amount).map_err(rejected)?;
        self.publish(&mut state, balance);
        Ok(())
    }

    async fn get_balances(&self, brand: &Brand) -> Result<BalanceStream<V>, ControllerError> {
        let mut state = self.state.lock().await;
        state.calls.push(SimCall::GetBalances(brand.clone()));
        if brand != &self.brand {
            return Err(rejected(format!("no balances for brand {}", brand)));
        }
        if let Some(reason) = &state.balances_failure {
            return Err(ControllerError::Unavailable {
                reason: reason.clone(),
            });
        }

        let stream = self.notifier.updates().map(|next| match next {
            Ok(record) if record.is_final() => Ok(BalanceUpdate::Final(record.value)),
            Ok(record) => Ok(BalanceUpdate::Snapshot(record.value)),
            Err(NotifierError::Failed(reason)) => Err(ControllerError::StreamFailed { reason }),
            Err(NotifierError::Closed) => Err(ControllerError::StreamFailed {
                reason: "controller dropped".to_string(),
            }),
        });
        Ok(stream.boxed())
    }
}
