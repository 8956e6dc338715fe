use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use vpurse_core::{
    Amount, BalanceStream, BalanceUpdate, Brand, ControllerError, CustodyStrategy, ERef, FatalError,
    IssuerKit, LocalSimController, Nat, Notifier, PurseError, SimCall, UpdateRecord, VirtualPurse,
    VirtualPurseConfig, VirtualPurseController, VirtualPurseKit,
};
use vpurse_types::AmountError;
use vpurse_issuer::IssuerError;
use vpurse_notifier::NotifierError;

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("timed out waiting on the virtual purse")
}

struct Setup {
    kit: IssuerKit,
    sim: Arc<LocalSimController>,
    purse: VirtualPurse,
}

impl Setup {
    fn amount(&self, value: Nat) -> Amount {
        Amount::make(self.kit.brand.clone(), value)
    }

    async fn pay(&self, value: Nat) -> vpurse_core::Payment {
        self.kit.mint.mint_payment(self.amount(value)).await.unwrap()
    }

    async fn next_update(&self, since: Option<u64>) -> UpdateRecord<Amount> {
        within(self.purse.get_current_amount_notifier().get_update_since(since))
            .await
            .unwrap()
    }

    /// Follow the notifier until the balance reaches `value`
    async fn settle_at(&self, value: Nat) {
        let expected = self.amount(value);
        let notifier = self.purse.get_current_amount_notifier();
        within(async {
            let mut since = None;
            loop {
                let record = notifier.get_update_since(since).await.unwrap();
                if record.value == expected {
                    return;
                }
                since = record.update_count;
            }
        })
        .await
    }

    async fn transfers(&self) -> Vec<SimCall> {
        self.sim
            .calls()
            .await
            .into_iter()
            .filter(|call| !matches!(call, SimCall::GetBalances(_)))
            .collect()
    }
}

fn setup_with(strategy: CustodyStrategy) -> Setup {
    init_tracing();
    let kit = IssuerKit::<Nat>::named("fungible");
    let sim = Arc::new(LocalSimController::new(kit.brand.clone()));
    let purse_kit = VirtualPurseKit {
        brand: kit.brand.clone().into(),
        issuer: kit.issuer.clone(),
        mint: match strategy {
            CustodyStrategy::Mint => Some(kit.mint.clone()),
            CustodyStrategy::Escrow => None,
        },
    };
    let purse = VirtualPurse::new(sim.clone(), purse_kit, VirtualPurseConfig::labeled("test")).unwrap();
    Setup { kit, sim, purse }
}

fn setup() -> Setup {
    setup_with(CustodyStrategy::Mint)
}

#[tokio::test]
async fn test_deposit_then_withdraw_round_trip() {
    let s = setup();
    let payment = s.pay(837).await;

    let initial = s.next_update(None).await;
    assert!(initial.value.is_empty(), "empty purse is empty");
    assert_eq!(within(s.purse.get_current_amount()).await.unwrap(), initial.value);
    assert_eq!(s.purse.get_alleged_brand().await, s.kit.brand);
    assert_eq!(s.purse.custody_strategy(), CustodyStrategy::Mint);

    let deposited = s.purse.deposit(payment, Some(s.amount(837))).await.unwrap();
    assert_eq!(deposited, s.amount(837));

    let after_deposit = s.next_update(initial.update_count).await;
    assert_eq!(after_deposit.value, s.amount(837));
    assert_eq!(s.purse.get_current_amount().await.unwrap(), s.amount(837));

    let withdrawn = s.purse.withdraw(s.amount(837)).await.unwrap();
    assert_eq!(
        s.kit.issuer.get_amount_of(&withdrawn).await.unwrap(),
        s.amount(837)
    );

    let after_withdraw = s.next_update(after_deposit.update_count).await;
    assert!(after_withdraw.value.is_empty(), "the purse is empty again");
    assert!(s.purse.get_current_amount().await.unwrap().is_empty());

    assert_eq!(
        s.transfers().await,
        vec![SimCall::Push(s.amount(837)), SimCall::Pull(s.amount(837))]
    );
}

#[tokio::test]
async fn test_sequential_deposits_are_observed_in_order() {
    let s = setup();
    let payment17 = s.pay(17).await;
    let payment25 = s.pay(25).await;

    let first = s.next_update(None).await;
    assert!(first.value.is_empty());

    let result = s.purse.deposit(payment17, Some(s.amount(17))).await.unwrap();
    assert_eq!(result, s.amount(17));
    let second = s.next_update(first.update_count).await;
    assert_eq!(second.value, s.amount(17));

    let result = s.purse.deposit(payment25, Some(s.amount(25))).await.unwrap();
    assert_eq!(result, s.amount(25));
    let third = s.next_update(second.update_count).await;
    assert_eq!(third.value, s.amount(42));

    // Replaying the whole history sees every balance exactly once
    let mut seen = Vec::new();
    let mut since = Some(0);
    while seen.len() < 3 {
        let record = s.next_update(since).await;
        seen.push(record.value.value);
        since = record.update_count;
    }
    assert_eq!(seen, vec![0, 17, 42]);
    assert_eq!(s.purse.get_current_amount_notifier().update_count(), 3);
}

#[tokio::test]
async fn test_deposit_rejects_unsettled_payment() {
    let s = setup();
    let payment = s.pay(25).await;
    let issuer = s.kit.issuer.clone();
    let claimed = ERef::pending(async move { issuer.claim(payment, None).await.unwrap() });

    let err = s.purse.deposit(claimed, Some(s.amount(25))).await.unwrap_err();
    assert!(matches!(err, PurseError::UnsettledPayment));
    assert!(err.to_string().contains("does not accept unsettled payments"));
    assert!(err.is_recoverable());

    assert!(s.transfers().await.is_empty());
    assert!(s.purse.get_current_amount().await.unwrap().is_empty());
    assert_eq!(s.kit.mint.total_supply().await, s.amount(25));
}

#[tokio::test]
async fn test_deposit_facet_receive() {
    let s = setup();
    let payment = s.pay(25).await;
    let facet = s.purse.get_deposit_facet();

    let initial = s.next_update(None).await;
    let received = facet.receive(payment, None).await.unwrap();
    assert_eq!(received, s.amount(25));

    let update = s.next_update(initial.update_count).await;
    assert_eq!(update.value, s.amount(25));
    assert_eq!(s.purse.get_current_amount().await.unwrap(), s.amount(25));
}

#[tokio::test]
async fn test_retention_failure_returns_payment() -> anyhow::Result<()> {
    let s = setup();
    let payment = s.pay(25).await;

    let err = s.purse.deposit(payment, Some(s.amount(17))).await.unwrap_err();
    let refused = match err {
        PurseError::Retain(refused) => refused,
        other => panic!("expected retention failure, got {other}"),
    };
    assert!(matches!(refused.error, IssuerError::AmountMismatch { .. }));
    assert!(s.transfers().await.is_empty());
    assert!(!s.purse.is_fatal());

    // No value was at risk: the same payment deposits cleanly
    let (payment, _) = refused.into_parts();
    assert!(s.kit.issuer.is_live(&payment).await);
    let deposited = s.purse.deposit(payment, None).await?;
    assert_eq!(deposited, s.amount(25));
    s.settle_at(25).await;
    Ok(())
}

#[tokio::test]
async fn test_foreign_payment_is_refused() {
    let s = setup();
    let other = IssuerKit::<Nat>::named("fungible");
    let payment = other
        .mint
        .mint_payment(Amount::make(other.brand.clone(), 5))
        .await
        .unwrap();

    let err = s.purse.deposit(payment, None).await.unwrap_err();
    assert!(matches!(err, PurseError::Retain(_)));
    assert!(s.transfers().await.is_empty());
}

#[tokio::test]
async fn test_pull_failure_leaves_balance_unchanged() {
    let s = setup();
    s.purse.deposit(s.pay(50).await, None).await.unwrap();
    s.settle_at(50).await;
    let count = s.purse.get_current_amount_notifier().update_count();

    s.sim.fail_next_pull("link down").await;
    let err = s.purse.withdraw(s.amount(20)).await.unwrap_err();
    assert!(matches!(err, PurseError::Pull(ControllerError::Unavailable { .. })));
    assert!(err.is_recoverable());

    assert_eq!(s.purse.get_current_amount().await.unwrap(), s.amount(50));
    assert_eq!(s.purse.get_current_amount_notifier().update_count(), count);
    assert!(s.kit.mint.total_supply().await.is_empty());
}

#[tokio::test]
async fn test_pull_beyond_remote_balance_is_rejected() {
    let s = setup();
    s.purse.deposit(s.pay(10).await, None).await.unwrap();

    let err = s.purse.withdraw(s.amount(11)).await.unwrap_err();
    assert!(matches!(err, PurseError::Pull(ControllerError::Rejected { .. })));
    assert_eq!(s.sim.balance().await, s.amount(10));
}

#[tokio::test]
async fn test_redemption_failure_is_compensated() {
    let s = setup();
    s.purse.deposit(s.pay(50).await, None).await.unwrap();

    s.kit.mint.halt("Maintenance").await;
    let err = s.purse.withdraw(s.amount(20)).await.unwrap_err();
    assert!(matches!(err, PurseError::Redeem(IssuerError::IssuerHalted { .. })));
    assert!(!s.purse.is_fatal());

    assert_eq!(s.sim.balance().await, s.amount(50));
    s.settle_at(50).await;
    assert_eq!(
        s.transfers().await,
        vec![
            SimCall::Push(s.amount(50)),
            SimCall::Pull(s.amount(20)),
            SimCall::Push(s.amount(20)),
        ]
    );
}

#[tokio::test]
async fn test_escrow_over_withdraw_is_compensated() {
    let s = setup_with(CustodyStrategy::Escrow);
    assert_eq!(s.purse.custody_strategy(), CustodyStrategy::Escrow);

    // The other side holds value that was never escrowed here
    s.sim.credit(s.amount(100)).await.unwrap();
    s.settle_at(100).await;

    let err = s.purse.withdraw(s.amount(60)).await.unwrap_err();
    assert!(matches!(err, PurseError::Redeem(IssuerError::InsufficientFunds { .. })));
    assert_eq!(s.sim.balance().await, s.amount(100));
    s.settle_at(100).await;
}

#[tokio::test]
async fn test_escrow_round_trip() {
    let s = setup_with(CustodyStrategy::Escrow);
    let supply_before = s.kit.mint.total_supply().await;

    s.purse.deposit(s.pay(30).await, None).await.unwrap();
    s.settle_at(30).await;
    let payment = s.purse.withdraw(s.amount(30)).await.unwrap();
    s.settle_at(0).await;

    assert_eq!(s.kit.issuer.get_amount_of(&payment).await.unwrap(), s.amount(30));
    // Escrow moves value; only the initial mint created supply
    assert_eq!(
        s.kit.mint.total_supply().await,
        supply_before.checked_add(&s.amount(30)).unwrap()
    );
}

#[tokio::test]
async fn test_push_failure_after_retention_is_fatal() {
    let s = setup();
    let payment = s.pay(10).await;

    s.sim.fail_next_push("link down").await;
    let err = s.purse.deposit(payment, None).await.unwrap_err();
    assert!(matches!(err, PurseError::Fatal(FatalError::PushAfterRetain { .. })));
    assert!(err.is_fatal());
    assert!(s.purse.is_fatal());

    // The payment was burned before the push failed
    assert!(s.kit.mint.total_supply().await.is_empty());

    let current = s.purse.get_current_amount().await;
    assert!(matches!(
        current,
        Err(PurseError::BalanceUnavailable(NotifierError::Failed(_)))
    ));
    let subscribed = s.purse.get_current_amount_notifier().get_update_since(Some(0)).await;
    assert!(matches!(subscribed, Err(NotifierError::Failed(_))));
}

#[tokio::test]
async fn test_failed_compensation_is_fatal() {
    let s = setup();
    s.purse.deposit(s.pay(50).await, None).await.unwrap();

    s.kit.mint.halt("Maintenance").await;
    s.sim.fail_pushes("link down").await;
    let err = s.purse.withdraw(s.amount(20)).await.unwrap_err();
    match &err {
        PurseError::Fatal(FatalError::CompensationFailed { redeem, push, .. }) => {
            assert!(matches!(redeem, IssuerError::IssuerHalted { .. }));
            assert!(matches!(push, ControllerError::Unavailable { .. }));
        }
        other => panic!("expected failed compensation, got {other}"),
    }
    assert!(s.purse.is_fatal());
    assert!(s.purse.get_current_amount().await.is_err());
}

#[tokio::test]
async fn test_balance_stream_failure_is_terminal() {
    let s = setup();
    s.purse.deposit(s.pay(5).await, None).await.unwrap();
    s.settle_at(5).await;

    s.sim.fail_balances("counterparty crashed");
    let notifier = s.purse.get_current_amount_notifier();
    let since = notifier.update_count();
    let result = within(notifier.get_update_since(Some(since))).await;
    assert!(matches!(result, Err(NotifierError::Failed(reason)) if reason.contains("counterparty crashed")));

    for _ in 0..2 {
        assert!(matches!(
            s.purse.get_current_amount().await,
            Err(PurseError::BalanceUnavailable(_))
        ));
    }
    // Deposits still settle remotely; only observation is gone
    assert!(!s.purse.is_fatal());
}

#[tokio::test]
async fn test_balance_stream_finish_keeps_final_value() {
    let s = setup();
    s.purse.deposit(s.pay(7).await, None).await.unwrap();
    s.settle_at(7).await;

    s.sim.finish_balances().await;
    let notifier = s.purse.get_current_amount_notifier();
    let record = within(async {
        loop {
            let record = notifier.get_update_since(Some(notifier.update_count())).await.unwrap();
            if record.is_final() {
                return record;
            }
        }
    })
    .await;
    assert_eq!(record.value, s.amount(7));
    assert_eq!(s.purse.get_current_amount().await.unwrap(), s.amount(7));
}

#[tokio::test]
async fn test_refused_balance_subscription_fails_tracker() {
    init_tracing();
    let kit = IssuerKit::<Nat>::named("fungible");
    let sim = Arc::new(LocalSimController::new(kit.brand.clone()));
    sim.refuse_balances("not today").await;

    let purse = VirtualPurse::new(sim.clone(), kit.into(), VirtualPurseConfig::default()).unwrap();
    let notifier = purse.get_current_amount_notifier();
    let result = within(async {
        loop {
            match notifier.get_update_since(Some(notifier.update_count())).await {
                Err(e) => return e,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(matches!(result, NotifierError::Failed(_)));
    assert!(purse.get_current_amount().await.is_err());
}

#[tokio::test]
async fn test_brand_resolved_asynchronously() {
    init_tracing();
    let kit = IssuerKit::<Nat>::named("fungible");
    let sim = Arc::new(LocalSimController::new(kit.brand.clone()));
    let brand = kit.brand.clone();
    let pending_brand = ERef::pending(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        brand
    });

    let purse = VirtualPurse::new(
        sim,
        VirtualPurseKit {
            brand: pending_brand,
            issuer: kit.issuer.clone(),
            mint: Some(kit.mint.clone()),
        },
        VirtualPurseConfig::default(),
    )
    .unwrap();

    let current = within(purse.get_current_amount()).await.unwrap();
    assert_eq!(current, Amount::empty(kit.brand.clone()));
    assert_eq!(purse.get_alleged_brand().await, kit.brand);
}

#[tokio::test]
async fn test_wrong_brand_fails_tracker() {
    init_tracing();
    let kit = IssuerKit::<Nat>::named("fungible");
    let stranger = Brand::new("fungible");
    let sim = Arc::new(LocalSimController::new(kit.brand.clone()));

    let purse = VirtualPurse::new(
        sim,
        VirtualPurseKit {
            brand: stranger.into(),
            issuer: kit.issuer.clone(),
            mint: Some(kit.mint.clone()),
        },
        VirtualPurseConfig::default(),
    )
    .unwrap();

    assert!(within(purse.get_current_amount()).await.is_err());
}

#[tokio::test]
async fn test_mismatched_mint_is_rejected() {
    init_tracing();
    let ours = IssuerKit::<Nat>::named("fungible");
    let theirs = IssuerKit::<Nat>::named("fungible");
    let sim = Arc::new(LocalSimController::new(ours.brand.clone()));

    let result = VirtualPurse::new(
        sim,
        VirtualPurseKit {
            brand: ours.brand.clone().into(),
            issuer: ours.issuer.clone(),
            mint: Some(theirs.mint.clone()),
        },
        VirtualPurseConfig::default(),
    );
    assert!(matches!(result, Err(PurseError::Config { .. })));
}

#[tokio::test]
async fn test_withdraw_foreign_amount_rejected_before_pull() {
    let s = setup();
    let foreign = Amount::make(Brand::new("fungible"), 1u128);

    let err = s.purse.withdraw(foreign).await.unwrap_err();
    assert!(matches!(err, PurseError::Amount(_)));
    assert!(s.transfers().await.is_empty());
}

#[tokio::test]
async fn test_deposit_foreign_amount_rejected_before_retention() {
    let s = setup();
    let payment = s.pay(5).await;
    let foreign = Amount::make(Brand::new("x"), 5u128);

    let err = s.purse.deposit(payment, Some(foreign)).await.unwrap_err();
    assert!(matches!(err, PurseError::Amount(AmountError::BrandMismatch { .. })));
    assert!(err.is_recoverable());

    // Nothing was burned or pushed
    assert!(s.transfers().await.is_empty());
    assert_eq!(s.kit.mint.total_supply().await, s.amount(5));
    assert!(!s.purse.is_fatal());
}

/// Counterparty that replays a fixed balance stream and accepts every transfer
struct ScriptedController {
    brand: Brand,
    script: std::sync::Mutex<Option<Vec<Result<BalanceUpdate, ControllerError>>>>,
}

impl ScriptedController {
    fn new(brand: Brand, script: Vec<Result<BalanceUpdate, ControllerError>>) -> Arc<Self> {
        Arc::new(Self {
            brand,
            script: std::sync::Mutex::new(Some(script)),
        })
    }
}

#[async_trait]
impl VirtualPurseController for ScriptedController {
    async fn push_amount(&self, _amount: Amount) -> Result<(), ControllerError> {
        Ok(())
    }

    async fn pull_amount(&self, _amount: Amount) -> Result<(), ControllerError> {
        Ok(())
    }

    async fn get_balances(&self, brand: &Brand) -> Result<BalanceStream, ControllerError> {
        assert_eq!(brand, &self.brand);
        let script = self.script.lock().unwrap().take().unwrap_or_default();
        Ok(futures::stream::iter(script).boxed())
    }
}

fn scripted_purse(kit: &IssuerKit, script: Vec<Result<BalanceUpdate, ControllerError>>) -> VirtualPurse {
    init_tracing();
    let controller = ScriptedController::new(kit.brand.clone(), script);
    VirtualPurse::new(
        controller,
        VirtualPurseKit {
            brand: kit.brand.clone().into(),
            issuer: kit.issuer.clone(),
            mint: Some(kit.mint.clone()),
        },
        VirtualPurseConfig::default(),
    )
    .unwrap()
}

async fn final_record(notifier: &Notifier<Amount>) -> UpdateRecord<Amount> {
    within(async {
        let mut since = None;
        loop {
            let record = notifier.get_update_since(since).await.unwrap();
            if record.is_final() {
                return record;
            }
            since = record.update_count;
        }
    })
    .await
}

#[tokio::test]
async fn test_foreign_snapshot_fails_tracker() {
    let kit = IssuerKit::<Nat>::named("fungible");
    let stranger = Brand::new("fungible");
    let purse = scripted_purse(
        &kit,
        vec![
            Ok(BalanceUpdate::Snapshot(Amount::make(kit.brand.clone(), 5))),
            Ok(BalanceUpdate::Snapshot(Amount::make(stranger, 9))),
            Ok(BalanceUpdate::Snapshot(Amount::make(kit.brand.clone(), 11))),
        ],
    );

    let notifier = purse.get_current_amount_notifier();
    let failure = within(async {
        loop {
            match notifier.get_update_since(Some(notifier.update_count())).await {
                Err(e) => return e,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(matches!(failure, NotifierError::Failed(reason) if reason.contains("Brand mismatch")));

    // Terminal: the later valid snapshot is never served
    assert!(matches!(
        purse.get_current_amount().await,
        Err(PurseError::BalanceUnavailable(NotifierError::Failed(_)))
    ));
    assert!(notifier.get_update_since(Some(0)).await.is_err());
    assert_eq!(notifier.update_count(), 2);
}

#[tokio::test]
async fn test_stream_without_final_finishes_at_last_snapshot() {
    let kit = IssuerKit::<Nat>::named("fungible");
    let purse = scripted_purse(
        &kit,
        vec![
            Ok(BalanceUpdate::Snapshot(Amount::make(kit.brand.clone(), 5))),
            Ok(BalanceUpdate::Snapshot(Amount::make(kit.brand.clone(), 9))),
        ],
    );

    let record = final_record(&purse.get_current_amount_notifier()).await;
    assert_eq!(record.value, Amount::make(kit.brand.clone(), 9));
    assert_eq!(record.update_count, None);
    assert_eq!(
        purse.get_current_amount().await.unwrap(),
        Amount::make(kit.brand.clone(), 9)
    );
}

#[tokio::test]
async fn test_repeated_snapshots_each_count() {
    let kit = IssuerKit::<Nat>::named("fungible");
    let amount = |value: Nat| Amount::make(kit.brand.clone(), value);
    let purse = scripted_purse(
        &kit,
        vec![
            Ok(BalanceUpdate::Snapshot(amount(0))),
            Ok(BalanceUpdate::Snapshot(amount(5))),
            Ok(BalanceUpdate::Snapshot(amount(5))),
            Ok(BalanceUpdate::Final(amount(5))),
        ],
    );

    let notifier = purse.get_current_amount_notifier();
    final_record(&notifier).await;

    // Only the opening empty snapshot folds into the eager empty amount
    let mut seen = Vec::new();
    let mut since = Some(0);
    while let Some(count) = since {
        let record = notifier.get_update_since(Some(count)).await.unwrap();
        seen.push((record.value.value, record.update_count));
        since = record.update_count;
    }
    assert_eq!(
        seen,
        vec![(0, Some(1)), (5, Some(2)), (5, Some(3)), (5, None)]
    );
    assert_eq!(notifier.update_count(), 4);
}

#[tokio::test]
async fn test_interleaved_operations_conserve_value() {
    let s = setup();
    let mut payments = Vec::new();
    for value in [10u128, 20, 30, 40] {
        payments.push(s.pay(value).await);
    }
    let minted = s.kit.mint.total_supply().await;

    let deposits = payments
        .into_iter()
        .map(|payment| s.purse.deposit(payment, None));
    for result in futures::future::join_all(deposits).await {
        result.unwrap();
    }

    let withdrawals = [5u128, 15, 25].map(|value| s.purse.withdraw(s.amount(value)));
    let more = s.purse.deposit(s.pay(1).await, None);
    let (withdrawn, deposited) = tokio::join!(futures::future::join_all(withdrawals), more);
    deposited.unwrap();
    for payment in withdrawn {
        payment.unwrap();
    }

    // 100 + 1 deposited, 45 withdrawn
    assert_eq!(s.sim.balance().await, s.amount(56));
    s.settle_at(56).await;

    // Value is either circulating locally or mirrored remotely
    let local = s.kit.mint.total_supply().await;
    let total = local.checked_add(&s.sim.balance().await).unwrap();
    assert_eq!(total, minted.checked_add(&s.amount(1)).unwrap());
}

#[tokio::test]
async fn test_set_valued_virtual_purse() {
    init_tracing();
    let kit = IssuerKit::<BTreeSet<String>>::named("tickets");
    let sim = Arc::new(LocalSimController::<BTreeSet<String>>::new(kit.brand.clone()));
    let purse: VirtualPurse<BTreeSet<String>> =
        VirtualPurse::new(sim.clone(), VirtualPurseKit::escrow(kit.issuer.clone()), VirtualPurseConfig::default())
            .unwrap();

    let seats: BTreeSet<String> = ["1A", "1B", "2C"].iter().map(|s| s.to_string()).collect();
    let payment = kit
        .mint
        .mint_payment(Amount::make(kit.brand.clone(), seats.clone()))
        .await
        .unwrap();
    purse.deposit(payment, None).await.unwrap();

    let one: BTreeSet<String> = ["1B"].iter().map(|s| s.to_string()).collect();
    let ticket = purse
        .withdraw(Amount::make(kit.brand.clone(), one.clone()))
        .await
        .unwrap();
    assert_eq!(kit.issuer.get_amount_of(&ticket).await.unwrap().value, one);

    let remaining: BTreeSet<String> = ["1A", "2C"].iter().map(|s| s.to_string()).collect();
    assert_eq!(sim.balance().await.value, remaining);
}
