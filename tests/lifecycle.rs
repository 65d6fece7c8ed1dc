#![allow(non_snake_case)]

use ethers::types::{
    Address,
    H256,
};
use lottery_dashboard::{
    ActionKind,
    PendingAction,
    SyncController,
    SyncState,
    contract::TxReceipt,
    error::LotteryError,
    test_helpers::{
        FakeLottery,
        FakeWalletProvider,
        fee_wei,
    },
    wallet::{
        AccountEvent,
        ConnectAuth,
    },
};
use tokio::sync::mpsc;

fn receipt(block: u64) -> TxReceipt {
    TxReceipt {
        tx_hash: H256::from_low_u64_be(0xfeed),
        block_number: Some(block),
    }
}

struct Harness {
    controller: SyncController<FakeWalletProvider>,
    outcomes: mpsc::UnboundedReceiver<lottery_dashboard::controller::ActionOutcome>,
    account_events: mpsc::UnboundedReceiver<AccountEvent>,
    lottery: FakeLottery,
}

impl Harness {
    fn new() -> Self {
        let lottery = FakeLottery::default();
        lottery.set_chain_state(fee_wei("0.01"), 3, Address::zero());
        let wallet = FakeWalletProvider::new(lottery.clone())
            .with_locked_account("alice", 1, "correct horse")
            .with_authorized_account("bob", 2);
        let mut controller = SyncController::new(wallet);
        let outcomes = controller.take_outcomes();
        let account_events = controller.subscribe_account_events();
        Harness {
            controller,
            outcomes,
            account_events,
            lottery,
        }
    }

    /// Waits for the forwarded confirmation result and feeds it back into
    /// the controller, the way the app loop does.
    async fn deliver_next_outcome(&mut self) {
        let outcome = self.outcomes.recv().await.unwrap();
        self.controller.on_action_outcome(outcome).await;
    }

    async fn deliver_next_account_event(&mut self) {
        let event = self.account_events.recv().await.unwrap();
        self.controller.on_accounts_changed(event).await;
    }
}

#[tokio::test]
async fn lifecycle__connect_enter_confirm_refresh() {
    // given
    let mut h = Harness::new();
    h.controller
        .connect(ConnectAuth::Interactive {
            passphrase: "correct horse".to_string(),
        })
        .await;
    assert_eq!(h.controller.state(), SyncState::Connected);

    // when: enter the lottery and let the transaction confirm
    h.controller.enter_lottery().await;
    assert_eq!(
        h.controller.store().pending_action(),
        PendingAction::Submitted(ActionKind::EnterLottery)
    );
    h.lottery.set_player_count(4);
    assert!(h.lottery.resolve_next(Ok(receipt(100))));
    h.deliver_next_outcome().await;

    // then: the confirmation triggered a fresh snapshot
    assert_eq!(
        h.controller.store().pending_action(),
        PendingAction::Confirmed(ActionKind::EnterLottery)
    );
    assert_eq!(h.controller.store().snapshot().unwrap().player_count, 4);
    assert_eq!(
        h.lottery.submissions(),
        vec![(ActionKind::EnterLottery, fee_wei("0.01"))]
    );
}

#[tokio::test]
async fn lifecycle__unlock_once_then_reconnect_without_prompting() {
    // given: an interactive unlock earlier in the process
    let mut h = Harness::new();
    h.controller
        .connect(ConnectAuth::Interactive {
            passphrase: "correct horse".to_string(),
        })
        .await;
    assert_eq!(h.controller.state(), SyncState::Connected);

    // when
    h.controller.disconnect();
    h.controller.connect(ConnectAuth::Authorized).await;

    // then: the wallet stayed authorized across the local disconnect
    assert_eq!(h.controller.state(), SyncState::Connected);
}

#[tokio::test]
async fn lifecycle__wrong_passphrase_is_recoverable() {
    // given
    let mut h = Harness::new();

    // when
    h.controller
        .connect(ConnectAuth::Interactive {
            passphrase: "wrong".to_string(),
        })
        .await;

    // then
    assert_eq!(h.controller.state(), SyncState::Disconnected);
    assert!(!h.controller.store().is_connected());

    // and a retry with the right passphrase succeeds
    h.controller
        .connect(ConnectAuth::Interactive {
            passphrase: "correct horse".to_string(),
        })
        .await;
    assert_eq!(h.controller.state(), SyncState::Connected);
}

#[tokio::test]
async fn lifecycle__account_switch_discards_stale_confirmation() {
    // given: alice connected with a pick-winner in flight
    let mut h = Harness::new();
    h.controller
        .connect(ConnectAuth::Interactive {
            passphrase: "correct horse".to_string(),
        })
        .await;
    h.controller.pick_winner().await;

    // when: the account changes to bob before the confirmation lands
    h.controller.request_account_switch("bob");
    h.deliver_next_account_event().await;
    assert_eq!(h.controller.state(), SyncState::Connected);
    assert_eq!(
        h.controller.store().session().unwrap().address,
        Address::from([2u8; 20])
    );
    let bob_snapshot = *h.controller.store().snapshot().unwrap();

    // ... and the stale confirmation finally resolves with a new winner
    h.lottery.set_recent_winner(Address::from([9u8; 20]));
    assert!(h.lottery.resolve_next(Ok(receipt(101))));
    h.deliver_next_outcome().await;

    // then: bob's session is untouched by alice's action
    assert_eq!(*h.controller.store().snapshot().unwrap(), bob_snapshot);
    assert_eq!(h.controller.store().pending_action(), PendingAction::Idle);
}

#[tokio::test]
async fn lifecycle__submit_failure_reports_and_allows_retry() {
    // given
    let mut h = Harness::new();
    h.controller
        .connect(ConnectAuth::Interactive {
            passphrase: "correct horse".to_string(),
        })
        .await;
    h.lottery.refuse_submissions(LotteryError::InsufficientFunds(
        "balance below fee".to_string(),
    ));

    // when
    h.controller.enter_lottery().await;

    // then
    assert_eq!(
        h.controller.store().pending_action(),
        PendingAction::Failed(ActionKind::EnterLottery)
    );
    let view = h.controller.view();
    assert!(view.errors.iter().any(|e| e.contains("insufficient funds")));

    // and the same action can be retried once funds exist
    h.lottery.allow_submissions();
    h.controller.enter_lottery().await;
    assert_eq!(h.lottery.submissions().len(), 1);
    assert!(h.controller.store().pending_action().in_flight());
}
