use crate::{
    contract::{
        LotteryContract,
        TxHandle,
        TxReceipt,
    },
    deployment,
    error::LotteryError,
    session::{
        ActionKind,
        LotterySnapshot,
        PendingAction,
        Session,
        SessionStore,
    },
    ui,
    wallet::{
        AccountEvent,
        ConnectAuth,
        KeystoreWallet,
        WalletProvider,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use ethers::providers::{
    Http,
    Provider,
};
use std::{
    path::PathBuf,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
    warn,
};

pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://rpc.sepolia.org";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";

const MAX_ERRORS: usize = 5;

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    Sepolia { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Sepolia { url } => url,
            NetworkTarget::LocalNode { url } => url,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub chain_id: u64,
    pub wallet_name: Option<String>,
    pub wallet_dir: PathBuf,
    pub confirm_timeout: Duration,
    pub startup_auth: Option<ConnectAuth>,
}

/// Connection lifecycle of the one live session. `Connected` splits into
/// idle and action-pending via the store's `PendingAction`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncState {
    Disconnected,
    Connecting,
    Connected,
}

/// Completion report for a submitted write, tagged with the session epoch
/// it belongs to so results for superseded sessions can be discarded.
#[derive(Debug)]
pub struct ActionOutcome {
    pub epoch: u64,
    pub kind: ActionKind,
    pub result: Result<TxReceipt, LotteryError>,
}

/// Everything the presentation layer may look at. Built fresh per draw;
/// the store itself is never handed out mutably.
#[derive(Clone, Debug)]
pub struct DashboardView {
    pub state: SyncState,
    pub session: Option<Session>,
    pub snapshot: Option<LotterySnapshot>,
    pub pending: PendingAction,
    pub accounts: Vec<String>,
    pub status: String,
    /// Newest first.
    pub errors: Vec<String>,
}

/// Orchestrates connect -> read -> act -> re-read. The only writer of the
/// session store; every transition runs to completion on the single
/// runtime thread before the next one starts.
pub struct SyncController<W: WalletProvider> {
    wallet: W,
    contract: Option<W::Contract>,
    store: SessionStore,
    state: SyncState,
    epoch: u64,
    status: String,
    errors: Vec<String>,
    outcome_tx: mpsc::UnboundedSender<ActionOutcome>,
    outcome_rx: Option<mpsc::UnboundedReceiver<ActionOutcome>>,
}

impl<W> SyncController<W>
where
    W: WalletProvider,
    W::Contract: LotteryContract,
{
    pub fn new(wallet: W) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            wallet,
            contract: None,
            store: SessionStore::default(),
            state: SyncState::Disconnected,
            epoch: 0,
            status: String::from("Ready"),
            errors: Vec::new(),
            outcome_tx,
            outcome_rx: Some(outcome_rx),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn take_outcomes(&mut self) -> mpsc::UnboundedReceiver<ActionOutcome> {
        match self.outcome_rx.take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.outcome_tx = tx;
                rx
            }
        }
    }

    pub fn subscribe_account_events(&mut self) -> mpsc::UnboundedReceiver<AccountEvent> {
        self.wallet.subscribe_account_events()
    }

    /// Startup check: connect without prompting when the wallet layer can
    /// authorize on its own, otherwise stay disconnected quietly.
    pub async fn startup(&mut self, auth: Option<ConnectAuth>) {
        match auth {
            Some(auth) => self.connect(auth).await,
            None => self.set_status("Press c to connect a wallet"),
        }
    }

    pub async fn connect(&mut self, auth: ConnectAuth) {
        if matches!(self.state, SyncState::Connected) {
            self.set_status("Already connected");
            return;
        }
        self.state = SyncState::Connecting;
        self.set_status("Connecting...");
        match self.wallet.connect(auth).await {
            Ok((session, contract)) => {
                self.contract = Some(contract);
                self.store.set_session(Some(session));
                self.store.set_pending_action(PendingAction::Idle);
                // The state is not settled until the first full snapshot
                // lands; a failed refresh undoes the whole connect.
                match self.refresh_snapshot().await {
                    Ok(()) => {
                        self.state = SyncState::Connected;
                        info!(address = %format!("{:#x}", session.address), "wallet connected");
                        self.set_status(format!(
                            "Connected as {}",
                            ui::short_address(&session.address)
                        ));
                    }
                    Err(err) => self.fail_connect("refresh lottery state", err),
                }
            }
            Err(err) => self.fail_connect("connect wallet", err),
        }
    }

    fn fail_connect(&mut self, action: &str, err: LotteryError) {
        self.contract = None;
        self.store.clear();
        self.state = SyncState::Disconnected;
        self.report_failure(action, &err);
    }

    /// Local teardown only; unlocked keys stay authorized in the wallet
    /// layer, the way closing a dApp does not revoke extension permission.
    pub fn disconnect(&mut self) {
        self.epoch += 1;
        self.contract = None;
        self.store.clear();
        self.state = SyncState::Disconnected;
        self.set_status("Disconnected");
    }

    pub async fn refresh(&mut self) {
        if !matches!(self.state, SyncState::Connected) {
            self.set_status("Connect a wallet first");
            return;
        }
        if self.store.pending_action().in_flight() {
            self.set_status("Another action is still pending");
            return;
        }
        match self.refresh_snapshot().await {
            Ok(()) => self.set_status("Lottery state refreshed"),
            Err(err) => self.report_failure("refresh lottery state", &err),
        }
    }

    /// Three independent reads plus the account balance; the snapshot is
    /// replaced wholesale. The reads are sequential awaits with no shared
    /// block pin, so they may straddle a state change.
    async fn refresh_snapshot(&mut self) -> Result<(), LotteryError> {
        let Some(contract) = self.contract.as_ref() else {
            return Err(LotteryError::Rpc(
                "no contract bound to the session".to_string(),
            ));
        };
        let entrance_fee = contract.entrance_fee().await?;
        let player_count = contract.number_of_players().await?;
        let winner = contract.recent_winner().await?;
        let recent_winner = (!winner.is_zero()).then_some(winner);

        if let Some(session) = self.store.session().copied() {
            let balance = self.wallet.balance(session.address).await?;
            self.store.set_session(Some(Session { balance, ..session }));
        }
        self.store.set_snapshot(Some(LotterySnapshot {
            entrance_fee,
            player_count,
            recent_winner,
        }));
        Ok(())
    }

    pub async fn enter_lottery(&mut self) {
        if !self.action_allowed() {
            return;
        }
        let Some(fee) = self.store.snapshot().map(|s| s.entrance_fee) else {
            self.set_status("No lottery state yet; refresh first");
            return;
        };
        self.store
            .set_pending_action(PendingAction::Submitted(ActionKind::EnterLottery));
        self.set_status(format!(
            "Entering lottery for {} ETH...",
            ui::format_eth(fee, 3)
        ));
        let Some(contract) = self.contract.as_ref() else {
            self.fail_connect("enter lottery", LotteryError::NoWallet);
            return;
        };
        // Value matches the latest fee read; a fee change between read and
        // submit is an accepted race.
        match contract.enter(fee).await {
            Ok(handle) => {
                info!(tx_hash = %handle.tx_hash, "enterLottery in flight");
                self.forward_outcome(handle, ActionKind::EnterLottery);
            }
            Err(err) => {
                self.store
                    .set_pending_action(PendingAction::Failed(ActionKind::EnterLottery));
                self.report_failure("enter lottery", &err);
            }
        }
    }

    pub async fn pick_winner(&mut self) {
        if !self.action_allowed() {
            return;
        }
        self.store
            .set_pending_action(PendingAction::Submitted(ActionKind::PickWinner));
        self.set_status("Picking a winner...");
        let Some(contract) = self.contract.as_ref() else {
            self.fail_connect("pick winner", LotteryError::NoWallet);
            return;
        };
        match contract.pick_winner().await {
            Ok(handle) => {
                info!(tx_hash = %handle.tx_hash, "pickWinner in flight");
                self.forward_outcome(handle, ActionKind::PickWinner);
            }
            Err(err) => {
                self.store
                    .set_pending_action(PendingAction::Failed(ActionKind::PickWinner));
                self.report_failure("pick winner", &err);
            }
        }
    }

    /// At most one write in flight per session; a second request while one
    /// is submitted is a no-op, not an error.
    fn action_allowed(&mut self) -> bool {
        if !matches!(self.state, SyncState::Connected) {
            self.set_status("Connect a wallet first");
            return false;
        }
        if self.store.pending_action().in_flight() {
            self.set_status("Another action is still pending");
            return false;
        }
        true
    }

    fn forward_outcome(&self, handle: TxHandle, kind: ActionKind) {
        let outcome_tx = self.outcome_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = handle.confirmed().await;
            let _ = outcome_tx.send(ActionOutcome {
                epoch,
                kind,
                result,
            });
        });
    }

    pub async fn on_action_outcome(&mut self, outcome: ActionOutcome) {
        if outcome.epoch != self.epoch {
            info!(
                kind = ?outcome.kind,
                "discarding outcome from a superseded session"
            );
            return;
        }
        match outcome.result {
            Ok(receipt) => {
                self.store
                    .set_pending_action(PendingAction::Confirmed(outcome.kind));
                let block = receipt
                    .block_number
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "?".to_string());
                self.set_status(format!(
                    "Confirmed: {} (block {block})",
                    outcome.kind.describe()
                ));
                if let Err(err) = self.refresh_snapshot().await {
                    self.report_failure("refresh after confirmation", &err);
                }
            }
            Err(err) => {
                // Back to idle without a refresh; the user may retry.
                self.store
                    .set_pending_action(PendingAction::Failed(outcome.kind));
                self.report_failure(outcome.kind.describe(), &err);
            }
        }
    }

    /// Restarts the whole connect sequence for the new account. The epoch
    /// bump makes any in-flight action's eventual result stale.
    pub async fn on_accounts_changed(&mut self, event: AccountEvent) {
        let AccountEvent::AccountsChanged(name) = event;
        info!(%name, "account changed; restarting connect sequence");
        self.epoch += 1;
        self.contract = None;
        self.store.clear();
        self.state = SyncState::Connecting;
        self.connect(ConnectAuth::Authorized).await;
    }

    pub fn request_account_switch(&mut self, name: &str) {
        if let Err(err) = self.wallet.switch_account(name) {
            self.report_failure("switch account", &err);
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            state: self.state,
            session: self.store.session().copied(),
            snapshot: self.store.snapshot().copied(),
            pending: self.store.pending_action(),
            accounts: self.wallet.accounts(),
            status: self.status.clone(),
            errors: self.errors.iter().rev().cloned().collect(),
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.errors.clear();
    }

    fn report_failure(&mut self, action: &str, err: &LotteryError) {
        // Fatal failures leave nothing to retry against; say so instead of
        // inviting the same attempt again.
        let message = if err.is_fatal() {
            format!("{action} failed: {err} (fix the wallet setup first)")
        } else {
            format!("{action} failed: {err}")
        };
        error!(action, %err, "operation failed");
        self.errors.push(message.clone());
        if self.errors.len() > MAX_ERRORS {
            let excess = self.errors.len() - MAX_ERRORS;
            self.errors.drain(..excess);
        }
        self.status = message;
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let AppConfig {
        network,
        chain_id,
        wallet_name,
        wallet_dir,
        confirm_timeout,
        startup_auth,
    } = config;
    let url = network.url().to_string();
    info!(%url, chain_id, "creating RPC provider");
    let provider = Provider::<Http>::try_from(url.as_str())
        .wrap_err_with(|| format!("Failed to create RPC provider for {url}"))?;

    let store = deployment::AddressStore::open()?;
    let contract_address = store.contract_address(chain_id)?;
    info!(contract = %format!("{contract_address:#x}"), "using recorded contract address");

    let wallet = KeystoreWallet::new(
        provider,
        wallet_dir,
        wallet_name,
        chain_id,
        contract_address,
        confirm_timeout,
    );
    let controller = SyncController::new(wallet);

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, startup_auth, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<W>(
    mut controller: SyncController<W>,
    startup_auth: Option<ConnectAuth>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()>
where
    W: WalletProvider,
    W::Contract: LotteryContract,
{
    let mut outcomes = controller.take_outcomes();
    let mut account_events = controller.subscribe_account_events();

    controller.startup(startup_auth).await;
    ui::draw(ui_state, &controller.view())?;

    loop {
        tokio::select! {
            maybe_outcome = outcomes.recv() => {
                let Some(outcome) = maybe_outcome else {
                    warn!("action outcome channel closed");
                    break;
                };
                controller.on_action_outcome(outcome).await;
            }
            maybe_event = account_events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("account event channel closed");
                    break;
                };
                controller.on_accounts_changed(event).await;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_event = ui::next_raw_event(input_events) => {
                let event = raw_event?;
                let Some(user_event) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match user_event {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Connect { passphrase } => {
                        controller
                            .connect(ConnectAuth::Interactive { passphrase })
                            .await;
                    }
                    ui::UserEvent::Disconnect => controller.disconnect(),
                    ui::UserEvent::Refresh => controller.refresh().await,
                    ui::UserEvent::EnterLottery => controller.enter_lottery().await,
                    ui::UserEvent::PickWinner => controller.pick_winner().await,
                    ui::UserEvent::SwitchAccount { name } => {
                        controller.request_account_switch(&name);
                    }
                }
            }
        }
        ui::draw(ui_state, &controller.view())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        contract::TxReceipt,
        test_helpers::{
            FakeLottery,
            FakeWalletProvider,
            fee_wei,
        },
    };
    use ethers::types::{
        Address,
        H256,
        U256,
    };

    fn receipt(block: u64) -> TxReceipt {
        TxReceipt {
            tx_hash: H256::from_low_u64_be(0xbeef),
            block_number: Some(block),
        }
    }

    struct Harness {
        controller: SyncController<FakeWalletProvider>,
        outcomes: mpsc::UnboundedReceiver<ActionOutcome>,
        account_events: mpsc::UnboundedReceiver<AccountEvent>,
        lottery: FakeLottery,
    }

    fn harness() -> Harness {
        let lottery = FakeLottery::default();
        lottery.set_chain_state(fee_wei("0.01"), 3, Address::zero());
        let wallet = FakeWalletProvider::new(lottery.clone())
            .with_authorized_account("alice", 1)
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

    async fn connected_harness() -> Harness {
        let mut h = harness();
        h.controller.connect(ConnectAuth::Authorized).await;
        assert_eq!(h.controller.state(), SyncState::Connected);
        h.lottery.reset_snapshot_reads();
        h
    }

    #[tokio::test]
    async fn connect__populates_session_and_snapshot() {
        // given
        let mut h = harness();

        // when
        h.controller.connect(ConnectAuth::Authorized).await;

        // then
        assert_eq!(h.controller.state(), SyncState::Connected);
        let view = h.controller.view();
        assert_eq!(view.session.unwrap().address, Address::from([1u8; 20]));
        let snapshot = view.snapshot.unwrap();
        assert_eq!(snapshot.entrance_fee, fee_wei("0.01"));
        assert_eq!(snapshot.player_count, 3);
        assert_eq!(snapshot.recent_winner, None);
        assert!(view.status.starts_with("Connected as"));
    }

    #[tokio::test]
    async fn connect__no_wallet_leaves_store_disconnected() {
        // given
        let lottery = FakeLottery::default();
        let wallet = FakeWalletProvider::new(lottery);
        let mut controller = SyncController::new(wallet);

        // when
        controller.connect(ConnectAuth::Authorized).await;

        // then
        assert_eq!(controller.state(), SyncState::Disconnected);
        assert!(!controller.store().is_connected());
        let view = controller.view();
        assert!(view.errors.iter().any(|e| e.contains("connect wallet")));
    }

    #[tokio::test]
    async fn connect__failed_refresh_undoes_the_connect() {
        // given
        let mut h = harness();
        h.lottery.fail_reads(true);

        // when
        h.controller.connect(ConnectAuth::Authorized).await;

        // then
        assert_eq!(h.controller.state(), SyncState::Disconnected);
        assert!(h.controller.store().session().is_none());
        assert!(h.controller.store().snapshot().is_none());
    }

    #[tokio::test]
    async fn connect__rejected_unlock_reports_once_and_stays_disconnected() {
        // given
        let lottery = FakeLottery::default();
        lottery.set_chain_state(fee_wei("0.01"), 0, Address::zero());
        let wallet = FakeWalletProvider::new(lottery)
            .with_locked_account("carol", 3, "hunter2");
        let mut controller = SyncController::new(wallet);

        // when
        controller
            .connect(ConnectAuth::Interactive {
                passphrase: "wrong".to_string(),
            })
            .await;

        // then
        assert_eq!(controller.state(), SyncState::Disconnected);
        assert_eq!(controller.view().errors.len(), 1);
    }

    #[tokio::test]
    async fn enter_lottery__submits_the_latest_entrance_fee() {
        // given
        let mut h = connected_harness().await;

        // when
        h.controller.enter_lottery().await;

        // then
        let submissions = h.lottery.submissions();
        assert_eq!(
            submissions,
            vec![(ActionKind::EnterLottery, fee_wei("0.01"))]
        );
        assert_eq!(
            h.controller.store().pending_action(),
            PendingAction::Submitted(ActionKind::EnterLottery)
        );
    }

    #[tokio::test]
    async fn enter_lottery__rapid_double_action_submits_exactly_once() {
        // given
        let mut h = connected_harness().await;

        // when
        h.controller.enter_lottery().await;
        h.controller.enter_lottery().await;
        h.controller.pick_winner().await;

        // then
        assert_eq!(h.lottery.submissions().len(), 1);
    }

    #[tokio::test]
    async fn enter_lottery__disconnected_is_a_noop() {
        // given
        let mut h = harness();

        // when
        h.controller.enter_lottery().await;

        // then
        assert!(h.lottery.submissions().is_empty());
        assert_eq!(h.controller.store().pending_action(), PendingAction::Idle);
    }

    #[tokio::test]
    async fn confirmed_pick_winner__refreshes_exactly_once_with_new_winner() {
        // given
        let mut h = connected_harness().await;
        h.controller.pick_winner().await;
        let winner = Address::from([9u8; 20]);
        h.lottery.set_recent_winner(winner);

        // when
        assert!(h.lottery.resolve_next(Ok(receipt(7))));
        let outcome = h.outcomes.recv().await.unwrap();
        h.controller.on_action_outcome(outcome).await;

        // then
        assert_eq!(h.lottery.snapshot_reads(), 1);
        assert_eq!(
            h.controller.store().pending_action(),
            PendingAction::Confirmed(ActionKind::PickWinner)
        );
        assert_eq!(
            h.controller.store().snapshot().unwrap().recent_winner,
            Some(winner)
        );
    }

    #[tokio::test]
    async fn failed_action__returns_to_idle_without_refreshing() {
        // given
        let mut h = connected_harness().await;
        h.controller.enter_lottery().await;

        // when
        assert!(h.lottery.resolve_next(Err(LotteryError::Reverted)));
        let outcome = h.outcomes.recv().await.unwrap();
        h.controller.on_action_outcome(outcome).await;

        // then
        assert_eq!(h.lottery.snapshot_reads(), 0);
        assert_eq!(
            h.controller.store().pending_action(),
            PendingAction::Failed(ActionKind::EnterLottery)
        );
        assert!(!h.controller.store().pending_action().in_flight());
        let view = h.controller.view();
        assert!(view.errors.iter().any(|e| e.contains("enter lottery")));
        // recoverable: the next attempt submits again
        h.controller.enter_lottery().await;
        assert_eq!(h.lottery.submissions().len(), 2);
    }

    #[tokio::test]
    async fn timeout__is_reported_and_leaves_the_machine_idle() {
        // given
        let mut h = connected_harness().await;
        h.controller.pick_winner().await;

        // when
        assert!(h.lottery.resolve_next(Err(LotteryError::ConfirmationTimeout(
            Duration::from_secs(90),
        ))));
        let outcome = h.outcomes.recv().await.unwrap();
        h.controller.on_action_outcome(outcome).await;

        // then
        assert!(!h.controller.store().pending_action().in_flight());
        assert!(h.controller.status().contains("pick winner failed"));
    }

    #[tokio::test]
    async fn accounts_changed__reconnects_to_the_new_account() {
        // given
        let mut h = connected_harness().await;
        assert_eq!(
            h.controller.view().session.unwrap().address,
            Address::from([1u8; 20])
        );

        // when
        h.controller.request_account_switch("bob");
        let event = h.account_events.recv().await.unwrap();
        h.controller.on_accounts_changed(event).await;

        // then: still exactly one non-null account, now bob's
        assert_eq!(h.controller.state(), SyncState::Connected);
        assert_eq!(
            h.controller.view().session.unwrap().address,
            Address::from([2u8; 20])
        );
    }

    #[tokio::test]
    async fn accounts_changed__discards_the_stale_pending_outcome() {
        // given: an action in flight for alice
        let mut h = connected_harness().await;
        h.controller.pick_winner().await;

        // when: the account changes before the confirmation lands
        h.controller.request_account_switch("bob");
        let event = h.account_events.recv().await.unwrap();
        h.controller.on_accounts_changed(event).await;
        let reads_after_reconnect = h.lottery.snapshot_reads();
        let snapshot_after_reconnect = *h.controller.store().snapshot().unwrap();

        // ... and the stale confirmation finally arrives
        h.lottery.set_recent_winner(Address::from([7u8; 20]));
        assert!(h.lottery.resolve_next(Ok(receipt(8))));
        let stale = h.outcomes.recv().await.unwrap();
        h.controller.on_action_outcome(stale).await;

        // then: the new session's snapshot is untouched
        assert_eq!(h.lottery.snapshot_reads(), reads_after_reconnect);
        assert_eq!(
            *h.controller.store().snapshot().unwrap(),
            snapshot_after_reconnect
        );
        assert_eq!(h.controller.store().pending_action(), PendingAction::Idle);
    }

    #[tokio::test]
    async fn disconnect__clears_session_and_snapshot() {
        // given
        let mut h = connected_harness().await;

        // when
        h.controller.disconnect();

        // then
        assert_eq!(h.controller.state(), SyncState::Disconnected);
        assert!(h.controller.store().session().is_none());
        assert!(h.controller.store().snapshot().is_none());
    }

    #[tokio::test]
    async fn refresh__rereads_balance_along_with_the_snapshot() {
        // given
        let mut h = connected_harness().await;
        h.controller
            .wallet
            .set_balance("alice", U256::from(5u64));
        h.lottery.set_player_count(4);

        // when
        h.controller.refresh().await;

        // then
        let view = h.controller.view();
        assert_eq!(view.session.unwrap().balance, U256::from(5u64));
        assert_eq!(view.snapshot.unwrap().player_count, 4);
    }
}
