//! Fake wallet and contract plumbing for exercising the sync lifecycle
//! without a node. Confirmations resolve only when a test says so, which
//! makes the in-flight windows deterministic.

use crate::{
    contract::{
        LotteryContract,
        TxHandle,
        TxReceipt,
    },
    error::LotteryError,
    session::{
        ActionKind,
        Session,
    },
    wallet::{
        AccountEvent,
        ConnectAuth,
        WalletProvider,
    },
};
use ethers::{
    types::{
        Address,
        H256,
        U256,
    },
    utils::parse_ether,
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::{
    mpsc,
    oneshot,
};

pub fn fee_wei(eth: &str) -> U256 {
    parse_ether(eth).unwrap()
}

#[derive(Default)]
struct FakeLotteryState {
    entrance_fee: U256,
    player_count: u64,
    recent_winner: Address,
    fail_reads: bool,
    refuse_submit: Option<LotteryError>,
    submissions: Vec<(ActionKind, U256)>,
    pending: VecDeque<oneshot::Sender<Result<TxReceipt, LotteryError>>>,
    snapshot_reads: u64,
    next_tx: u64,
}

/// Scripted stand-in for the on-chain contract. Clones share state, so a
/// handle kept by the test observes everything the controller does.
#[derive(Clone, Default)]
pub struct FakeLottery {
    state: Arc<Mutex<FakeLotteryState>>,
}

impl FakeLottery {
    pub fn set_chain_state(&self, entrance_fee: U256, player_count: u64, winner: Address) {
        let mut state = self.state.lock().unwrap();
        state.entrance_fee = entrance_fee;
        state.player_count = player_count;
        state.recent_winner = winner;
    }

    pub fn set_player_count(&self, player_count: u64) {
        self.state.lock().unwrap().player_count = player_count;
    }

    pub fn set_recent_winner(&self, winner: Address) {
        self.state.lock().unwrap().recent_winner = winner;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn refuse_submissions(&self, err: LotteryError) {
        self.state.lock().unwrap().refuse_submit = Some(err);
    }

    pub fn allow_submissions(&self) {
        self.state.lock().unwrap().refuse_submit = None;
    }

    pub fn submissions(&self) -> Vec<(ActionKind, U256)> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// Number of snapshot refreshes observed since the last reset (each
    /// refresh reads the entrance fee exactly once).
    pub fn snapshot_reads(&self) -> u64 {
        self.state.lock().unwrap().snapshot_reads
    }

    pub fn reset_snapshot_reads(&self) {
        self.state.lock().unwrap().snapshot_reads = 0;
    }

    /// Resolves the oldest unresolved confirmation. Returns false when
    /// nothing is pending.
    pub fn resolve_next(&self, result: Result<TxReceipt, LotteryError>) -> bool {
        let sender = self.state.lock().unwrap().pending.pop_front();
        match sender {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }

    fn submit(&self, kind: ActionKind, value: U256) -> Result<TxHandle, LotteryError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.refuse_submit.clone() {
            return Err(err);
        }
        state.next_tx += 1;
        let tx_hash = H256::from_low_u64_be(state.next_tx);
        state.submissions.push((kind, value));
        let (handle, confirmed_tx) = TxHandle::pair(tx_hash);
        state.pending.push_back(confirmed_tx);
        Ok(handle)
    }

    fn read<T>(&self, get: impl FnOnce(&FakeLotteryState) -> T) -> Result<T, LotteryError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(LotteryError::Rpc("simulated read failure".to_string()));
        }
        Ok(get(&state))
    }
}

impl LotteryContract for FakeLottery {
    async fn entrance_fee(&self) -> Result<U256, LotteryError> {
        self.state.lock().unwrap().snapshot_reads += 1;
        self.read(|s| s.entrance_fee)
    }

    async fn number_of_players(&self) -> Result<u64, LotteryError> {
        self.read(|s| s.player_count)
    }

    async fn recent_winner(&self) -> Result<Address, LotteryError> {
        self.read(|s| s.recent_winner)
    }

    async fn enter(&self, value: U256) -> Result<TxHandle, LotteryError> {
        self.submit(ActionKind::EnterLottery, value)
    }

    async fn pick_winner(&self) -> Result<TxHandle, LotteryError> {
        self.submit(ActionKind::PickWinner, U256::zero())
    }
}

struct FakeAccount {
    name: String,
    address: Address,
    balance: U256,
    passphrase: Option<String>,
    authorized: bool,
}

/// Wallet adapter over a fixed roster of named accounts.
pub struct FakeWalletProvider {
    accounts: Vec<FakeAccount>,
    target: Option<String>,
    lottery: FakeLottery,
    events_tx: mpsc::UnboundedSender<AccountEvent>,
}

impl FakeWalletProvider {
    pub fn new(lottery: FakeLottery) -> Self {
        let (events_tx, _) = mpsc::unbounded_channel();
        Self {
            accounts: Vec::new(),
            target: None,
            lottery,
            events_tx,
        }
    }

    /// An account that connects without prompting, like one the user has
    /// approved before.
    pub fn with_authorized_account(mut self, name: &str, address_byte: u8) -> Self {
        self.accounts.push(FakeAccount {
            name: name.to_string(),
            address: Address::from([address_byte; 20]),
            balance: fee_wei("1"),
            passphrase: None,
            authorized: true,
        });
        self
    }

    /// An account that needs the right passphrase on first connect.
    pub fn with_locked_account(mut self, name: &str, address_byte: u8, passphrase: &str) -> Self {
        self.accounts.push(FakeAccount {
            name: name.to_string(),
            address: Address::from([address_byte; 20]),
            balance: fee_wei("1"),
            passphrase: Some(passphrase.to_string()),
            authorized: false,
        });
        self
    }

    pub fn set_balance(&mut self, name: &str, balance: U256) {
        if let Some(account) = self.accounts.iter_mut().find(|a| a.name == name) {
            account.balance = balance;
        }
    }

    fn target_index(&self) -> Option<usize> {
        match &self.target {
            Some(name) => self.accounts.iter().position(|a| &a.name == name),
            None => (!self.accounts.is_empty()).then_some(0),
        }
    }
}

impl WalletProvider for FakeWalletProvider {
    type Contract = FakeLottery;

    async fn connect(
        &mut self,
        auth: ConnectAuth,
    ) -> Result<(Session, FakeLottery), LotteryError> {
        let idx = self.target_index().ok_or(LotteryError::NoWallet)?;
        let account = &mut self.accounts[idx];
        match auth {
            ConnectAuth::Authorized => {
                if !account.authorized {
                    return Err(LotteryError::Rejected(format!(
                        "wallet '{}' requires an interactive unlock",
                        account.name
                    )));
                }
            }
            ConnectAuth::Interactive { passphrase } => {
                if account.passphrase.as_deref() != Some(passphrase.as_str())
                    && !account.authorized
                {
                    return Err(LotteryError::Rejected(format!(
                        "invalid passphrase for wallet '{}'",
                        account.name
                    )));
                }
                account.authorized = true;
            }
        }
        Ok((
            Session {
                address: account.address,
                balance: account.balance,
            },
            self.lottery.clone(),
        ))
    }

    async fn balance(&self, address: Address) -> Result<U256, LotteryError> {
        self.accounts
            .iter()
            .find(|a| a.address == address)
            .map(|a| a.balance)
            .ok_or_else(|| LotteryError::Rpc("unknown account".to_string()))
    }

    fn accounts(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.name.clone()).collect()
    }

    fn switch_account(&mut self, name: &str) -> Result<(), LotteryError> {
        if !self.accounts.iter().any(|a| a.name == name) {
            return Err(LotteryError::NoWallet);
        }
        self.target = Some(name.to_string());
        let _ = self
            .events_tx
            .send(AccountEvent::AccountsChanged(name.to_string()));
        Ok(())
    }

    fn subscribe_account_events(&mut self) -> mpsc::UnboundedReceiver<AccountEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events_tx = tx;
        rx
    }
}
