use crate::{
    contract::EthLotteryContract,
    error::LotteryError,
    session::Session,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use ethers::{
    middleware::SignerMiddleware,
    providers::{
        Http,
        Middleware,
        Provider,
    },
    signers::{
        LocalWallet,
        Signer,
    },
    types::{
        Address,
        U256,
    },
};
use std::{
    collections::HashMap,
    env,
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::warn;

/// Passphrase source for non-interactive unlocks (startup auto-connect
/// and account switches to wallets not yet unlocked this process).
pub const WALLET_PASSWORD_ENV: &str = "LOTTERY_WALLET_PASSWORD";

const KEYSTORE_EXTENSION: &str = "keystore";

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".lottery").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(KEYSTORE_EXTENSION) {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

/// How a connect attempt may authorize itself. `Authorized` never prompts
/// anyone: it succeeds only for a wallet already unlocked this process or
/// when the environment supplies the passphrase.
#[derive(Clone, Debug)]
pub enum ConnectAuth {
    Authorized,
    Interactive { passphrase: String },
}

/// Account-change notifications. The sync controller subscribes to this
/// channel once at session start; there are no ambient callbacks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AccountEvent {
    AccountsChanged(String),
}

#[allow(async_fn_in_trait)]
pub trait WalletProvider {
    type Contract;

    /// Requests account access and binds the lottery contract to the
    /// resulting signer.
    async fn connect(
        &mut self,
        auth: ConnectAuth,
    ) -> Result<(Session, Self::Contract), LotteryError>;

    async fn balance(&self, address: Address) -> Result<U256, LotteryError>;

    fn accounts(&self) -> Vec<String>;

    /// Changes the target account and emits `AccountsChanged`.
    fn switch_account(&mut self, name: &str) -> Result<(), LotteryError>;

    fn subscribe_account_events(&mut self) -> mpsc::UnboundedReceiver<AccountEvent>;
}

/// Wallet layer over a directory of encrypted keystore files, the
/// machine-resident stand-in for a key-managing wallet extension.
/// Accounts unlocked once stay authorized for the rest of the process;
/// nothing persists across runs.
pub struct KeystoreWallet {
    provider: Provider<Http>,
    dir: PathBuf,
    target: Option<String>,
    unlocked: HashMap<String, LocalWallet>,
    chain_id: u64,
    contract_address: Address,
    confirm_timeout: Duration,
    events_tx: mpsc::UnboundedSender<AccountEvent>,
}

impl KeystoreWallet {
    pub fn new(
        provider: Provider<Http>,
        dir: PathBuf,
        preferred: Option<String>,
        chain_id: u64,
        contract_address: Address,
        confirm_timeout: Duration,
    ) -> Self {
        // The receiver half is replaced when the controller subscribes.
        let (events_tx, _) = mpsc::unbounded_channel();
        Self {
            provider,
            dir,
            target: preferred,
            unlocked: HashMap::new(),
            chain_id,
            contract_address,
            confirm_timeout,
            events_tx,
        }
    }

    fn target_descriptor(&self) -> Result<WalletDescriptor, LotteryError> {
        let wallets = list_wallets(&self.dir)
            .map_err(|e| LotteryError::Rpc(format!("wallet directory: {e}")))?;
        match &self.target {
            Some(name) => wallets
                .into_iter()
                .find(|w| &w.name == name)
                .ok_or(LotteryError::NoWallet),
            None => wallets.into_iter().next().ok_or(LotteryError::NoWallet),
        }
    }

    fn unlock(
        &mut self,
        descriptor: &WalletDescriptor,
        auth: ConnectAuth,
    ) -> Result<LocalWallet, LotteryError> {
        if let Some(signer) = self.unlocked.get(&descriptor.name) {
            return Ok(signer.clone());
        }
        let passphrase = match auth {
            ConnectAuth::Interactive { passphrase } => passphrase,
            ConnectAuth::Authorized => env::var(WALLET_PASSWORD_ENV).map_err(|_| {
                LotteryError::Rejected(format!(
                    "wallet '{}' requires an interactive unlock",
                    descriptor.name
                ))
            })?,
        };
        let secret = decrypt_key(&descriptor.path, passphrase.as_bytes()).map_err(|_| {
            LotteryError::Rejected(format!(
                "invalid passphrase for wallet '{}'",
                descriptor.name
            ))
        })?;
        let signer = LocalWallet::from_bytes(&secret)
            .map_err(|_| {
                LotteryError::Rejected(format!(
                    "wallet '{}' contains unsupported key material",
                    descriptor.name
                ))
            })?
            .with_chain_id(self.chain_id);
        self.unlocked.insert(descriptor.name.clone(), signer.clone());
        Ok(signer)
    }

    async fn warn_on_chain_mismatch(&self) {
        // The contract address is selected by the configured chain id, not
        // by what the node reports; surface the gap instead of fixing it.
        match self.provider.get_chainid().await {
            Ok(reported) if reported != U256::from(self.chain_id) => warn!(
                configured = self.chain_id,
                reported = %reported,
                "node chain id differs from configured chain id; \
                 the recorded contract address may not exist there"
            ),
            Ok(_) => {}
            Err(err) => warn!(?err, "failed to query node chain id"),
        }
    }
}

impl WalletProvider for KeystoreWallet {
    type Contract = EthLotteryContract;

    async fn connect(
        &mut self,
        auth: ConnectAuth,
    ) -> Result<(Session, EthLotteryContract), LotteryError> {
        let descriptor = self.target_descriptor()?;
        let signer = self.unlock(&descriptor, auth)?;
        self.target = Some(descriptor.name.clone());
        self.warn_on_chain_mismatch().await;

        let address = signer.address();
        let balance = self.balance(address).await?;
        let middleware = Arc::new(SignerMiddleware::new(self.provider.clone(), signer));
        let contract =
            EthLotteryContract::new(self.contract_address, middleware, self.confirm_timeout);
        Ok((Session { address, balance }, contract))
    }

    async fn balance(&self, address: Address) -> Result<U256, LotteryError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| LotteryError::Rpc(format!("getBalance: {e}")))
    }

    fn accounts(&self) -> Vec<String> {
        list_wallets(&self.dir)
            .map(|wallets| wallets.into_iter().map(|w| w.name).collect())
            .unwrap_or_default()
    }

    fn switch_account(&mut self, name: &str) -> Result<(), LotteryError> {
        find_wallet(&self.dir, name).map_err(|_| LotteryError::NoWallet)?;
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

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = env::temp_dir()
            .join("lottery-dashboard-tests")
            .join(format!("{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn list_wallets__returns_only_keystore_files_sorted_by_name() {
        // given
        let dir = scratch_dir("list");
        fs::write(dir.join("bob.keystore"), b"{}").unwrap();
        fs::write(dir.join("alice.keystore"), b"{}").unwrap();
        fs::write(dir.join("notes.txt"), b"ignore me").unwrap();

        // when
        let wallets = list_wallets(&dir).unwrap();

        // then
        let names: Vec<_> = wallets.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn list_wallets__missing_directory_is_empty_not_an_error() {
        // given
        let dir = scratch_dir("missing").join("does-not-exist");

        // when
        let wallets = list_wallets(&dir).unwrap();

        // then
        assert!(wallets.is_empty());
    }

    #[test]
    fn find_wallet__fails_for_unknown_name() {
        // given
        let dir = scratch_dir("find");
        fs::write(dir.join("alice.keystore"), b"{}").unwrap();

        // when
        let found = find_wallet(&dir, "carol");

        // then
        assert!(found.is_err());
    }
}
