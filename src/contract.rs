use crate::error::{
    LotteryError,
    classify_read_error,
    classify_send_error,
};
use ethers::{
    middleware::SignerMiddleware,
    providers::{
        Http,
        Middleware,
        Provider,
    },
    signers::LocalWallet,
    types::{
        Address,
        H256,
        U64,
        U256,
    },
};
use std::{
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};
use tokio::{
    sync::oneshot,
    time,
};
use tracing::debug;

pub mod lottery_abi {
    use ethers::contract::abigen;

    abigen!(
        Lottery,
        r#"[
            function getEntranceFee() external view returns (uint256)
            function getNumberOfPlayers() external view returns (uint256)
            function getRecentWinner() external view returns (address)
            function enterLottery() external payable
            function pickWinner() external
        ]"#
    );
}

pub type LotteryMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Receipt of a confirmed transaction, reduced to what the dashboard
/// reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

/// A submitted but not yet finalized transaction. The confirmation result
/// arrives through a oneshot from whoever watches the chain, so awaiting
/// it never blocks the submitting sequence.
#[derive(Debug)]
pub struct TxHandle {
    pub tx_hash: H256,
    confirmation: oneshot::Receiver<Result<TxReceipt, LotteryError>>,
}

impl TxHandle {
    pub fn pair(tx_hash: H256) -> (Self, oneshot::Sender<Result<TxReceipt, LotteryError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx_hash,
                confirmation: rx,
            },
            tx,
        )
    }

    pub async fn confirmed(self) -> Result<TxReceipt, LotteryError> {
        match self.confirmation.await {
            Ok(result) => result,
            Err(_) => Err(LotteryError::Rpc(
                "confirmation watcher dropped before reporting".to_string(),
            )),
        }
    }
}

/// The five-entry-point lottery interface. Reads are independent calls
/// with no atomicity across them; writes return a handle to await.
#[allow(async_fn_in_trait)]
pub trait LotteryContract {
    async fn entrance_fee(&self) -> Result<U256, LotteryError>;
    async fn number_of_players(&self) -> Result<u64, LotteryError>;
    async fn recent_winner(&self) -> Result<Address, LotteryError>;
    async fn enter(&self, value: U256) -> Result<TxHandle, LotteryError>;
    async fn pick_winner(&self) -> Result<TxHandle, LotteryError>;
}

/// Binding of the lottery ABI to one fixed address and one signer.
#[derive(Clone, Debug)]
pub struct EthLotteryContract {
    instance: lottery_abi::Lottery<LotteryMiddleware>,
    middleware: Arc<LotteryMiddleware>,
    confirm_timeout: Duration,
}

impl EthLotteryContract {
    pub fn new(
        address: Address,
        middleware: Arc<LotteryMiddleware>,
        confirm_timeout: Duration,
    ) -> Self {
        let instance = lottery_abi::Lottery::new(address, middleware.clone());
        Self {
            instance,
            middleware,
            confirm_timeout,
        }
    }

    pub fn address(&self) -> Address {
        self.instance.address()
    }

    fn watch(&self, tx_hash: H256) -> TxHandle {
        let (handle, confirmed_tx) = TxHandle::pair(tx_hash);
        let middleware = self.middleware.clone();
        let max_wait = self.confirm_timeout;
        tokio::spawn(async move {
            let result = await_receipt(middleware.as_ref(), tx_hash, max_wait).await;
            if confirmed_tx.send(result).is_err() {
                debug!(%tx_hash, "confirmation receiver dropped before delivery");
            }
        });
        handle
    }
}

impl LotteryContract for EthLotteryContract {
    async fn entrance_fee(&self) -> Result<U256, LotteryError> {
        self.instance
            .get_entrance_fee()
            .call()
            .await
            .map_err(|e| classify_read_error("getEntranceFee", &e.to_string()))
    }

    async fn number_of_players(&self) -> Result<u64, LotteryError> {
        let count = self
            .instance
            .get_number_of_players()
            .call()
            .await
            .map_err(|e| classify_read_error("getNumberOfPlayers", &e.to_string()))?;
        if count > U256::from(u64::MAX) {
            return Err(LotteryError::Rpc(
                "getNumberOfPlayers: count exceeds u64 range".to_string(),
            ));
        }
        Ok(count.as_u64())
    }

    async fn recent_winner(&self) -> Result<Address, LotteryError> {
        self.instance
            .get_recent_winner()
            .call()
            .await
            .map_err(|e| classify_read_error("getRecentWinner", &e.to_string()))
    }

    async fn enter(&self, value: U256) -> Result<TxHandle, LotteryError> {
        let call = self.instance.enter_lottery().value(value);
        let sent = call
            .send()
            .await
            .map_err(|e| classify_send_error(&e.to_string()))?;
        let tx_hash = *sent;
        drop(sent);
        debug!(%tx_hash, %value, "enterLottery submitted");
        Ok(self.watch(tx_hash))
    }

    async fn pick_winner(&self) -> Result<TxHandle, LotteryError> {
        let call = self.instance.pick_winner();
        let sent = call
            .send()
            .await
            .map_err(|e| classify_send_error(&e.to_string()))?;
        let tx_hash = *sent;
        drop(sent);
        debug!(%tx_hash, "pickWinner submitted");
        Ok(self.watch(tx_hash))
    }
}

async fn await_receipt(
    middleware: &LotteryMiddleware,
    tx_hash: H256,
    max_wait: Duration,
) -> Result<TxReceipt, LotteryError> {
    let deadline = Instant::now() + max_wait;
    loop {
        match middleware.get_transaction_receipt(tx_hash).await {
            Ok(Some(receipt)) => {
                return if receipt.status == Some(U64::one()) {
                    Ok(TxReceipt {
                        tx_hash,
                        block_number: receipt.block_number.map(|b| b.as_u64()),
                    })
                } else {
                    Err(LotteryError::Reverted)
                };
            }
            Ok(None) => {}
            Err(err) => return Err(LotteryError::Rpc(err.to_string())),
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(LotteryError::ConfirmationTimeout(max_wait));
        }
        time::sleep(RECEIPT_POLL_INTERVAL.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[tokio::test]
    async fn tx_handle__delivers_the_watcher_result() {
        // given
        let tx_hash = H256::from([7u8; 32]);
        let (handle, confirmed_tx) = TxHandle::pair(tx_hash);
        let receipt = TxReceipt {
            tx_hash,
            block_number: Some(42),
        };

        // when
        confirmed_tx.send(Ok(receipt)).unwrap();
        let result = handle.confirmed().await;

        // then
        assert_eq!(result, Ok(receipt));
    }

    #[tokio::test]
    async fn tx_handle__reports_a_dropped_watcher_as_rpc_failure() {
        // given
        let (handle, confirmed_tx) = TxHandle::pair(H256::zero());

        // when
        drop(confirmed_tx);
        let result = handle.confirmed().await;

        // then
        assert!(matches!(result, Err(LotteryError::Rpc(_))));
    }
}
