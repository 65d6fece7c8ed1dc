use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the wallet and contract layers.
///
/// Every variant reaches the user as a single status notice naming the
/// attempted action; none trigger an automatic retry.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LotteryError {
    /// No keystore wallet is available to connect with.
    #[error("no wallet keystore available")]
    NoWallet,

    /// The user declined authorization, or the passphrase was wrong.
    #[error("wallet authorization declined: {0}")]
    Rejected(String),

    /// The account cannot cover the transaction value plus gas.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// The contract restricts this call to its owner.
    #[error("caller is not the contract owner")]
    NotOwner,

    /// Transport or node failure while talking to the RPC endpoint.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The transaction was mined but reverted.
    #[error("transaction reverted on-chain")]
    Reverted,

    /// No receipt appeared within the configured confirmation window.
    #[error("confirmation wait expired after {0:?}")]
    ConfirmationTimeout(Duration),
}

impl LotteryError {
    /// A session-fatal failure leaves no way to reach the contract; the
    /// user can only fix the environment and reconnect. Everything else
    /// may be retried as-is.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LotteryError::NoWallet)
    }
}

/// Maps the stringly-typed errors coming back from the RPC stack onto the
/// taxonomy. Revert reasons are only decoded far enough to recognize an
/// unambiguous owner restriction; anything else stays opaque.
pub fn classify_send_error(message: &str) -> LotteryError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
        return LotteryError::InsufficientFunds(trim_error(message));
    }
    if lower.contains("not the owner")
        || lower.contains("not owner")
        || lower.contains("onlyowner")
        || lower.contains("caller is not owner")
    {
        return LotteryError::NotOwner;
    }
    if lower.contains("execution reverted") || lower.contains("revert") {
        return LotteryError::Reverted;
    }
    LotteryError::Rpc(trim_error(message))
}

/// Read calls have no revert taxonomy of their own; they either produce a
/// value or an RPC failure.
pub fn classify_read_error(method: &str, message: &str) -> LotteryError {
    LotteryError::Rpc(format!("{method}: {}", trim_error(message)))
}

// Node errors tend to embed whole JSON bodies; keep the leading human
// readable part for the status bar.
fn trim_error(message: &str) -> String {
    const MAX: usize = 160;
    let trimmed = message.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut cut = MAX;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &trimmed[..cut])
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn classify_send_error__detects_insufficient_funds() {
        // given
        let message = "insufficient funds for gas * price + value";

        // when
        let err = classify_send_error(message);

        // then
        assert!(matches!(err, LotteryError::InsufficientFunds(_)));
    }

    #[test]
    fn classify_send_error__decodes_owner_restriction() {
        // given
        let message = "execution reverted: Ownable: caller is not the owner";

        // when
        let err = classify_send_error(message);

        // then
        assert_eq!(err, LotteryError::NotOwner);
    }

    #[test]
    fn classify_send_error__keeps_other_reverts_opaque() {
        // given
        let message = "execution reverted: Lottery__NotEnoughEthEntered";

        // when
        let err = classify_send_error(message);

        // then
        assert_eq!(err, LotteryError::Reverted);
    }

    #[test]
    fn classify_send_error__falls_back_to_rpc() {
        // given
        let message = "connection refused";

        // when
        let err = classify_send_error(message);

        // then
        assert_eq!(err, LotteryError::Rpc("connection refused".to_string()));
    }

    #[test]
    fn trim_error__caps_long_messages() {
        // given
        let message = "x".repeat(500);

        // when
        let err = classify_send_error(&message);

        // then
        let LotteryError::Rpc(text) = err else {
            panic!("expected rpc error");
        };
        assert!(text.len() <= 164);
        assert!(text.ends_with("..."));
    }
}
