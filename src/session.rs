use ethers::types::{
    Address,
    U256,
};

/// A connected wallet account. Holding one of these is what "connected"
/// means; there is no separate flag to drift out of sync.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Session {
    pub address: Address,
    /// Account balance in wei, read during connect and snapshot refresh.
    pub balance: U256,
}

/// Cached mirror of the contract's read-only state. Replaced wholesale on
/// each refresh, never partially mutated. The three source reads are
/// independent calls with no shared block pin, so a snapshot can straddle
/// a state change; that matches the upstream behavior.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LotterySnapshot {
    /// Cost of one entry, in wei.
    pub entrance_fee: U256,
    pub player_count: u64,
    /// `None` until the contract has ever picked a winner (the contract
    /// reports the all-zero address in that case).
    pub recent_winner: Option<Address>,
}

impl LotterySnapshot {
    /// Total currently at stake: every player paid the entrance fee.
    pub fn prize_pool(&self) -> U256 {
        self.entrance_fee
            .saturating_mul(U256::from(self.player_count))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionKind {
    EnterLottery,
    PickWinner,
}

impl ActionKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ActionKind::EnterLottery => "enter lottery",
            ActionKind::PickWinner => "pick winner",
        }
    }
}

/// At most one write is in flight per session; `Submitted` blocks new
/// actions until the confirmation wait resolves one way or the other.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PendingAction {
    #[default]
    Idle,
    Submitted(ActionKind),
    Confirmed(ActionKind),
    Failed(ActionKind),
}

impl PendingAction {
    pub fn in_flight(&self) -> bool {
        matches!(self, PendingAction::Submitted(_))
    }
}

/// Single authority for what the UI currently believes. All writes flow
/// through the sync controller; the presentation layer only reads.
#[derive(Debug, Default)]
pub struct SessionStore {
    session: Option<Session>,
    snapshot: Option<LotterySnapshot>,
    pending: PendingAction,
}

impl SessionStore {
    pub fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    pub fn set_snapshot(&mut self, snapshot: Option<LotterySnapshot>) {
        self.snapshot = snapshot;
    }

    pub fn set_pending_action(&mut self, pending: PendingAction) {
        self.pending = pending;
    }

    /// Drops everything tied to the current account, including any
    /// recorded action state.
    pub fn clear(&mut self) {
        self.session = None;
        self.snapshot = None;
        self.pending = PendingAction::Idle;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<&LotterySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn pending_action(&self) -> PendingAction {
        self.pending
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn some_session(byte: u8) -> Session {
        Session {
            address: Address::from([byte; 20]),
            balance: U256::from(1_000_000u64),
        }
    }

    #[test]
    fn clear__drops_session_snapshot_and_pending_state() {
        // given
        let mut store = SessionStore::default();
        store.set_session(Some(some_session(1)));
        store.set_snapshot(Some(LotterySnapshot {
            entrance_fee: U256::from(10u64),
            player_count: 2,
            recent_winner: None,
        }));
        store.set_pending_action(PendingAction::Submitted(ActionKind::EnterLottery));

        // when
        store.clear();

        // then
        assert!(store.session().is_none());
        assert!(store.snapshot().is_none());
        assert_eq!(store.pending_action(), PendingAction::Idle);
        assert!(!store.is_connected());
    }

    #[test]
    fn set_session__holds_at_most_one_account() {
        // given
        let mut store = SessionStore::default();

        // when
        store.set_session(Some(some_session(1)));
        store.set_session(Some(some_session(2)));

        // then
        assert_eq!(store.session().unwrap().address, Address::from([2u8; 20]));
    }

    #[test]
    fn prize_pool__multiplies_fee_by_player_count() {
        // given
        let snapshot = LotterySnapshot {
            entrance_fee: U256::from(10_000_000_000_000_000u64), // 0.01 ETH
            player_count: 3,
            recent_winner: None,
        };

        // when
        let pool = snapshot.prize_pool();

        // then
        assert_eq!(pool, U256::from(30_000_000_000_000_000u64));
    }

    #[test]
    fn prize_pool__saturates_instead_of_overflowing() {
        // given
        let snapshot = LotterySnapshot {
            entrance_fee: U256::MAX,
            player_count: u64::MAX,
            recent_winner: None,
        };

        // when
        let pool = snapshot.prize_pool();

        // then
        assert_eq!(pool, U256::MAX);
    }

    #[test]
    fn in_flight__only_while_submitted() {
        assert!(PendingAction::Submitted(ActionKind::PickWinner).in_flight());
        assert!(!PendingAction::Idle.in_flight());
        assert!(!PendingAction::Confirmed(ActionKind::PickWinner).in_flight());
        assert!(!PendingAction::Failed(ActionKind::PickWinner).in_flight());
    }
}
