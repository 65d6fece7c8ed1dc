pub mod contract;
pub mod controller;
pub mod deployment;
pub mod error;
pub mod session;
pub mod ui;
pub mod wallet;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use controller::{
    AppConfig,
    DashboardView,
    NetworkTarget,
    SyncController,
    SyncState,
    run_app,
};
pub use error::LotteryError;
pub use session::{
    ActionKind,
    LotterySnapshot,
    PendingAction,
    Session,
    SessionStore,
};
