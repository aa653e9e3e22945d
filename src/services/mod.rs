pub mod account_service;
pub mod angle_resolver;
pub mod approval_service;
pub mod free_spin_ledger;
pub mod outcome_selector;
pub mod reconciler;
pub mod request_service;
pub mod session_service;
pub mod spin_animator;

pub use account_service::*;
pub use angle_resolver::*;
pub use approval_service::*;
pub use free_spin_ledger::*;
pub use outcome_selector::*;
pub use reconciler::*;
pub use request_service::*;
pub use session_service::*;
pub use spin_animator::*;
