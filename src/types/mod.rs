//! Core types of the swap bridge.

mod lockbox;
mod swap;
mod task;
mod token;

pub use lockbox::{LockBoxInfo, LockBoxState};
pub use swap::{BridgeDirection, BridgeKind, ProcessStatus, SwapId, SwapRecord};
pub use task::{TaskName, VmErrorRecord};
pub use token::TokenId;
