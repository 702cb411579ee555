use super::SwapId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the governed on-chain sub-steps.
///
/// Retry and backoff bookkeeping is keyed by `(swap id, task name)`, so every
/// operation gets its own name and failures stay isolated per sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskName {
    /// Read the source deposit box.
    CheckDepositIsOpened,
    /// Read the target withdraw box before creating it.
    CheckWithdrawIsNone,
    /// Submit the withdraw box.
    OpenWithdraw,
    /// Read the target withdraw box after creating it.
    CheckWithdrawIsOpened,
    /// Submit the withdraw close with the revealed secret.
    CloseWithdraw,
    /// Read the target withdraw box after closing it.
    CheckWithdrawIsClosed,
    /// Read the target withdraw box before expiring it.
    CheckWithdrawExpire,
    /// Submit the withdraw expiry.
    ExpireWithdraw,
    /// Read the revealed secret from the target bridge.
    GetSecretKey,
    /// Submit the deposit close on the source network.
    CloseDeposit,
    /// Read the source deposit box after closing it.
    CheckDepositIsClosed,
    /// Read the target withdraw box after expiring it.
    CheckWithdrawIsExpired,
}

impl TaskName {
    /// The name under which the task is persisted.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckDepositIsOpened => "CheckDepositIsOpened",
            Self::CheckWithdrawIsNone => "CheckWithdrawIsNone",
            Self::OpenWithdraw => "OpenWithdraw",
            Self::CheckWithdrawIsOpened => "CheckWithdrawIsOpened",
            Self::CloseWithdraw => "CloseWithdraw",
            Self::CheckWithdrawIsClosed => "CheckWithdrawIsClosed",
            Self::CheckWithdrawExpire => "CheckWithdrawExpire",
            Self::ExpireWithdraw => "ExpireWithdraw",
            Self::GetSecretKey => "GetSecretKey",
            Self::CloseDeposit => "CloseDeposit",
            Self::CheckDepositIsClosed => "CheckDepositIsClosed",
            Self::CheckWithdrawIsExpired => "CheckWithdrawIsExpired",
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a persisted task name.
#[derive(Debug, thiserror::Error)]
#[error("unknown task name: {0:?}")]
pub struct UnknownTaskName(pub String);

impl std::str::FromStr for TaskName {
    type Err = UnknownTaskName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CheckDepositIsOpened" => Ok(Self::CheckDepositIsOpened),
            "CheckWithdrawIsNone" => Ok(Self::CheckWithdrawIsNone),
            "OpenWithdraw" => Ok(Self::OpenWithdraw),
            "CheckWithdrawIsOpened" => Ok(Self::CheckWithdrawIsOpened),
            "CloseWithdraw" => Ok(Self::CloseWithdraw),
            "CheckWithdrawIsClosed" => Ok(Self::CheckWithdrawIsClosed),
            "CheckWithdrawExpire" => Ok(Self::CheckWithdrawExpire),
            "ExpireWithdraw" => Ok(Self::ExpireWithdraw),
            "GetSecretKey" => Ok(Self::GetSecretKey),
            "CloseDeposit" => Ok(Self::CloseDeposit),
            "CheckDepositIsClosed" => Ok(Self::CheckDepositIsClosed),
            "CheckWithdrawIsExpired" => Ok(Self::CheckWithdrawIsExpired),
            other => Err(UnknownTaskName(other.to_string())),
        }
    }
}

/// Retry/backoff bookkeeping for one `(swap id, task)` pair.
///
/// A missing row decodes as the no-error default: retry allowed, zero
/// attempts, no backoff window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmErrorRecord {
    /// Swap this record belongs to.
    pub id: SwapId,
    /// Task this record belongs to.
    pub task: TaskName,
    /// Whether an unresolved error exists.
    pub is_error: bool,
    /// Captured failure message, truncated to 256 characters.
    pub message: String,
    /// Captured failure code.
    pub code: String,
    /// Whether the task may be retried.
    pub is_retry: bool,
    /// Unix time before which a retry is forbidden.
    pub next_try_time: u64,
    /// Number of failed attempts so far.
    pub num_retry: u32,
}

impl VmErrorRecord {
    /// The record reported when no error row exists.
    pub fn absent(id: SwapId, task: TaskName) -> Self {
        Self {
            id,
            task,
            is_error: false,
            message: String::new(),
            code: String::new(),
            is_retry: true,
            next_try_time: 0,
            num_retry: 0,
        }
    }
}
