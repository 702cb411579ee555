//! The task governor: the single point of truth for "may this swap attempt
//! this on-chain action right now".
//!
//! Every on-chain read or write in the bridge tasks runs through
//! [`run_vm_task`], which persists failures keyed by `(swap id, task name)`
//! so a process restart resumes with the same backoff and attempt count.

use crate::{
    error::VmError,
    storage::{StorageError, SwapStorage},
    time::unix_time,
    types::{ProcessStatus, SwapId, TaskName},
};
use std::future::Future;

/// What a governed task produced this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    /// The task was not run: backoff window still open, retry disabled, or
    /// the attempt ceiling finalized the swap. A no-op for this tick.
    Skipped,
    /// The task ran and failed; the failure has been persisted.
    Failed(VmError),
    /// The task ran and succeeded.
    Done(T),
}

impl<T> TaskOutcome<T> {
    /// Returns the success payload, if any.
    pub fn into_done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            _ => None,
        }
    }
}

/// Attempt ceiling for state-changing submissions: after `max_attempts`
/// failures the swap is finalized to `error_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryLimit {
    /// Failed attempts allowed before finalizing.
    pub max_attempts: u32,
    /// Terminal status written when the ceiling is hit.
    pub error_status: ProcessStatus,
}

/// Runs one governed on-chain attempt.
///
/// The task body runs at most once per call, never sooner than
/// [`VM_RETRY_DELAY_SECS`](crate::constants::VM_RETRY_DELAY_SECS) after the
/// previous failure, and (when a limit is given) at most `max_attempts`
/// times in total. A success clears the
/// persisted failure; a failure bumps the attempt count and re-arms the
/// backoff window.
pub async fn run_vm_task<T, F>(
    storage: &SwapStorage,
    id: SwapId,
    task: TaskName,
    limit: Option<RetryLimit>,
    work: F,
) -> Result<TaskOutcome<T>, StorageError>
where
    F: Future<Output = Result<T, VmError>>,
{
    let record = storage.vm_error(id, task).await?;

    if record.is_error && !record.is_retry {
        if let Some(limit) = limit {
            storage.update_process_status(id, limit.error_status).await?;
        }
        return Ok(TaskOutcome::Skipped);
    }
    if record.is_error && unix_time() < record.next_try_time {
        return Ok(TaskOutcome::Skipped);
    }
    if record.is_error {
        if let Some(limit) = limit {
            if record.num_retry >= limit.max_attempts {
                storage.update_process_status(id, limit.error_status).await?;
                return Ok(TaskOutcome::Skipped);
            }
        }
    }

    match work.await {
        Ok(value) => {
            if record.is_error {
                storage.clear_vm_error(id, task).await?;
            }
            Ok(TaskOutcome::Done(value))
        }
        Err(error) => {
            storage.update_vm_error(id, task, &error, true, record.num_retry + 1).await?;
            Ok(TaskOutcome::Failed(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BridgeDirection, BridgeKind, SwapRecord};
    use alloy::primitives::{Address, B256, U256};
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn storage_with_swap(id: SwapId) -> SwapStorage {
        let storage = SwapStorage::in_memory();
        let swap = SwapRecord::new(
            id,
            BridgeKind::Coin,
            BridgeDirection::EthnetToBiznet,
            Address::repeat_byte(1),
            Address::repeat_byte(1),
            U256::from(1u64),
            U256::ZERO,
            U256::ZERO,
            B256::ZERO,
            None,
        );
        storage.create_swap(&swap).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn success_passes_payload_through() {
        let id = SwapId::generate();
        let storage = storage_with_swap(id).await;
        let outcome = run_vm_task(&storage, id, TaskName::GetSecretKey, None, async { Ok(7u32) })
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Done(7));
    }

    #[tokio::test]
    async fn failure_is_persisted_and_backoff_enforced() {
        let id = SwapId::generate();
        let storage = storage_with_swap(id).await;
        let calls = AtomicU32::new(0);

        let run = async |storage: &SwapStorage| {
            run_vm_task(storage, id, TaskName::OpenWithdraw, None, async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(VmError { message: "boom".into(), code: "9".into() })
            })
            .await
        };

        assert!(matches!(run(&storage).await.unwrap(), TaskOutcome::Failed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let record = storage.vm_error(id, TaskName::OpenWithdraw).await.unwrap();
        assert!(record.is_error);
        assert_eq!(record.num_retry, 1);
        assert!(record.next_try_time > unix_time());

        // Within the backoff window the task body must not run again.
        assert!(matches!(run(&storage).await.unwrap(), TaskOutcome::Skipped));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Plants an error row whose backoff window is already over.
    async fn plant_aged_error(storage: &SwapStorage, id: SwapId, task: TaskName, num_retry: u32) {
        storage
            .upsert_vm_error(&crate::types::VmErrorRecord {
                id,
                task,
                is_error: true,
                message: "boom".into(),
                code: "9".into(),
                is_retry: true,
                next_try_time: 0,
                num_retry,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn elapsed_backoff_allows_another_attempt() {
        let id = SwapId::generate();
        let storage = storage_with_swap(id).await;
        plant_aged_error(&storage, id, TaskName::OpenWithdraw, 1).await;
        let calls = AtomicU32::new(0);

        let outcome = run_vm_task(&storage, id, TaskName::OpenWithdraw, None, async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(VmError { message: "again".into(), code: String::new() })
        })
        .await
        .unwrap();

        assert!(matches!(outcome, TaskOutcome::Failed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let record = storage.vm_error(id, TaskName::OpenWithdraw).await.unwrap();
        assert_eq!(record.num_retry, 2);
    }

    #[tokio::test]
    async fn ceiling_finalizes_to_error_status() {
        let id = SwapId::generate();
        let storage = storage_with_swap(id).await;
        plant_aged_error(&storage, id, TaskName::OpenWithdraw, 3).await;
        let limit = Some(RetryLimit {
            max_attempts: 3,
            error_status: ProcessStatus::ErrorOpeningWithdraw,
        });
        let calls = AtomicU32::new(0);

        let outcome = run_vm_task(&storage, id, TaskName::OpenWithdraw, limit, async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(outcome, TaskOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let swap = storage.get_swap(id).await.unwrap().unwrap();
        assert_eq!(swap.process_status, ProcessStatus::ErrorOpeningWithdraw);
    }

    #[tokio::test]
    async fn disabled_retry_finalizes_without_running() {
        let id = SwapId::generate();
        let storage = storage_with_swap(id).await;
        storage
            .upsert_vm_error(&crate::types::VmErrorRecord {
                id,
                task: TaskName::CloseDeposit,
                is_error: true,
                message: "frozen".into(),
                code: String::new(),
                is_retry: false,
                next_try_time: 0,
                num_retry: 1,
            })
            .await
            .unwrap();

        let outcome = run_vm_task(
            &storage,
            id,
            TaskName::CloseDeposit,
            Some(RetryLimit {
                max_attempts: 3,
                error_status: ProcessStatus::ErrorClosingDeposit,
            }),
            async { Ok(()) },
        )
        .await
        .unwrap();

        assert_eq!(outcome, TaskOutcome::Skipped);
        let swap = storage.get_swap(id).await.unwrap().unwrap();
        assert_eq!(swap.process_status, ProcessStatus::ErrorClosingDeposit);
    }

    #[tokio::test]
    async fn success_clears_previous_error() {
        let id = SwapId::generate();
        let storage = storage_with_swap(id).await;
        plant_aged_error(&storage, id, TaskName::CloseDeposit, 1).await;

        let outcome = run_vm_task(&storage, id, TaskName::CloseDeposit, None, async { Ok(1u8) })
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Done(1));
        assert!(!storage.vm_error(id, TaskName::CloseDeposit).await.unwrap().is_error);
    }
}
