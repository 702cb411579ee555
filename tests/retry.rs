//! Failure handling around on-chain submissions: persisted VM errors,
//! nonce resynchronization, the 60-second backoff and the attempt ceiling.

mod common;

use alloy::primitives::{B256, U256};
use common::{CoinFixture, sha256, trader};
use lockbox_relay::{
    time::unix_time,
    types::{
        BridgeDirection, BridgeKind, LockBoxInfo, LockBoxState, ProcessStatus, SwapId, SwapRecord,
        TaskName, TokenId,
    },
};
use std::sync::atomic::Ordering;

const AMOUNT: u64 = 10_000_000_000;
const SWAP_FEE: u64 = 300_000_000;
const TX_FEE: u64 = 50_000_000;

fn secret() -> B256 {
    B256::repeat_byte(0x5E)
}

fn swap(id: SwapId) -> SwapRecord {
    SwapRecord::new(
        id,
        BridgeKind::Coin,
        BridgeDirection::EthnetToBiznet,
        trader(),
        trader(),
        U256::from(AMOUNT),
        U256::from(SWAP_FEE),
        U256::from(TX_FEE),
        sha256(secret().as_slice()),
        None,
    )
}

fn deposit_box(id: SwapId) -> LockBoxInfo {
    LockBoxInfo {
        id,
        state: LockBoxState::Open,
        token_id: TokenId::ZERO,
        time_lock: 7200,
        amount: U256::from(AMOUNT),
        swap_fee: U256::from(SWAP_FEE),
        tx_fee: U256::from(TX_FEE),
        trader_address: trader(),
        withdraw_address: trader(),
        secret_lock: sha256(secret().as_slice()),
        create_time: unix_time(),
    }
}

/// Rewrites the persisted error so its backoff window is already over.
async fn expire_backoff(fixture: &CoinFixture, id: SwapId, task: TaskName) {
    let mut record = fixture.storage.vm_error(id, task).await.unwrap();
    assert!(record.is_error, "expected a persisted error to age");
    record.next_try_time = 0;
    fixture.storage.upsert_vm_error(&record).await.unwrap();
}

#[tokio::test]
async fn failed_submission_backs_off_then_recovers() {
    let fixture = CoinFixture::new().await;
    let id = SwapId::generate();
    fixture.storage.create_swap(&swap(id)).await.unwrap();
    fixture.ethnet.open_deposit(deposit_box(id));

    fixture.step(id).await;
    assert_eq!(fixture.status(id).await, ProcessStatus::ConfirmedOpeningDeposit);

    // The submission is rejected by the node.
    fixture.biznet.fail_next_submissions(1);
    fixture.step(id).await;
    assert_eq!(fixture.status(id).await, ProcessStatus::ConfirmedOpeningDeposit);
    assert_eq!(fixture.biznet.open_withdraw_calls.load(Ordering::SeqCst), 0);
    // The failure resynchronized the signer's nonce sequence.
    assert_eq!(fixture.biznet.reset_calls.load(Ordering::SeqCst), 1);
    let record = fixture.storage.vm_error(id, TaskName::OpenWithdraw).await.unwrap();
    assert!(record.is_error);
    assert_eq!(record.num_retry, 1);
    assert_eq!(record.code, "2001");
    assert!(record.next_try_time > unix_time());

    // Within the backoff window nothing is attempted.
    fixture.step(id).await;
    assert_eq!(fixture.status(id).await, ProcessStatus::ConfirmedOpeningDeposit);
    assert_eq!(fixture.biznet.open_withdraw_calls.load(Ordering::SeqCst), 0);

    // Once the window elapses the retry succeeds and the error clears.
    expire_backoff(&fixture, id, TaskName::OpenWithdraw).await;
    fixture.step(id).await;
    assert_eq!(fixture.status(id).await, ProcessStatus::FinishedOpeningWithdraw);
    assert_eq!(fixture.biznet.open_withdraw_calls.load(Ordering::SeqCst), 1);
    assert!(!fixture.storage.vm_error(id, TaskName::OpenWithdraw).await.unwrap().is_error);
}

#[tokio::test]
async fn persistent_failure_caps_out_at_the_attempt_ceiling() {
    let fixture = CoinFixture::new().await;
    let id = SwapId::generate();
    fixture.storage.create_swap(&swap(id)).await.unwrap();
    fixture.ethnet.open_deposit(deposit_box(id));

    fixture.step(id).await;
    fixture.biznet.fail_next_submissions(u32::MAX);

    // Three real attempts, each followed by an aged-out backoff window.
    for expected_attempts in 1..=3u32 {
        fixture.step(id).await;
        let record = fixture.storage.vm_error(id, TaskName::OpenWithdraw).await.unwrap();
        assert_eq!(record.num_retry, expected_attempts);
        assert_eq!(fixture.status(id).await, ProcessStatus::ConfirmedOpeningDeposit);
        expire_backoff(&fixture, id, TaskName::OpenWithdraw).await;
    }

    // The fourth pass hits the ceiling without running the task and
    // finalizes the swap.
    fixture.step(id).await;
    assert_eq!(fixture.status(id).await, ProcessStatus::ErrorOpeningWithdraw);
    let record = fixture.storage.vm_error(id, TaskName::OpenWithdraw).await.unwrap();
    assert_eq!(record.num_retry, 3);

    // Terminal: further ticks make no additional attempts.
    fixture.scheduler.run_once().await;
    assert_eq!(fixture.status(id).await, ProcessStatus::ErrorOpeningWithdraw);
    assert_eq!(fixture.biznet.open_withdraw_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_close_resets_the_source_nonce() {
    let fixture = CoinFixture::new().await;
    let id = SwapId::generate();
    fixture.storage.create_swap(&swap(id)).await.unwrap();
    fixture.ethnet.open_deposit(deposit_box(id));
    fixture.storage.update_secret_key(id, secret()).await.unwrap();

    // Drive to the deposit-closing phase.
    for _ in 0..5 {
        fixture.step(id).await;
    }
    assert_eq!(fixture.status(id).await, ProcessStatus::ConfirmedClosingWithdraw);

    fixture.ethnet.fail_next_submissions(1);
    fixture.step(id).await;
    assert_eq!(fixture.status(id).await, ProcessStatus::ConfirmedClosingWithdraw);
    assert_eq!(fixture.ethnet.reset_calls.load(Ordering::SeqCst), 1);

    expire_backoff(&fixture, id, TaskName::CloseDeposit).await;
    fixture.step(id).await;
    assert_eq!(fixture.status(id).await, ProcessStatus::FinishedClosingDeposit);
    assert_eq!(fixture.ethnet.deposit_state(id), LockBoxState::Closed);
}
