//! Swap storage implementation using a PostgreSQL database.
//!
//! Queries bind at runtime so the crate builds without a live database;
//! value columns hold decimal strings and `0x`-hex ids, timestamps are
//! `BIGINT` unix seconds.

use super::{
    StorageApi, StorageError,
    api::{CoinPriceInfo, DepositUpdate, GasPriceInfo, Result, WithdrawUpdate},
};
use crate::types::{
    BridgeDirection, BridgeKind, LockBoxState, ProcessStatus, SwapId, SwapRecord, TaskName,
    VmErrorRecord,
};
use alloy::primitives::B256;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

/// PostgreSQL storage implementation.
#[derive(Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Creates a new PostgreSQL storage instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables if they do not exist yet.
    pub async fn create_tables(&self) -> Result<()> {
        for statement in [
            r#"
            CREATE TABLE IF NOT EXISTS swaps (
                seq BIGSERIAL,
                id TEXT PRIMARY KEY,
                kind INTEGER NOT NULL,
                direction INTEGER NOT NULL,
                trader_address TEXT NOT NULL,
                withdraw_address TEXT NOT NULL,
                amount TEXT NOT NULL,
                swap_fee TEXT NOT NULL,
                tx_fee TEXT NOT NULL,
                secret_lock TEXT NOT NULL,
                secret_key TEXT,
                deposit_state INTEGER NOT NULL,
                deposit_token_id TEXT NOT NULL,
                deposit_time_lock BIGINT NOT NULL,
                deposit_create_time BIGINT NOT NULL,
                deposit_tx_hash TEXT,
                withdraw_state INTEGER NOT NULL,
                withdraw_token_id TEXT NOT NULL,
                withdraw_time_lock BIGINT NOT NULL,
                withdraw_create_time BIGINT NOT NULL,
                withdraw_tx_hash TEXT,
                withdraw_time_diff BIGINT NOT NULL,
                process_status INTEGER NOT NULL,
                process_update_time BIGINT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS vm_errors (
                swap_id TEXT NOT NULL,
                task TEXT NOT NULL,
                message TEXT NOT NULL,
                code TEXT NOT NULL,
                is_retry BOOLEAN NOT NULL,
                next_try_time BIGINT NOT NULL,
                num_retry INTEGER NOT NULL,
                PRIMARY KEY (swap_id, task)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS gas_prices (
                symbol TEXT PRIMARY KEY,
                fast DOUBLE PRECISION NOT NULL,
                low DOUBLE PRECISION NOT NULL,
                average DOUBLE PRECISION NOT NULL,
                last_updated_at BIGINT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS coin_prices (
                source TEXT NOT NULL,
                symbol TEXT NOT NULL,
                usd DOUBLE PRECISION NOT NULL,
                krw DOUBLE PRECISION NOT NULL,
                last_updated_at BIGINT NOT NULL,
                PRIMARY KEY (source, symbol)
            )
            "#,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn parse_column<T: FromStr>(value: &str, column: &str) -> Result<T> {
    value.parse().map_err(|_| StorageError::Decode(format!("{column}: {value:?}")))
}

fn parse_optional<T: FromStr>(value: Option<String>, column: &str) -> Result<Option<T>> {
    value.map(|value| parse_column(&value, column)).transpose()
}

fn decode_swap(row: &PgRow) -> Result<SwapRecord> {
    let kind = row.try_get::<i32, _>("kind")?;
    let direction = row.try_get::<i32, _>("direction")?;
    let deposit_state = row.try_get::<i32, _>("deposit_state")?;
    let withdraw_state = row.try_get::<i32, _>("withdraw_state")?;
    let process_status = row.try_get::<i32, _>("process_status")?;

    Ok(SwapRecord {
        id: parse_column(&row.try_get::<String, _>("id")?, "id")?,
        kind: BridgeKind::from_i32(kind)
            .ok_or_else(|| StorageError::Decode(format!("kind: {kind}")))?,
        direction: BridgeDirection::from_i32(direction)
            .ok_or_else(|| StorageError::Decode(format!("direction: {direction}")))?,
        trader_address: parse_column(&row.try_get::<String, _>("trader_address")?, "trader_address")?,
        withdraw_address: parse_column(
            &row.try_get::<String, _>("withdraw_address")?,
            "withdraw_address",
        )?,
        amount: parse_column(&row.try_get::<String, _>("amount")?, "amount")?,
        swap_fee: parse_column(&row.try_get::<String, _>("swap_fee")?, "swap_fee")?,
        tx_fee: parse_column(&row.try_get::<String, _>("tx_fee")?, "tx_fee")?,
        secret_lock: parse_column(&row.try_get::<String, _>("secret_lock")?, "secret_lock")?,
        secret_key: parse_optional(row.try_get::<Option<String>, _>("secret_key")?, "secret_key")?,
        deposit_state: LockBoxState::from_i32(deposit_state)
            .ok_or_else(|| StorageError::Decode(format!("deposit_state: {deposit_state}")))?,
        deposit_token_id: parse_column(
            &row.try_get::<String, _>("deposit_token_id")?,
            "deposit_token_id",
        )?,
        deposit_time_lock: row.try_get::<i64, _>("deposit_time_lock")? as u64,
        deposit_create_time: row.try_get::<i64, _>("deposit_create_time")? as u64,
        deposit_tx_hash: parse_optional(
            row.try_get::<Option<String>, _>("deposit_tx_hash")?,
            "deposit_tx_hash",
        )?,
        withdraw_state: LockBoxState::from_i32(withdraw_state)
            .ok_or_else(|| StorageError::Decode(format!("withdraw_state: {withdraw_state}")))?,
        withdraw_token_id: parse_column(
            &row.try_get::<String, _>("withdraw_token_id")?,
            "withdraw_token_id",
        )?,
        withdraw_time_lock: row.try_get::<i64, _>("withdraw_time_lock")? as u64,
        withdraw_create_time: row.try_get::<i64, _>("withdraw_create_time")? as u64,
        withdraw_tx_hash: parse_optional(
            row.try_get::<Option<String>, _>("withdraw_tx_hash")?,
            "withdraw_tx_hash",
        )?,
        withdraw_time_diff: row.try_get::<i64, _>("withdraw_time_diff")?,
        process_status: ProcessStatus::from_i32(process_status)
            .ok_or_else(|| StorageError::Decode(format!("process_status: {process_status}")))?,
        process_update_time: row.try_get::<i64, _>("process_update_time")? as u64,
    })
}

fn terminal_statuses() -> Vec<i32> {
    [
        ProcessStatus::ErrorOpeningDeposit,
        ProcessStatus::ErrorOpeningWithdraw,
        ProcessStatus::ErrorClosingWithdraw,
        ProcessStatus::ConfirmedClosingDeposit,
        ProcessStatus::ErrorClosingDeposit,
        ProcessStatus::ConfirmedExpireWithdraw,
        ProcessStatus::ErrorExpireWithdraw,
        ProcessStatus::ErrorInvalidSwap,
    ]
    .into_iter()
    .map(ProcessStatus::as_i32)
    .collect()
}

#[async_trait]
impl StorageApi for PgStorage {
    async fn create_swap(&self, swap: &SwapRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO swaps (
                id, kind, direction, trader_address, withdraw_address,
                amount, swap_fee, tx_fee, secret_lock, secret_key,
                deposit_state, deposit_token_id, deposit_time_lock,
                deposit_create_time, deposit_tx_hash,
                withdraw_state, withdraw_token_id, withdraw_time_lock,
                withdraw_create_time, withdraw_tx_hash, withdraw_time_diff,
                process_status, process_update_time
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
            )
            "#,
        )
        .bind(swap.id.to_string())
        .bind(swap.kind.as_i32())
        .bind(swap.direction.as_i32())
        .bind(swap.trader_address.to_string())
        .bind(swap.withdraw_address.to_string())
        .bind(swap.amount.to_string())
        .bind(swap.swap_fee.to_string())
        .bind(swap.tx_fee.to_string())
        .bind(swap.secret_lock.to_string())
        .bind(swap.secret_key.map(|key| key.to_string()))
        .bind(swap.deposit_state.as_i32())
        .bind(swap.deposit_token_id.to_string())
        .bind(swap.deposit_time_lock as i64)
        .bind(swap.deposit_create_time as i64)
        .bind(swap.deposit_tx_hash.map(|hash| hash.to_string()))
        .bind(swap.withdraw_state.as_i32())
        .bind(swap.withdraw_token_id.to_string())
        .bind(swap.withdraw_time_lock as i64)
        .bind(swap.withdraw_create_time as i64)
        .bind(swap.withdraw_tx_hash.map(|hash| hash.to_string()))
        .bind(swap.withdraw_time_diff)
        .bind(swap.process_status.as_i32())
        .bind(swap.process_update_time as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StorageError::SwapAlreadyExists(swap.id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_swap(&self, id: SwapId) -> Result<Option<SwapRecord>> {
        sqlx::query("SELECT * FROM swaps WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| decode_swap(&row))
            .transpose()
    }

    async fn waiting_swaps(&self) -> Result<Vec<SwapRecord>> {
        sqlx::query("SELECT * FROM swaps WHERE NOT (process_status = ANY($1)) ORDER BY seq")
            .bind(terminal_statuses())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(decode_swap)
            .collect()
    }

    async fn update_deposit(&self, id: SwapId, update: &DepositUpdate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE swaps SET
                trader_address = $2, withdraw_address = $3, amount = $4,
                swap_fee = $5, tx_fee = $6, secret_lock = $7,
                deposit_state = $8, deposit_token_id = $9,
                deposit_time_lock = $10, deposit_create_time = $11,
                process_status = $12
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(update.trader_address.to_string())
        .bind(update.withdraw_address.to_string())
        .bind(update.amount.to_string())
        .bind(update.swap_fee.to_string())
        .bind(update.tx_fee.to_string())
        .bind(update.secret_lock.to_string())
        .bind(update.state.as_i32())
        .bind(update.token_id.to_string())
        .bind(update.time_lock as i64)
        .bind(update.create_time as i64)
        .bind(update.process_status.as_i32())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_withdraw(&self, id: SwapId, update: &WithdrawUpdate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE swaps SET
                withdraw_state = $2, withdraw_token_id = $3,
                withdraw_time_lock = $4, withdraw_create_time = $5,
                process_status = $6
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(update.state.as_i32())
        .bind(update.token_id.to_string())
        .bind(update.time_lock as i64)
        .bind(update.create_time as i64)
        .bind(update.process_status.as_i32())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_withdraw_time_diff(&self, id: SwapId, time_diff: i64) -> Result<()> {
        sqlx::query("UPDATE swaps SET withdraw_time_diff = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(time_diff)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_withdraw_tx_hash(&self, id: SwapId, tx_hash: B256) -> Result<()> {
        sqlx::query("UPDATE swaps SET withdraw_tx_hash = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(tx_hash.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_process_status(&self, id: SwapId, status: ProcessStatus) -> Result<()> {
        sqlx::query("UPDATE swaps SET process_status = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(status.as_i32())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_process_time(&self, id: SwapId, time: u64) -> Result<()> {
        sqlx::query("UPDATE swaps SET process_update_time = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(time as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_secret_key(&self, id: SwapId, secret_key: B256) -> Result<()> {
        sqlx::query("UPDATE swaps SET secret_key = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(secret_key.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn vm_error(&self, id: SwapId, task: TaskName) -> Result<VmErrorRecord> {
        let row = sqlx::query("SELECT * FROM vm_errors WHERE swap_id = $1 AND task = $2")
            .bind(id.to_string())
            .bind(task.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(VmErrorRecord::absent(id, task));
        };
        Ok(VmErrorRecord {
            id,
            task,
            is_error: true,
            message: row.try_get("message")?,
            code: row.try_get("code")?,
            is_retry: row.try_get("is_retry")?,
            next_try_time: row.try_get::<i64, _>("next_try_time")? as u64,
            num_retry: row.try_get::<i32, _>("num_retry")? as u32,
        })
    }

    async fn upsert_vm_error(&self, record: &VmErrorRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vm_errors (swap_id, task, message, code, is_retry, next_try_time, num_retry)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (swap_id, task) DO UPDATE SET
                message = EXCLUDED.message,
                code = EXCLUDED.code,
                is_retry = EXCLUDED.is_retry,
                next_try_time = EXCLUDED.next_try_time,
                num_retry = EXCLUDED.num_retry
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.task.as_str())
        .bind(&record.message)
        .bind(&record.code)
        .bind(record.is_retry)
        .bind(record.next_try_time as i64)
        .bind(record.num_retry as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_vm_error(&self, id: SwapId, task: TaskName) -> Result<()> {
        sqlx::query("DELETE FROM vm_errors WHERE swap_id = $1 AND task = $2")
            .bind(id.to_string())
            .bind(task.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_gas_price(&self, price: &GasPriceInfo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gas_prices (symbol, fast, low, average, last_updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (symbol) DO UPDATE SET
                fast = EXCLUDED.fast,
                low = EXCLUDED.low,
                average = EXCLUDED.average,
                last_updated_at = EXCLUDED.last_updated_at
            "#,
        )
        .bind(&price.symbol)
        .bind(price.fast)
        .bind(price.low)
        .bind(price.average)
        .bind(price.last_updated_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn gas_price(&self) -> Result<Option<GasPriceInfo>> {
        let row = sqlx::query("SELECT * FROM gas_prices ORDER BY last_updated_at DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(GasPriceInfo {
                symbol: row.try_get("symbol")?,
                fast: row.try_get("fast")?,
                low: row.try_get("low")?,
                average: row.try_get("average")?,
                last_updated_at: row.try_get::<i64, _>("last_updated_at")? as u64,
            }),
            None => None,
        })
    }

    async fn update_coin_prices(&self, prices: &[CoinPriceInfo]) -> Result<()> {
        for price in prices {
            sqlx::query(
                r#"
                INSERT INTO coin_prices (source, symbol, usd, krw, last_updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (source, symbol) DO UPDATE SET
                    usd = EXCLUDED.usd,
                    krw = EXCLUDED.krw,
                    last_updated_at = EXCLUDED.last_updated_at
                "#,
            )
            .bind(&price.source)
            .bind(&price.symbol)
            .bind(price.usd)
            .bind(price.krw)
            .bind(price.last_updated_at as i64)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn coin_prices(&self) -> Result<Vec<CoinPriceInfo>> {
        let rows = sqlx::query("SELECT * FROM coin_prices").fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(CoinPriceInfo {
                    source: row.try_get("source")?,
                    symbol: row.try_get("symbol")?,
                    usd: row.try_get("usd")?,
                    krw: row.try_get("krw")?,
                    last_updated_at: row.try_get::<i64, _>("last_updated_at")? as u64,
                })
            })
            .collect()
    }
}
