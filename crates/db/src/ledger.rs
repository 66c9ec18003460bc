use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::RwLock;

use orderly_core::domain::order::PlacedOrder;
use orderly_core::domain::session::SenderId;

use crate::DbPool;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("ledger append timed out after {0}s")]
    Timeout(u64),
}

/// Append-only ledger of completed orders. One call records every line of
/// one finalized conversation, atomically.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn append(&self, order: &PlacedOrder) -> Result<(), LedgerError>;
}

/// One persisted ledger row, as read back from storage.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedLine {
    pub order_id: String,
    pub sender: String,
    pub product_name: String,
    pub variant_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub location: String,
    pub environment: String,
    pub placed_at: DateTime<Utc>,
}

pub struct SqlOrderLedger {
    pool: DbPool,
    timeout: Duration,
}

impl SqlOrderLedger {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub async fn lines_for_sender(
        &self,
        sender: &SenderId,
    ) -> Result<Vec<RecordedLine>, LedgerError> {
        let rows: Vec<(String, String, String, String, i64, String, String, String, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT order_id, sender, product_name, variant_name, quantity, unit_price, \
                 location, environment, placed_at \
                 FROM order_line WHERE sender = ? ORDER BY id",
            )
            .bind(&sender.0)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let (
                    order_id,
                    sender,
                    product_name,
                    variant_name,
                    quantity,
                    unit_price,
                    location,
                    environment,
                    placed_at,
                ) = row;
                Ok(RecordedLine {
                    order_id,
                    sender,
                    product_name,
                    variant_name,
                    quantity: u32::try_from(quantity).map_err(|_| {
                        LedgerError::Decode(format!("negative quantity in ledger: {quantity}"))
                    })?,
                    unit_price: Decimal::from_str(&unit_price).map_err(|err| {
                        LedgerError::Decode(format!("bad unit price `{unit_price}`: {err}"))
                    })?,
                    location,
                    environment,
                    placed_at,
                })
            })
            .collect()
    }

    async fn append_all(&self, order: &PlacedOrder) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        for line in &order.lines {
            sqlx::query(
                "INSERT INTO order_line \
                 (order_id, sender, product_name, variant_name, quantity, unit_price, \
                  location, environment, placed_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&order.id.0)
            .bind(&order.sender.0)
            .bind(&line.product_name)
            .bind(&line.variant_name.0)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .bind(&order.location)
            .bind(&order.environment)
            .bind(order.placed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for SqlOrderLedger {
    async fn append(&self, order: &PlacedOrder) -> Result<(), LedgerError> {
        // Bounded so a wedged database surfaces as a retryable failure
        // instead of hanging the sender's conversation.
        match tokio::time::timeout(self.timeout, self.append_all(order)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[derive(Default)]
pub struct InMemoryOrderLedger {
    orders: RwLock<Vec<PlacedOrder>>,
}

impl InMemoryOrderLedger {
    pub async fn orders(&self) -> Vec<PlacedOrder> {
        self.orders.read().await.clone()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn append(&self, order: &PlacedOrder) -> Result<(), LedgerError> {
        let mut orders = self.orders.write().await;
        orders.push(order.clone());
        Ok(())
    }
}
