use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use orderly_core::domain::order::PlacedOrder;
use orderly_core::domain::session::{SenderId, Session};
use orderly_core::flows::engine::{Disposition, OrderFlow};
use orderly_core::reply::Reply;
use orderly_db::OrderLedger;

use crate::store::{SessionStore, StoreError};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Keyed mutexes giving each sender a critical section around its session.
/// Entries are pruned under the map lock once nothing holds or waits on them.
#[derive(Default)]
struct SenderLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SenderLocks {
    async fn acquire(&self, sender: &SenderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks.entry(sender.0.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn prune(&self) {
        let mut locks = self.inner.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Drives one state transition per inbound message under per-sender mutual
/// exclusion. The ledger append happens inside the critical section, before
/// the terminal reply, so a finalize is atomic from the sender's point of
/// view.
pub struct OrderAgent {
    flow: OrderFlow,
    store: Arc<dyn SessionStore>,
    ledger: Arc<dyn OrderLedger>,
    environment_tag: String,
    locks: SenderLocks,
}

impl OrderAgent {
    pub fn new(
        flow: OrderFlow,
        store: Arc<dyn SessionStore>,
        ledger: Arc<dyn OrderLedger>,
        environment_tag: impl Into<String>,
    ) -> Self {
        Self {
            flow,
            store,
            ledger,
            environment_tag: environment_tag.into(),
            locks: SenderLocks::default(),
        }
    }

    pub async fn handle_message(
        &self,
        sender: &SenderId,
        body: &str,
    ) -> Result<Vec<Reply>, AgentError> {
        let _guard = self.locks.acquire(sender).await;
        let now = Utc::now();
        let (mut session, was_new) = self.store.get_or_create(sender, now).await?;

        if was_new {
            debug!(
                event_name = "agent.session.opened",
                sender = %sender.0,
                "conversation opened, sending menu"
            );
            return Ok(self.flow.welcome());
        }

        let outcome = self.flow.apply(&session.step, &session.cart, body);
        match outcome.disposition {
            Disposition::Stay => {
                session.touch(now);
                self.store.save(session).await?;
                Ok(outcome.replies)
            }
            Disposition::Advance(step) => {
                debug!(
                    event_name = "agent.session.advanced",
                    sender = %sender.0,
                    step = ?step,
                    "conversation advanced"
                );
                session.step = step;
                session.touch(now);
                self.store.save(session).await?;
                Ok(outcome.replies)
            }
            Disposition::AddLine { line, next } => {
                debug!(
                    event_name = "agent.cart.line_added",
                    sender = %sender.0,
                    product = %line.product_name,
                    variant = %line.variant_name.0,
                    quantity = line.quantity,
                    "cart line committed"
                );
                session.cart.push(line);
                session.step = next;
                session.touch(now);
                self.store.save(session).await?;
                Ok(outcome.replies)
            }
            Disposition::Cancel => {
                info!(
                    event_name = "agent.session.cancelled",
                    sender = %sender.0,
                    "order cancelled by sender"
                );
                self.store.delete(sender).await?;
                Ok(outcome.replies)
            }
            Disposition::Reset => {
                warn!(
                    event_name = "agent.session.reset",
                    sender = %sender.0,
                    "session referenced unknown catalog entries, restarting conversation"
                );
                self.store.save(Session::new(sender.clone(), now)).await?;
                Ok(outcome.replies)
            }
            Disposition::Finalize { location } => {
                self.finalize(session, location, outcome.replies, now).await
            }
        }
    }

    /// Periodic maintenance: drop idle sessions and their lock entries.
    pub async fn evict_idle_sessions(&self, max_idle: Duration) -> Result<usize, AgentError> {
        let evicted = self.store.evict_idle(max_idle, Utc::now()).await?;
        self.locks.prune().await;
        if evicted > 0 {
            info!(
                event_name = "agent.session.evicted",
                count = evicted,
                "idle sessions evicted"
            );
        }
        Ok(evicted)
    }

    async fn finalize(
        &self,
        mut session: Session,
        location: String,
        terminal_replies: Vec<Reply>,
        now: chrono::DateTime<Utc>,
    ) -> Result<Vec<Reply>, AgentError> {
        let sender = session.sender.clone();
        let order = PlacedOrder::from_cart(
            sender.clone(),
            &session.cart,
            location,
            self.environment_tag.clone(),
            now,
        );

        match self.ledger.append(&order).await {
            Ok(()) => {
                info!(
                    event_name = "agent.order.placed",
                    sender = %sender.0,
                    order_id = %order.id.0,
                    lines = order.lines.len(),
                    total = %order.total(),
                    "order recorded, closing session"
                );
                self.store.delete(&sender).await?;
                Ok(terminal_replies)
            }
            Err(ledger_error) => {
                // Session stays at the location step so resending the
                // address retries the whole unpersisted line set.
                error!(
                    event_name = "agent.order.persist_failed",
                    sender = %sender.0,
                    order_id = %order.id.0,
                    error = %ledger_error,
                    "ledger append failed, keeping session for retry"
                );
                session.touch(now);
                self.store.save(session).await?;
                Ok(vec![self.flow.persistence_retry()])
            }
        }
    }
}
