use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cart::{Cart, CartLine};
use crate::domain::session::SenderId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// The finalize artifact: everything the ledger needs to record one completed
/// conversation, one row per cart line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub sender: SenderId,
    pub location: String,
    pub environment: String,
    pub lines: Vec<CartLine>,
    pub placed_at: DateTime<Utc>,
}

impl PlacedOrder {
    pub fn from_cart(
        sender: SenderId,
        cart: &Cart,
        location: String,
        environment: String,
        placed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            sender,
            location,
            environment,
            lines: cart.lines().to_vec(),
            placed_at,
        }
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}
