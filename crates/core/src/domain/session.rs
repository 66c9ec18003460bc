use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::cart::Cart;
use crate::domain::catalog::{ProductCode, VariantName};

/// External identity a conversation belongs to (phone number / channel id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderId(pub String);

/// Conversation position. Each variant carries exactly the fields that step
/// needs; `taken` is the set of variants already committed for the active
/// product round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    SelectingProduct,
    SelectingVariant { product: ProductCode, taken: BTreeSet<VariantName> },
    AwaitingQuantity { product: ProductCode, taken: BTreeSet<VariantName>, variant: VariantName },
    AddAnotherVariant { product: ProductCode, taken: BTreeSet<VariantName> },
    AddAnotherProduct,
    Confirming,
    AwaitingLocation,
}

/// Per-sender conversation state. Created on first contact, mutated exactly
/// once per inbound message, deleted on cancel or successful finalize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub sender: SenderId,
    pub step: Step,
    pub cart: Cart,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn new(sender: SenderId, now: DateTime<Utc>) -> Self {
        Self {
            sender,
            step: Step::SelectingProduct,
            cart: Cart::default(),
            started_at: now,
            last_activity_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    pub fn idle_since(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_activity_at
    }
}
