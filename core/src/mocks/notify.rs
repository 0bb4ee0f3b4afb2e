//! Mock notifier, for tests.

use crate::error::{Result, ShopError};
use crate::providers::Notifier;
use crate::types::OrderReceipt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    sent: Vec<OrderReceipt>,
    fail: bool,
}

/// In-memory [`Notifier`] that records every receipt it is handed.
#[derive(Clone, Debug, Default)]
pub struct MockNotifier {
    inner: Arc<Mutex<Inner>>,
}

impl MockNotifier {
    /// Create a notifier that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent notification fail with an external error.
    pub fn fail_all(&self) {
        super::lock(&self.inner).fail = true;
    }

    /// Receipts notified so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<OrderReceipt> {
        super::lock(&self.inner).sent.clone()
    }
}

impl Notifier for MockNotifier {
    async fn order_paid(&self, receipt: &OrderReceipt) -> Result<()> {
        let mut inner = super::lock(&self.inner);
        if inner.fail {
            return Err(ShopError::external("notification channel down"));
        }
        inner.sent.push(receipt.clone());
        Ok(())
    }
}
