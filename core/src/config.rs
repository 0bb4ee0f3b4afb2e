//! Storefront configuration.
//!
//! Policy values are provided by the application, not hardcoded in the
//! operations that enforce them.

use std::time::Duration;

/// Cart mutation policy.
#[derive(Debug, Clone)]
pub struct CartPolicy {
    /// Maximum quantity a single cart line may be set to.
    ///
    /// Default: 10
    pub max_quantity: u32,
}

impl CartPolicy {
    /// Create the default policy.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_quantity: 10 }
    }

    /// Set the per-line maximum quantity.
    #[must_use]
    pub const fn with_max_quantity(mut self, max_quantity: u32) -> Self {
        self.max_quantity = max_quantity;
        self
    }

    /// Validate a prospective line quantity against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ShopError::Validation`](crate::error::ShopError) above the
    /// maximum.
    pub fn check_quantity(&self, quantity: u32) -> crate::error::Result<()> {
        if quantity > self.max_quantity {
            return Err(crate::error::ShopError::validation(format!(
                "quantity {quantity} exceeds the per-line maximum of {}",
                self.max_quantity
            )));
        }
        Ok(())
    }
}

impl Default for CartPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Payment processor configuration.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// ISO currency code all intents are created in.
    ///
    /// Default: "eur"
    pub currency: String,

    /// Bound on the outbound intent-creation call. The call is never
    /// retried automatically; callers rely on the idempotency key instead.
    ///
    /// Default: 10 seconds
    pub processor_timeout: Duration,

    /// Maximum accepted age of a webhook signature timestamp.
    ///
    /// Default: 5 minutes
    pub signature_tolerance: Duration,
}

impl PaymentConfig {
    /// Create a configuration with the given currency.
    #[must_use]
    pub const fn new(currency: String) -> Self {
        Self {
            currency,
            processor_timeout: Duration::from_secs(10),
            signature_tolerance: Duration::from_secs(300),
        }
    }

    /// Set the outbound processor call timeout.
    #[must_use]
    pub const fn with_processor_timeout(mut self, timeout: Duration) -> Self {
        self.processor_timeout = timeout;
        self
    }

    /// Set the webhook signature timestamp tolerance.
    #[must_use]
    pub const fn with_signature_tolerance(mut self, tolerance: Duration) -> Self {
        self.signature_tolerance = tolerance;
        self
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self::new("eur".to_string())
    }
}
