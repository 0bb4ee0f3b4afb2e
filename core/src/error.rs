//! Error taxonomy for the storefront core.

use thiserror::Error;

/// Result type alias for storefront operations.
pub type Result<T> = std::result::Result<T, ShopError>;

/// Error taxonomy for cart, order and payment operations.
///
/// Variants are organized by how they propagate: validation and conflict
/// errors surface to the caller with no state change, external-service
/// errors surface as retryable, and signature failures are rejected at the
/// webhook boundary before any ledger write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShopError {
    /// Invalid input from the caller (bad quantity, malformed payload).
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// Requested entity does not exist, or belongs to another user.
    ///
    /// Cross-user access deliberately maps here rather than to a
    /// forbidden-style error so that existence never leaks across users.
    #[error("{resource} not found")]
    NotFound {
        /// Kind of entity that was looked up.
        resource: &'static str,
    },

    /// Committing an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// A payment intent already exists for this order.
    #[error("A payment already exists for this order")]
    DuplicatePayment,

    /// The order is not in a payable state.
    #[error("Order cannot be paid in status {status}")]
    OrderNotPayable {
        /// Current order status.
        status: crate::types::OrderStatus,
    },

    /// Generic state conflict (e.g. a race lost against a concurrent writer).
    #[error("Conflict: {message}")]
    Conflict {
        /// Explanation of the conflicting state.
        message: String,
    },

    /// The payment processor (or another remote collaborator) failed.
    ///
    /// Callers may retry; no local state has been committed.
    #[error("External service error: {message}")]
    ExternalService {
        /// Upstream failure description.
        message: String,
    },

    /// Webhook signature could not be verified.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        /// Driver-level failure description.
        message: String,
    },
}

impl ShopError {
    /// Build a validation error from any displayable message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build an external-service error from any displayable message.
    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
        }
    }

    /// Build a database error from any displayable message.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is caused by the caller's input or the
    /// current state of their data, rather than by the system itself.
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::NotFound { .. }
                | Self::EmptyCart
                | Self::DuplicatePayment
                | Self::OrderNotPayable { .. }
                | Self::Conflict { .. }
        )
    }

    /// Returns `true` if retrying the same call may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService { .. } | Self::Database { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::OrderStatus;

    #[test]
    fn user_errors_are_classified() {
        assert!(ShopError::EmptyCart.is_user_error());
        assert!(ShopError::DuplicatePayment.is_user_error());
        assert!(
            ShopError::OrderNotPayable {
                status: OrderStatus::Paid
            }
            .is_user_error()
        );
        assert!(!ShopError::InvalidSignature.is_user_error());
        assert!(!ShopError::external("boom").is_user_error());
    }

    #[test]
    fn retryable_errors_are_classified() {
        assert!(ShopError::external("processor timeout").is_retryable());
        assert!(ShopError::database("connection reset").is_retryable());
        assert!(!ShopError::EmptyCart.is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = ShopError::OrderNotPayable {
            status: OrderStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "Order cannot be paid in status cancelled");
    }
}
