//! Core domain types for the storefront.
//!
//! Identifiers are newtypes over [`Uuid`] so that a cart id can never be
//! handed to an order lookup by accident. Orders additionally carry an
//! [`OrderReference`], the only identifier ever shown outside the system:
//! internal ids stay unguessable and unenumerable across users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of an authenticated user (issued by the auth collaborator).
    UserId
);
uuid_id!(
    /// Identifier of a manga series in the catalog.
    SeriesId
);
uuid_id!(
    /// Identifier of one purchasable volume of a series.
    VolumeId
);
uuid_id!(
    /// Internal order identifier. Never exposed outside the system; use
    /// [`OrderReference`] in anything user-visible.
    OrderId
);
uuid_id!(
    /// Externally-visible opaque order reference.
    OrderReference
);
uuid_id!(
    /// Local identifier of a payment intent mirror row.
    PaymentId
);

/// Money amount in minor units (cents), matching what the payment processor
/// expects on the wire.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from minor units (cents).
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the value in minor units (cents).
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Multiplies a unit price by a line quantity.
    #[must_use]
    pub const fn times(&self, quantity: u32) -> Self {
        Self(self.0 * quantity as i64)
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, std::ops::Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `self.0 / 100` loses the sign for -99..=-1, so render sign and
        // magnitude separately.
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Lifecycle status of an order.
///
/// `Pending → Paid` on payment success; `Pending → Cancelled` is reserved
/// for policy decisions outside this core; `Paid → Shipped` belongs to
/// fulfillment. `Paid` is terminal with respect to payment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment; the only payable state.
    Pending,
    /// Payment settled; ownership has been granted.
    Paid,
    /// Handed to fulfillment (outside this core's responsibility).
    Shipped,
    /// Abandoned or administratively cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Stable string form used in storage and API payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from the stable string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "shipped" => Some(Self::Shipped),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether a payment intent may be created for an order in this state.
    #[must_use]
    pub const fn is_payable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a payment intent, mirrored from the processor.
///
/// `Succeeded` and `Failed` are terminal for this core; `RequiresAction`
/// and `Cancelled` are pass-through statuses recorded without side effects.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created, awaiting the processor's verdict.
    Pending,
    /// Funds captured; the order has been fulfilled.
    Succeeded,
    /// The processor rejected the payment.
    Failed,
    /// Cancelled on the processor side.
    Cancelled,
    /// The payer must complete an extra step (3DS etc.).
    RequiresAction,
}

impl PaymentStatus {
    /// Stable string form used in storage and API payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RequiresAction => "requires_action",
        }
    }

    /// Parse from the stable string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "requires_action" => Some(Self::RequiresAction),
            _ => None,
        }
    }

    /// Map a raw processor status string, defaulting to `Pending` for
    /// intermediate states this core does not track individually.
    #[must_use]
    pub fn from_processor(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Pending)
    }

    /// Whether the reconciler considers this status final.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (volume, quantity) line of a user's cart, as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Volume in the cart.
    pub volume_id: VolumeId,
    /// Units of that volume; never zero (removal deletes the line).
    pub quantity: u32,
    /// When the line was first added.
    pub added_at: DateTime<Utc>,
}

/// A cart line joined with live catalog pricing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedCartLine {
    /// Volume in the cart.
    pub volume_id: VolumeId,
    /// Series the volume belongs to.
    pub series_id: SeriesId,
    /// Volume number within the series.
    pub number: u32,
    /// Units in the cart.
    pub quantity: u32,
    /// Current catalog price per unit.
    pub unit_price: Money,
    /// `unit_price × quantity`.
    pub line_total: Money,
}

/// A user's cart with live-priced totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    /// Priced lines, in insertion order.
    pub lines: Vec<PricedCartLine>,
    /// Sum of line quantities.
    pub total_quantity: u32,
    /// Sum of line totals at current catalog prices.
    pub total_price: Money,
}

impl CartView {
    /// Build a view from priced lines, computing both totals.
    #[must_use]
    pub fn from_lines(lines: Vec<PricedCartLine>) -> Self {
        let total_quantity = lines.iter().map(|l| l.quantity).sum();
        let total_price = lines.iter().map(|l| l.line_total).sum();
        Self {
            lines,
            total_quantity,
            total_price,
        }
    }
}

/// An order header: the immutable commitment snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Internal identifier.
    pub id: OrderId,
    /// Externally-visible opaque reference.
    pub reference: OrderReference,
    /// Owning user.
    pub user_id: UserId,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Total units, frozen at commit.
    pub total_quantity: u32,
    /// Total price, frozen at commit.
    pub total_price: Money,
    /// When the order was committed.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub modified_at: DateTime<Utc>,
}

/// One line of an order: a write-once snapshot of a cart line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Purchased volume.
    pub volume_id: VolumeId,
    /// Series the volume belongs to.
    pub series_id: SeriesId,
    /// Volume number within the series.
    pub number: u32,
    /// Units purchased.
    pub quantity: u32,
    /// Catalog price per unit at the instant of commit. Decouples the
    /// order's historical value from future catalog price changes.
    pub unit_price: Money,
}

impl OrderLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub const fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// An order together with its line snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    /// Order header.
    pub order: Order,
    /// Line snapshots, write-once.
    pub lines: Vec<OrderLine>,
}

/// Local mirror of a processor payment intent, 1:1 with an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Local identifier.
    pub id: PaymentId,
    /// Order this payment settles.
    pub order_id: OrderId,
    /// Processor-assigned transaction id.
    pub transaction_id: String,
    /// Opaque secret handed to the payer's client-side SDK.
    pub client_secret: String,
    /// Mirrored processor status; mutated only by the reconciler.
    pub status: PaymentStatus,
    /// Amount, equal to the order's frozen total.
    pub amount: Money,
    /// ISO currency code.
    pub currency: String,
    /// Arbitrary processor metadata blob.
    pub metadata: serde_json::Value,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub modified_at: DateTime<Utc>,
}

/// A volume the user permanently owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedVolume {
    /// Owned volume.
    pub volume_id: VolumeId,
    /// Series the volume belongs to.
    pub series_id: SeriesId,
    /// Volume number within the series.
    pub number: u32,
}

/// Snapshot handed to the notification collaborator when an order is paid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Paid order's reference.
    pub reference: OrderReference,
    /// User who paid.
    pub user_id: UserId,
    /// Total units purchased.
    pub total_quantity: u32,
    /// Total amount paid.
    pub total_price: Money,
    /// Line snapshots.
    pub lines: Vec<OrderLine>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn money_display_and_arithmetic() {
        let m = Money::from_cents(1234);
        assert_eq!(m.cents(), 1234);
        assert_eq!(m.to_string(), "12.34");
        assert_eq!(m.times(3), Money::from_cents(3702));
        assert_eq!(
            [Money::from_cents(100), Money::from_cents(250)]
                .into_iter()
                .sum::<Money>(),
            Money::from_cents(350)
        );
    }

    #[test]
    fn money_display_keeps_the_sign_below_one_unit() {
        assert_eq!(Money::from_cents(-50).to_string(), "-0.50");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
    }

    #[test]
    fn order_status_round_trips() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("unknown"), None);
        assert!(OrderStatus::Pending.is_payable());
        assert!(!OrderStatus::Paid.is_payable());
    }

    #[test]
    fn payment_status_maps_processor_strings() {
        assert_eq!(
            PaymentStatus::from_processor("succeeded"),
            PaymentStatus::Succeeded
        );
        // US spelling used by the processor.
        assert_eq!(
            PaymentStatus::from_processor("canceled"),
            PaymentStatus::Cancelled
        );
        // Intermediate processor states collapse to pending.
        assert_eq!(
            PaymentStatus::from_processor("requires_payment_method"),
            PaymentStatus::Pending
        );
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(!PaymentStatus::RequiresAction.is_terminal());
    }

    #[test]
    fn cart_view_totals() {
        let lines = vec![
            PricedCartLine {
                volume_id: VolumeId::new(),
                series_id: SeriesId::new(),
                number: 1,
                quantity: 2,
                unit_price: Money::from_cents(1000),
                line_total: Money::from_cents(2000),
            },
            PricedCartLine {
                volume_id: VolumeId::new(),
                series_id: SeriesId::new(),
                number: 2,
                quantity: 1,
                unit_price: Money::from_cents(500),
                line_total: Money::from_cents(500),
            },
        ];
        let view = CartView::from_lines(lines);
        assert_eq!(view.total_quantity, 3);
        assert_eq!(view.total_price, Money::from_cents(2500));
    }

    #[test]
    fn ids_parse_and_display() {
        let id = OrderReference::new();
        let parsed: OrderReference = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
