//! PostgreSQL implementation of the storefront store contract.

use crate::{db_error, is_unique_violation};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tomeshop_core::error::{Result, ShopError};
use tomeshop_core::store::{EventDisposition, NewPayment, SettlementOutcome, ShopStore};
use tomeshop_core::types::{
    CartLine, Order, OrderDetail, OrderLine, OrderReceipt, OwnedVolume, Payment,
};
use tomeshop_core::{
    Money, OrderId, OrderReference, OrderStatus, PaymentId, PaymentStatus, SeriesId, UserId,
    VolumeId,
};
use uuid::Uuid;

/// PostgreSQL store for carts, orders, payments and ledgers.
#[derive(Clone)]
pub struct PostgresShopStore {
    pool: PgPool,
}

impl PostgresShopStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns a database error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ShopError::database(format!("migration failed: {e}")))?;
        Ok(())
    }
}

fn to_u32(value: i32, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| ShopError::database(format!("negative {what} in storage")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| ShopError::validation("quantity out of range"))
}

fn order_status(raw: &str) -> Result<OrderStatus> {
    OrderStatus::parse(raw)
        .ok_or_else(|| ShopError::database(format!("unknown order status '{raw}'")))
}

fn payment_status(raw: &str) -> Result<PaymentStatus> {
    PaymentStatus::parse(raw)
        .ok_or_else(|| ShopError::database(format!("unknown payment status '{raw}'")))
}

fn cart_line_from_row(row: &PgRow) -> Result<CartLine> {
    let decode = |e| db_error("decode cart line", &e);
    Ok(CartLine {
        volume_id: VolumeId(row.try_get("volume_id").map_err(decode)?),
        quantity: to_u32(row.try_get("quantity").map_err(decode)?, "quantity")?,
        added_at: row.try_get("added_at").map_err(decode)?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let decode = |e| db_error("decode order", &e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(Order {
        id: OrderId(row.try_get("id").map_err(decode)?),
        reference: OrderReference(row.try_get("reference").map_err(decode)?),
        user_id: UserId(row.try_get("user_id").map_err(decode)?),
        status: order_status(&status)?,
        total_quantity: to_u32(
            row.try_get("total_quantity").map_err(decode)?,
            "total quantity",
        )?,
        total_price: Money::from_cents(row.try_get("total_price_cents").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
        modified_at: row.try_get("modified_at").map_err(decode)?,
    })
}

fn order_line_from_row(row: &PgRow) -> Result<OrderLine> {
    let decode = |e| db_error("decode order line", &e);
    Ok(OrderLine {
        volume_id: VolumeId(row.try_get("volume_id").map_err(decode)?),
        series_id: SeriesId(row.try_get("series_id").map_err(decode)?),
        number: to_u32(row.try_get("number").map_err(decode)?, "volume number")?,
        quantity: to_u32(row.try_get("quantity").map_err(decode)?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents").map_err(decode)?),
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment> {
    let decode = |e| db_error("decode payment", &e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(Payment {
        id: PaymentId(row.try_get("id").map_err(decode)?),
        order_id: OrderId(row.try_get("order_id").map_err(decode)?),
        transaction_id: row.try_get("transaction_id").map_err(decode)?,
        client_secret: row.try_get("client_secret").map_err(decode)?,
        status: payment_status(&status)?,
        amount: Money::from_cents(row.try_get("amount_cents").map_err(decode)?),
        currency: row.try_get("currency").map_err(decode)?,
        metadata: row.try_get("metadata").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        modified_at: row.try_get("modified_at").map_err(decode)?,
    })
}

const SELECT_PAYMENT: &str = "SELECT id, order_id, transaction_id, client_secret, status, \
     amount_cents, currency, metadata, created_at, modified_at FROM payments";

impl PostgresShopStore {
    async fn order_lines(&self, order_ids: &[Uuid]) -> Result<Vec<(OrderId, OrderLine)>> {
        let rows = sqlx::query(
            "SELECT order_id, volume_id, series_id, number, quantity, unit_price_cents \
             FROM order_lines WHERE order_id = ANY($1) ORDER BY number",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load order lines", &e))?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            let order_id = OrderId(
                row.try_get("order_id")
                    .map_err(|e| db_error("decode order line", &e))?,
            );
            lines.push((order_id, order_line_from_row(row)?));
        }
        Ok(lines)
    }
}

impl ShopStore for PostgresShopStore {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            "SELECT volume_id, quantity, added_at FROM cart_lines \
             WHERE user_id = $1 ORDER BY added_at",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load cart", &e))?;
        rows.iter().map(cart_line_from_row).collect()
    }

    async fn cart_add(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin cart add", &e))?;

        // Lazily create the cart and count the mutation in one statement.
        sqlx::query(
            "INSERT INTO carts (user_id, version) VALUES ($1, 1) \
             ON CONFLICT (user_id) DO UPDATE \
             SET version = carts.version + 1, modified_at = now()",
        )
        .bind(user_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("touch cart", &e))?;

        let row = sqlx::query(
            "INSERT INTO cart_lines (user_id, volume_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, volume_id) \
             DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity \
             RETURNING volume_id, quantity, added_at",
        )
        .bind(user_id.0)
        .bind(volume_id.0)
        .bind(to_i32(quantity)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("upsert cart line", &e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit cart add", &e))?;
        cart_line_from_row(&row)
    }

    async fn cart_set_quantity(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin cart update", &e))?;

        let row = sqlx::query(
            "UPDATE cart_lines SET quantity = $3 \
             WHERE user_id = $1 AND volume_id = $2 \
             RETURNING volume_id, quantity, added_at",
        )
        .bind(user_id.0)
        .bind(volume_id.0)
        .bind(to_i32(quantity)?)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("update cart line", &e))?
        .ok_or(ShopError::NotFound {
            resource: "cart line",
        })?;

        sqlx::query(
            "UPDATE carts SET version = version + 1, modified_at = now() WHERE user_id = $1",
        )
        .bind(user_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("touch cart", &e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit cart update", &e))?;
        cart_line_from_row(&row)
    }

    async fn cart_remove(&self, user_id: UserId, volume_id: VolumeId) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin cart remove", &e))?;

        let removed = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND volume_id = $2")
            .bind(user_id.0)
            .bind(volume_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete cart line", &e))?
            .rows_affected()
            > 0;

        if removed {
            sqlx::query(
                "UPDATE carts SET version = version + 1, modified_at = now() WHERE user_id = $1",
            )
            .bind(user_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("touch cart", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit cart remove", &e))?;
        Ok(removed)
    }

    async fn cart_clear(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("clear cart", &e))?;
        Ok(())
    }

    async fn commit_order(&self, user_id: UserId) -> Result<OrderDetail> {
        let started = std::time::Instant::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin order commit", &e))?;

        // The cart row lock serializes commits per user; the version check
        // makes the loser of a double-commit race fail instead of minting a
        // second order from the same cart state.
        let cart = sqlx::query(
            "SELECT version, committed_version FROM carts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock cart", &e))?;
        let Some(cart) = cart else {
            return Err(ShopError::EmptyCart);
        };
        let version: i64 = cart
            .try_get("version")
            .map_err(|e| db_error("decode cart", &e))?;
        let committed: Option<i64> = cart
            .try_get("committed_version")
            .map_err(|e| db_error("decode cart", &e))?;

        let raw_count: i64 = sqlx::query_scalar("SELECT count(*) FROM cart_lines WHERE user_id = $1")
            .bind(user_id.0)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("count cart lines", &e))?;
        if raw_count == 0 {
            return Err(ShopError::EmptyCart);
        }
        if committed == Some(version) {
            return Err(ShopError::Conflict {
                message: "cart already committed; modify it before committing again".to_string(),
            });
        }

        let rows = sqlx::query(
            "SELECT cl.volume_id, cl.quantity, v.series_id, v.number, v.unit_price_cents \
             FROM cart_lines cl JOIN volumes v ON v.id = cl.volume_id \
             WHERE cl.user_id = $1 ORDER BY cl.added_at",
        )
        .bind(user_id.0)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("snapshot cart lines", &e))?;
        if rows.len() < usize::try_from(raw_count).unwrap_or(usize::MAX) {
            // A carted volume was pruned from the catalog.
            return Err(ShopError::NotFound { resource: "volume" });
        }

        let lines: Vec<OrderLine> = rows
            .iter()
            .map(order_line_from_row)
            .collect::<Result<_>>()?;
        let total_quantity: u32 = lines.iter().map(|l| l.quantity).sum();
        let total_price: Money = lines.iter().map(OrderLine::line_total).sum();

        let order_row = sqlx::query(
            "INSERT INTO orders (id, reference, user_id, status, total_quantity, total_price_cents) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, reference, user_id, status, total_quantity, total_price_cents, \
                       created_at, modified_at",
        )
        .bind(OrderId::new().0)
        .bind(OrderReference::new().0)
        .bind(user_id.0)
        .bind(OrderStatus::Pending.as_str())
        .bind(to_i32(total_quantity)?)
        .bind(total_price.cents())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("insert order", &e))?;
        let order = order_from_row(&order_row)?;

        for line in &lines {
            sqlx::query(
                "INSERT INTO order_lines \
                 (order_id, volume_id, series_id, number, quantity, unit_price_cents) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id.0)
            .bind(line.volume_id.0)
            .bind(line.series_id.0)
            .bind(to_i32(line.number)?)
            .bind(to_i32(line.quantity)?)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("insert order line", &e))?;
        }

        sqlx::query("UPDATE carts SET committed_version = $2 WHERE user_id = $1")
            .bind(user_id.0)
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("record committed version", &e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit order transaction", &e))?;
        metrics::histogram!("tomeshop_db_order_commit_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(OrderDetail { order, lines })
    }

    async fn order_by_reference(
        &self,
        user_id: UserId,
        reference: OrderReference,
    ) -> Result<OrderDetail> {
        let row = sqlx::query(
            "SELECT id, reference, user_id, status, total_quantity, total_price_cents, \
                    created_at, modified_at \
             FROM orders WHERE reference = $1 AND user_id = $2",
        )
        .bind(reference.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load order", &e))?
        .ok_or(ShopError::NotFound { resource: "order" })?;
        let order = order_from_row(&row)?;

        let lines = self
            .order_lines(&[order.id.0])
            .await?
            .into_iter()
            .map(|(_, line)| line)
            .collect();
        Ok(OrderDetail { order, lines })
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetail>> {
        let rows = sqlx::query(
            "SELECT id, reference, user_id, status, total_quantity, total_price_cents, \
                    created_at, modified_at \
             FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load orders", &e))?;

        let orders: Vec<Order> = rows.iter().map(order_from_row).collect::<Result<_>>()?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.0).collect();
        let mut lines = self.order_lines(&ids).await?;

        Ok(orders
            .into_iter()
            .map(|order| {
                let mut own = Vec::new();
                lines.retain(|(order_id, line)| {
                    if *order_id == order.id {
                        own.push(line.clone());
                        false
                    } else {
                        true
                    }
                });
                OrderDetail { order, lines: own }
            })
            .collect())
    }

    async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE order_id = $1"))
            .bind(order_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("load payment", &e))?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin payment insert", &e))?;

        let existing = sqlx::query("SELECT status FROM payments WHERE order_id = $1 FOR UPDATE")
            .bind(payment.order_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("lock payment", &e))?;
        if let Some(row) = existing {
            let raw: String = row
                .try_get("status")
                .map_err(|e| db_error("decode payment", &e))?;
            if !matches!(
                payment_status(&raw)?,
                PaymentStatus::Failed | PaymentStatus::Cancelled
            ) {
                return Err(ShopError::DuplicatePayment);
            }
            // Supersede the dead intent; the order keeps exactly one row.
            sqlx::query("DELETE FROM payments WHERE order_id = $1")
                .bind(payment.order_id.0)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("supersede payment", &e))?;
        }

        let row = sqlx::query(
            "INSERT INTO payments \
             (id, order_id, transaction_id, client_secret, status, amount_cents, currency, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, order_id, transaction_id, client_secret, status, amount_cents, \
                       currency, metadata, created_at, modified_at",
        )
        .bind(PaymentId::new().0)
        .bind(payment.order_id.0)
        .bind(&payment.transaction_id)
        .bind(&payment.client_secret)
        .bind(payment.status.as_str())
        .bind(payment.amount.cents())
        .bind(&payment.currency)
        .bind(&payment.metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ShopError::DuplicatePayment
            } else {
                db_error("insert payment", &e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit payment insert", &e))?;
        payment_from_row(&row)
    }

    async fn payment_by_lookup(&self, user_id: UserId, lookup: &str) -> Result<Payment> {
        let local_id: Option<Uuid> = lookup.parse().ok();
        let row = sqlx::query(
            "SELECT p.id, p.order_id, p.transaction_id, p.client_secret, p.status, \
                    p.amount_cents, p.currency, p.metadata, p.created_at, p.modified_at \
             FROM payments p JOIN orders o ON o.id = p.order_id \
             WHERE o.user_id = $1 AND (p.transaction_id = $2 OR p.id = $3)",
        )
        .bind(user_id.0)
        .bind(lookup)
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load payment", &e))?
        .ok_or(ShopError::NotFound {
            resource: "payment",
        })?;
        payment_from_row(&row)
    }

    async fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<EventDisposition> {
        let inserted = sqlx::query(
            "INSERT INTO webhook_events (event_id, event_type, payload) VALUES ($1, $2, $3) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("record webhook event", &e))?;
        if inserted.rows_affected() == 1 {
            return Ok(EventDisposition::Fresh);
        }

        let processed: bool =
            sqlx::query_scalar("SELECT processed FROM webhook_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("load webhook event", &e))?;
        Ok(if processed {
            EventDisposition::AlreadyProcessed
        } else {
            EventDisposition::Reapply
        })
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<()> {
        sqlx::query("UPDATE webhook_events SET processed = TRUE WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("mark event processed", &e))?;
        Ok(())
    }

    async fn apply_payment_success(
        &self,
        transaction_id: &str,
    ) -> Result<Option<SettlementOutcome>> {
        let started = std::time::Instant::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin settlement", &e))?;

        // The payment row lock serializes concurrent deliveries for the
        // same transaction.
        let payment = sqlx::query(
            "SELECT id, order_id FROM payments WHERE transaction_id = $1 FOR UPDATE",
        )
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock payment", &e))?;
        let Some(payment) = payment else {
            return Ok(None);
        };
        let order_id: Uuid = payment
            .try_get("order_id")
            .map_err(|e| db_error("decode payment", &e))?;

        sqlx::query(
            "UPDATE payments SET status = $2, modified_at = now() WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .bind(PaymentStatus::Succeeded.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update payment", &e))?;

        let order_row = sqlx::query(
            "SELECT id, reference, user_id, status, total_quantity, total_price_cents, \
                    created_at, modified_at \
             FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock order", &e))?;
        let Some(order_row) = order_row else {
            return Ok(None);
        };
        let order = order_from_row(&order_row)?;

        // PENDING is the only state this transition moves; later states
        // (SHIPPED) must never regress.
        let order_transitioned = order.status == OrderStatus::Pending;
        if order_transitioned {
            sqlx::query("UPDATE orders SET status = $2, modified_at = now() WHERE id = $1")
                .bind(order_id)
                .bind(OrderStatus::Paid.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("update order", &e))?;
        }

        let line_rows = sqlx::query(
            "SELECT order_id, volume_id, series_id, number, quantity, unit_price_cents \
             FROM order_lines WHERE order_id = $1 ORDER BY number",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("load order lines", &e))?;
        let lines: Vec<OrderLine> = line_rows
            .iter()
            .map(order_line_from_row)
            .collect::<Result<_>>()?;

        for line in &lines {
            sqlx::query(
                "INSERT INTO ownership_grants (user_id, volume_id, series_id, number) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            )
            .bind(order.user_id.0)
            .bind(line.volume_id.0)
            .bind(line.series_id.0)
            .bind(to_i32(line.number)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("grant ownership", &e))?;
        }

        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(order.user_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("clear cart", &e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit settlement", &e))?;
        metrics::histogram!("tomeshop_db_settlement_seconds")
            .record(started.elapsed().as_secs_f64());

        Ok(Some(SettlementOutcome {
            receipt: OrderReceipt {
                reference: order.reference,
                user_id: order.user_id,
                total_quantity: order.total_quantity,
                total_price: order.total_price,
                lines,
            },
            order_transitioned,
        }))
    }

    async fn apply_payment_failure(&self, transaction_id: &str) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin failure application", &e))?;

        let payment = sqlx::query("SELECT status FROM payments WHERE transaction_id = $1 FOR UPDATE")
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("lock payment", &e))?;
        let Some(payment) = payment else {
            return Ok(false);
        };
        let raw: String = payment
            .try_get("status")
            .map_err(|e| db_error("decode payment", &e))?;

        // An out-of-order failure after success must not regress the mirror.
        if payment_status(&raw)? != PaymentStatus::Succeeded {
            sqlx::query(
                "UPDATE payments SET status = $2, modified_at = now() WHERE transaction_id = $1",
            )
            .bind(transaction_id)
            .bind(PaymentStatus::Failed.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("update payment", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit failure application", &e))?;
        Ok(true)
    }

    async fn mirror_payment_status(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin status mirror", &e))?;

        let payment = sqlx::query("SELECT status FROM payments WHERE transaction_id = $1 FOR UPDATE")
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("lock payment", &e))?;
        let Some(payment) = payment else {
            return Ok(false);
        };
        let raw: String = payment
            .try_get("status")
            .map_err(|e| db_error("decode payment", &e))?;

        if !payment_status(&raw)?.is_terminal() {
            sqlx::query(
                "UPDATE payments SET status = $2, modified_at = now() WHERE transaction_id = $1",
            )
            .bind(transaction_id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("update payment", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit status mirror", &e))?;
        Ok(true)
    }

    async fn has_access(&self, user_id: UserId, volume_id: VolumeId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ownership_grants WHERE user_id = $1 AND volume_id = $2)",
        )
        .bind(user_id.0)
        .bind(volume_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("check ownership", &e))?;
        Ok(exists)
    }

    async fn owned_volumes(&self, user_id: UserId) -> Result<Vec<OwnedVolume>> {
        let rows = sqlx::query(
            "SELECT volume_id, series_id, number FROM ownership_grants \
             WHERE user_id = $1 ORDER BY series_id, number",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load collection", &e))?;

        rows.iter()
            .map(|row| {
                let decode = |e| db_error("decode grant", &e);
                Ok(OwnedVolume {
                    volume_id: VolumeId(row.try_get("volume_id").map_err(decode)?),
                    series_id: SeriesId(row.try_get("series_id").map_err(decode)?),
                    number: to_u32(row.try_get("number").map_err(decode)?, "volume number")?,
                })
            })
            .collect()
    }
}
