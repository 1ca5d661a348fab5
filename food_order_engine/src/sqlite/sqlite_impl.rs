//! `SqliteDatabase` is a concrete implementation of a food order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqliteConnection, SqlitePool};

use super::db::{catalog, new_pool, order_items, orders, payments, refunds, status_log};
use crate::{
    config::EngineConfig,
    db_types::{
        Address,
        Dish,
        Money,
        NewOrder,
        NewPaymentRecord,
        NewRefundRecord,
        Operator,
        Order,
        OrderItem,
        OrderPaymentStatus,
        OrderStatusLog,
        OrderStatusType,
        PaymentRecord,
        PaymentStatus,
        RefundRecord,
        RefundStatus,
        Restaurant,
    },
    order_state::StatusChange,
    traits::{CatalogLookup, OrderDatabase, OrderDatabaseError},
};

const CREATED_REMARK: &str = "order created";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl CatalogLookup for SqliteDatabase {
    async fn fetch_restaurant(&self, restaurant_id: i64) -> Result<Option<Restaurant>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let restaurant = catalog::fetch_restaurant(restaurant_id, &mut conn).await?;
        Ok(restaurant)
    }

    async fn fetch_dish(&self, dish_id: i64, restaurant_id: i64) -> Result<Option<Dish>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let dish = catalog::fetch_dish(dish_id, restaurant_id, &mut conn).await?;
        Ok(dish)
    }

    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let address = catalog::fetch_address(address_id, &mut conn).await?;
        Ok(address)
    }
}

impl OrderDatabase for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderItem>), OrderDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let inserted = orders::insert_order(&order, &mut tx).await.map_err(|e| match e {
            sqlx::Error::Database(err) if err.is_unique_violation() => {
                OrderDatabaseError::OrderAlreadyExists(order.order_number.clone())
            },
            e => OrderDatabaseError::from(e),
        })?;
        let items = order_items::insert_items(inserted.id, &order.items, &mut tx).await?;
        status_log::append(
            inserted.id,
            OrderStatusType::Created,
            Operator::User(order.user_id),
            CREATED_REMARK,
            order.created_at,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] saved with id {} and {} items", inserted.order_number, inserted.id, items.len());
        Ok((inserted, items))
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let items = order_items::fetch_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_status_log(&self, order_id: i64) -> Result<Vec<OrderStatusLog>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let entries = status_log::fetch_for_order(order_id, &mut conn).await?;
        Ok(entries)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<PaymentRecord>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<PaymentRecord>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }

    async fn fetch_refund(&self, refund_id: i64) -> Result<Option<RefundRecord>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let refund = refunds::fetch_refund(refund_id, &mut conn).await?;
        Ok(refund)
    }

    async fn fetch_refunds_for_order(&self, order_id: i64) -> Result<Vec<RefundRecord>, OrderDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let refunds = refunds::fetch_refunds_for_order(order_id, &mut conn).await?;
        Ok(refunds)
    }

    async fn apply_status_change(&self, change: StatusChange) -> Result<Order, OrderDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = apply_change_and_log(&change, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {} moved from {} to {} by {}", order.id, change.from, change.to, change.operator);
        Ok(order)
    }

    async fn insert_payment(&self, payment: NewPaymentRecord) -> Result<PaymentRecord, OrderDatabaseError> {
        let mut tx = self.pool.begin().await?;
        // Writing first takes the write lock up front, so a concurrent payment waits for this one to commit and then
        // validates against the committed state.
        let record = payments::insert_payment(payment, Utc::now(), &mut tx).await?;
        let order = orders::fetch_order(record.order_id, &mut tx)
            .await?
            .ok_or(OrderDatabaseError::OrderNotFound(record.order_id))?;
        if order.order_status != OrderStatusType::Created || order.payment_status != OrderPaymentStatus::Pending {
            return Err(OrderDatabaseError::PreconditionMismatch(format!(
                "Order {} is {} with payment status {}, and cannot be paid",
                order.id, order.order_status, order.payment_status
            )));
        }
        if payments::fetch_successful_payment(order.id, &mut tx).await?.is_some() {
            return Err(OrderDatabaseError::PaymentAlreadySucceeded(order.id));
        }
        tx.commit().await?;
        Ok(record)
    }

    async fn record_payment_success(
        &self,
        payment_id: i64,
        paid_at: DateTime<Utc>,
        change: StatusChange,
    ) -> Result<(PaymentRecord, Order), OrderDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order_id = change.order_id;
        let payment = payments::settle_payment(payment_id, PaymentStatus::Success, Some(paid_at), paid_at, &mut tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(err) if err.is_unique_violation() => {
                    OrderDatabaseError::PaymentAlreadySucceeded(order_id)
                },
                e => OrderDatabaseError::from(e),
            })?;
        let payment = match payment {
            Some(p) => p,
            None => return Err(settled_payment_error(payment_id, &mut tx).await?),
        };
        if payment.order_id != order_id {
            return Err(OrderDatabaseError::RecordStatusUpdateError(format!(
                "Payment #{payment_id} belongs to order {}, not order {order_id}",
                payment.order_id
            )));
        }
        let order = apply_change_and_log(&change, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Payment #{payment_id} [{}] recorded. Order {order_id} is now {}", payment.transaction_id, order.order_status);
        Ok((payment, order))
    }

    async fn record_payment_failure(&self, payment_id: i64) -> Result<PaymentRecord, OrderDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::settle_payment(payment_id, PaymentStatus::Failed, None, Utc::now(), &mut tx).await?;
        let payment = match payment {
            Some(p) => p,
            None => return Err(settled_payment_error(payment_id, &mut tx).await?),
        };
        tx.commit().await?;
        debug!("🗃️ Payment #{payment_id} [{}] marked as failed", payment.transaction_id);
        Ok(payment)
    }

    async fn begin_refund(&self, refund: NewRefundRecord) -> Result<RefundRecord, OrderDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        // The compare-and-set goes first so that it takes the write lock. A concurrent refund waits here, then finds
        // the order already REFUNDING.
        orders::set_payment_status(
            refund.order_id,
            OrderPaymentStatus::Success,
            OrderPaymentStatus::Refunding,
            now,
            &mut tx,
        )
        .await?
        .ok_or_else(|| {
            OrderDatabaseError::PreconditionMismatch(format!(
                "Order {} cannot be refunded, since its payment status is no longer SUCCESS",
                refund.order_id
            ))
        })?;
        let payment = payments::fetch_payment(refund.payment_id, &mut tx)
            .await?
            .ok_or(OrderDatabaseError::PaymentNotFound(refund.payment_id))?;
        if payment.payment_status != PaymentStatus::Success || payment.order_id != refund.order_id {
            return Err(OrderDatabaseError::PreconditionMismatch(format!(
                "Payment #{} is {} for order {}, and cannot be refunded against order {}",
                payment.id, payment.payment_status, payment.order_id, refund.order_id
            )));
        }
        let already_refunded = refunded_so_far(payment.id, &mut tx).await?;
        let refundable = payment.payment_amount.checked_sub(already_refunded).unwrap_or_default();
        if !refund.refund_amount.is_positive() || refund.refund_amount > refundable {
            return Err(OrderDatabaseError::RefundExceedsPayment {
                payment_id: payment.id,
                requested: refund.refund_amount,
                refundable,
            });
        }
        let record = refunds::insert_refund(refund, now, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn record_refund_success(
        &self,
        refund_id: i64,
        completed_at: DateTime<Utc>,
        change: Option<StatusChange>,
    ) -> Result<(RefundRecord, Order), OrderDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let refund =
            refunds::settle_refund(refund_id, RefundStatus::Completed, Some(completed_at), completed_at, &mut tx)
                .await?;
        let refund = match refund {
            Some(r) => r,
            None => return Err(settled_refund_error(refund_id, &mut tx).await?),
        };
        let order = match change {
            Some(change) if change.order_id == refund.order_id => apply_change_and_log(&change, &mut tx).await?,
            Some(change) => {
                return Err(OrderDatabaseError::RecordStatusUpdateError(format!(
                    "Refund #{refund_id} belongs to order {}, not order {}",
                    refund.order_id, change.order_id
                )))
            },
            None => release_refunding_order(refund.order_id, &mut tx).await?,
        };
        tx.commit().await?;
        info!(
            "🗃️ Refund #{refund_id} of {} completed. Order {} is {} with payment status {}",
            refund.refund_amount, order.id, order.order_status, order.payment_status
        );
        Ok((refund, order))
    }

    async fn record_refund_failure(&self, refund_id: i64) -> Result<(RefundRecord, Order), OrderDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let refund = refunds::settle_refund(refund_id, RefundStatus::Failed, None, Utc::now(), &mut tx).await?;
        let refund = match refund {
            Some(r) => r,
            None => return Err(settled_refund_error(refund_id, &mut tx).await?),
        };
        let order = release_refunding_order(refund.order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Refund #{refund_id} marked as failed. Order {} is back to {}", order.id, order.payment_status);
        Ok((refund, order))
    }

    async fn close(&mut self) -> Result<(), OrderDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Connects to the database described by `config`. If `auto_migrate` is set, the database is created if it does
    /// not exist yet, and any pending migrations are run.
    pub async fn new_from_config(config: &EngineConfig) -> Result<Self, OrderDatabaseError> {
        let url = config.database_url.as_str();
        if config.auto_migrate && !Sqlite::database_exists(url).await? {
            info!("🗃️ Database {url} does not exist. Creating it.");
            Sqlite::create_database(url).await?;
        }
        let db = Self::new_with_url(url, config.max_connections).await?;
        if config.auto_migrate {
            db.migrate().await?;
        }
        Ok(db)
    }

    /// Runs any pending database migrations.
    pub async fn migrate(&self) -> Result<(), OrderDatabaseError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrderDatabaseError::DatabaseError(format!("Could not run migrations. {e}")))?;
        info!("🗃️ Migrations complete for {}", self.url);
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Applies the change and appends its status log entry. Must run inside a transaction.
async fn apply_change_and_log(
    change: &StatusChange,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderDatabaseError> {
    let order = match orders::apply_status_change(change, &mut *conn).await? {
        Some(order) => order,
        None => {
            let current = orders::fetch_order(change.order_id, &mut *conn)
                .await?
                .ok_or(OrderDatabaseError::OrderNotFound(change.order_id))?;
            warn!(
                "🗃️ Could not {} order {}. Expected {}/{}, but it is {}/{}",
                change.transition,
                change.order_id,
                change.from,
                change.expected_payment_status,
                current.order_status,
                current.payment_status
            );
            return Err(OrderDatabaseError::PreconditionMismatch(format!(
                "Cannot {} order {}, since it is {} with payment status {}",
                change.transition, change.order_id, current.order_status, current.payment_status
            )));
        },
    };
    status_log::append(order.id, change.to, change.operator, &change.remark, change.changed_at, conn).await?;
    Ok(order)
}

/// Returns the order payment status from `REFUNDING` to `SUCCESS` after a partial or failed refund.
async fn release_refunding_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Order, OrderDatabaseError> {
    orders::set_payment_status(order_id, OrderPaymentStatus::Refunding, OrderPaymentStatus::Success, Utc::now(), conn)
        .await?
        .ok_or_else(|| {
            OrderDatabaseError::PreconditionMismatch(format!(
                "Order {order_id} does not have a refund in progress, so its payment status cannot be released"
            ))
        })
}

/// The total of every pending or completed refund against the payment. Failed refunds do not count.
async fn refunded_so_far(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Money, OrderDatabaseError> {
    let refunds = refunds::fetch_refunds_for_payment(payment_id, conn).await?;
    let mut total = Money::zero();
    for refund in refunds.iter().filter(|r| r.refund_status != RefundStatus::Failed) {
        total = total
            .checked_add(refund.refund_amount)
            .ok_or_else(|| OrderDatabaseError::DatabaseError(format!("Refund total overflow on payment {payment_id}")))?;
    }
    Ok(total)
}

async fn settled_payment_error(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderDatabaseError, OrderDatabaseError> {
    let err = match payments::fetch_payment(payment_id, conn).await? {
        Some(p) => OrderDatabaseError::RecordStatusUpdateError(format!(
            "Payment #{payment_id} has already been settled as {}",
            p.payment_status
        )),
        None => OrderDatabaseError::PaymentNotFound(payment_id),
    };
    Ok(err)
}

async fn settled_refund_error(
    refund_id: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderDatabaseError, OrderDatabaseError> {
    let err = match refunds::fetch_refund(refund_id, conn).await? {
        Some(r) => OrderDatabaseError::RecordStatusUpdateError(format!(
            "Refund #{refund_id} has already been settled as {}",
            r.refund_status
        )),
        None => OrderDatabaseError::RefundNotFound(refund_id),
    };
    Ok(err)
}
