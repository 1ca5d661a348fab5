use std::fmt::Debug;

use chrono::{FixedOffset, Offset, Utc};
use log::*;

use crate::{
    db_types::{Operator, Order, OrderStatusType},
    engine_api::{
        errors::OrderFlowError,
        order_assembler::assemble_order,
        order_objects::{CreateOrderResult, NewOrderRequest, OrderDetails, OrderHistory, StatusChangeResult},
    },
    events::{EventProducers, OrderCreatedEvent, OrderStatusChangedEvent},
    helpers::new_order_number,
    order_state::{plan_transition, OrderTransition},
    traits::{OrderDatabase, OrderDatabaseError},
};

const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// `OrderFlowApi` handles placing orders and every status change that is not driven by a payment or a refund:
/// customer cancellations, merchant and rider progress updates, and delivery confirmation.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    service_utc_offset: FixedOffset,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, service_utc_offset: Utc.fix() }
    }

    /// Sets the time zone that `HH:MM` delivery times are interpreted in.
    pub fn with_service_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.service_utc_offset = offset;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderDatabase
{
    /// Validates and places a new order for `user_id`.
    ///
    /// The order, its items, and the first status log entry are stored together. If the generated order number is
    /// already taken, a fresh one is tried, up to three times in all.
    pub async fn create_order(
        &self,
        user_id: i64,
        request: NewOrderRequest,
    ) -> Result<CreateOrderResult, OrderFlowError> {
        let now = Utc::now();
        let mut new_order = assemble_order(&self.db, user_id, &request, now, self.service_utc_offset).await?;
        let mut attempt = 1;
        let (order, items) = loop {
            match self.db.insert_order(new_order.clone()).await {
                Ok(inserted) => break inserted,
                Err(OrderDatabaseError::OrderAlreadyExists(number)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    debug!("🔄️ Order number {number} is taken. Trying another (attempt {attempt})");
                    attempt += 1;
                    new_order = new_order.with_order_number(new_order_number(now));
                },
                Err(e) => return Err(e.into()),
            }
        };
        info!(
            "🔄️📦️ Order [{}] #{} placed by user {user_id} at {} for {}",
            order.order_number, order.id, order.restaurant_name, order.total_amount
        );
        let result = CreateOrderResult {
            order_id: order.id,
            order_number: order.order_number.clone(),
            payment_method: order.payment_method,
        };
        self.producers.publish_order_created(OrderCreatedEvent::new(order, items)).await;
        Ok(result)
    }

    /// The customer cancels an order they have not paid for yet.
    pub async fn cancel_order(&self, order_id: i64, user_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order_for_owner(order_id, user_id).await?;
        self.transition(&order, OrderTransition::Cancel, Operator::User(user_id)).await
    }

    /// The customer confirms that the order has arrived.
    pub async fn confirm_delivery(&self, order_id: i64, user_id: i64) -> Result<StatusChangeResult, OrderFlowError> {
        let order = self.fetch_order_for_owner(order_id, user_id).await?;
        let order = self.transition(&order, OrderTransition::Complete, Operator::User(user_id)).await?;
        Ok(StatusChangeResult::from(&order))
    }

    /// Moves a paid order along to `PREPARING` or `DELIVERING`.
    ///
    /// These are the merchant's "accept order" and the rider's "pick up" actions, so the caller must be the merchant
    /// account of the restaurant. Not even the customer who placed the order may advance it.
    pub async fn advance_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        user_id: i64,
    ) -> Result<StatusChangeResult, OrderFlowError> {
        let order = fetch_existing_order(&self.db, order_id).await?;
        if !self.is_merchant_for(&order, user_id).await? {
            warn!("🔄️ User {user_id} tried to move order {order_id} to {new_status}, but is not its merchant");
            return Err(OrderFlowError::Forbidden(format!(
                "Only the restaurant's merchant can move order {order_id} along"
            )));
        }
        let transition = OrderTransition::for_operator_target(new_status).ok_or_else(|| {
            warn!("🔄️ User {user_id} tried to move order {order_id} to {new_status}, which is not allowed");
            OrderFlowError::Validation(format!("Orders cannot be moved to {new_status} directly"))
        })?;
        let order = self.transition(&order, transition, Operator::User(user_id)).await?;
        Ok(StatusChangeResult::from(&order))
    }

    /// Fetches the order and its items. Visible to the customer and the restaurant's merchant account.
    pub async fn fetch_order(&self, order_id: i64, user_id: i64) -> Result<OrderDetails, OrderFlowError> {
        let order = self.fetch_order_for_participant(order_id, user_id).await?;
        let items = self.db.fetch_order_items(order.id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Fetches the status log and every payment and refund attempt for the order, oldest first.
    pub async fn order_history(&self, order_id: i64, user_id: i64) -> Result<OrderHistory, OrderFlowError> {
        let order = self.fetch_order_for_participant(order_id, user_id).await?;
        let status_log = self.db.fetch_status_log(order.id).await?;
        let payments = self.db.fetch_payments_for_order(order.id).await?;
        let refunds = self.db.fetch_refunds_for_order(order.id).await?;
        Ok(OrderHistory { status_log, payments, refunds })
    }

    async fn transition(
        &self,
        order: &Order,
        transition: OrderTransition,
        operator: Operator,
    ) -> Result<Order, OrderFlowError> {
        let change = plan_transition(order, transition, operator, None, Utc::now()).map_err(|e| {
            warn!("🔄️ {e}. Order {} was left unchanged", order.id);
            OrderFlowError::from(e)
        })?;
        let old_status = change.from;
        let updated = self.db.apply_status_change(change).await?;
        info!("🔄️ Order [{}] is now {}", updated.order_number, updated.order_status);
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(updated.clone(), old_status, operator)).await;
        Ok(updated)
    }

    async fn fetch_order_for_owner(&self, order_id: i64, user_id: i64) -> Result<Order, OrderFlowError> {
        let order = fetch_existing_order(&self.db, order_id).await?;
        ensure_owner(&order, user_id)?;
        Ok(order)
    }

    async fn fetch_order_for_participant(&self, order_id: i64, user_id: i64) -> Result<Order, OrderFlowError> {
        let order = fetch_existing_order(&self.db, order_id).await?;
        if order.user_id == user_id || self.is_merchant_for(&order, user_id).await? {
            Ok(order)
        } else {
            warn!("🔄️ User {user_id} is neither the customer nor the merchant for order {order_id}");
            Err(OrderFlowError::Forbidden(format!("You are not a party to order {order_id}")))
        }
    }

    async fn is_merchant_for(&self, order: &Order, user_id: i64) -> Result<bool, OrderFlowError> {
        let merchant = self.db.fetch_restaurant(order.restaurant_id).await?.and_then(|r| r.merchant_id);
        Ok(merchant == Some(user_id))
    }
}

/// Fetches the order, mapping a missing order to [`OrderFlowError::NotFound`].
pub(crate) async fn fetch_existing_order<B: OrderDatabase>(db: &B, order_id: i64) -> Result<Order, OrderFlowError> {
    db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::NotFound(format!("Order {order_id}")))
}

/// Checks that `user_id` placed the order.
pub(crate) fn ensure_owner(order: &Order, user_id: i64) -> Result<(), OrderFlowError> {
    if order.user_id == user_id {
        Ok(())
    } else {
        warn!("🔄️ User {user_id} tried to act on order {}, which belongs to user {}", order.id, order.user_id);
        Err(OrderFlowError::Forbidden(format!("Order {} does not belong to you", order.id)))
    }
}
