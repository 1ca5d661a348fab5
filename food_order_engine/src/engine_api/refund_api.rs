use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use order_common::Money;

use crate::{
    config::GatewayConfig,
    db_types::{NewRefundRecord, Operator, OrderPaymentStatus, PaymentStatus, RefundRecord, RefundStatus, RefundType},
    engine_api::{
        errors::OrderFlowError,
        order_flow_api::{ensure_owner, fetch_existing_order},
        order_objects::{RefundOrderRequest, RefundResult, SettlementOutcome},
    },
    events::{EventProducers, OrderRefundedEvent, OrderStatusChangedEvent},
    gateway::{call_gateway, GatewayCall, PaymentGateway, RefundRequest},
    helpers::{new_transaction_id, TransactionKind},
    order_state::{plan_transition, OrderTransition},
    traits::OrderDatabase,
};

/// `RefundApi` returns money to customers for paid orders that have not been delivered yet.
///
/// A refund may cover the whole payment or part of it. Refunds against the same payment are serialised: while one is
/// in flight the order's payment status is `REFUNDING` and a second refund is rejected. Once the refunds add up to the
/// whole payment, the order is cancelled.
pub struct RefundApi<B, G> {
    db: B,
    gateway: G,
    timeout: Duration,
    producers: EventProducers,
}

impl<B, G> Debug for RefundApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi (timeout: {:?})", self.timeout)
    }
}

impl<B, G> RefundApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, timeout: GatewayConfig::default().timeout, producers }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> RefundApi<B, G>
where
    B: OrderDatabase,
    G: PaymentGateway,
{
    pub async fn refund_order(
        &self,
        order_id: i64,
        user_id: i64,
        request: RefundOrderRequest,
    ) -> Result<RefundResult, OrderFlowError> {
        let order = fetch_existing_order(&self.db, order_id).await?;
        ensure_owner(&order, user_id)?;
        if !order.order_status.is_paid() || order.payment_status != OrderPaymentStatus::Success {
            warn!(
                "💸️ User {user_id} asked for a refund on order {order_id}, which is {} with payment status {}",
                order.order_status, order.payment_status
            );
            return Err(OrderFlowError::Validation(format!(
                "Order {order_id} is {} with payment status {}, and cannot be refunded",
                order.order_status, order.payment_status
            )));
        }
        if !self.gateway.supports(order.payment_method) {
            return Err(OrderFlowError::Validation(format!("Unsupported payment method {}", order.payment_method)));
        }
        let payment = self
            .db
            .fetch_payments_for_order(order_id)
            .await?
            .into_iter()
            .find(|p| p.payment_status == PaymentStatus::Success)
            .ok_or_else(|| OrderFlowError::Validation(format!("Order {order_id} has no successful payment")))?;

        let refunded_so_far = self
            .db
            .fetch_refunds_for_order(order_id)
            .await?
            .iter()
            .filter(|r| r.payment_id == payment.id && r.refund_status != RefundStatus::Failed)
            .try_fold(Money::zero(), |acc, r| acc.checked_add(r.refund_amount))
            .ok_or_else(|| OrderFlowError::DatabaseError(format!("Refund total overflow on payment {}", payment.id)))?;
        let remaining = payment.payment_amount.checked_sub(refunded_so_far).unwrap_or_default();
        let amount = request.amount.unwrap_or(remaining);
        if !amount.is_positive() || amount > remaining {
            warn!("💸️ Refund of {amount} on order {order_id} rejected. {remaining} remains refundable");
            return Err(OrderFlowError::Validation(format!(
                "A refund must be more than zero and at most {remaining}, but was {amount}"
            )));
        }
        let refund_type = if refunded_so_far.is_zero() && amount == payment.payment_amount {
            RefundType::Full
        } else {
            RefundType::Partial
        };

        let refund_transaction_id = new_transaction_id(TransactionKind::Refund, Utc::now());
        let refund = self
            .db
            .begin_refund(NewRefundRecord {
                order_id,
                payment_id: payment.id,
                refund_amount: amount,
                refund_reason: request.reason,
                refund_type,
                processor_type: self.gateway.processor_type().to_string(),
                refund_transaction_id: refund_transaction_id.clone(),
            })
            .await?;
        debug!("💸️ Refunding {amount} of [{}] for order {order_id} as [{refund_transaction_id}]", payment.transaction_id);

        let gateway_request = RefundRequest {
            refund_transaction_id,
            original_transaction_id: payment.transaction_id.clone(),
            amount,
            method: order.payment_method,
        };
        match call_gateway(self.timeout, self.gateway.refund(&gateway_request)).await {
            GatewayCall::Succeeded(receipt) => {
                debug!(
                    "💸️ Gateway returned {amount} as [{}] with reference {}",
                    gateway_request.refund_transaction_id, receipt.reference
                );
                self.complete_refund(refund, payment.payment_amount, refunded_so_far, Operator::User(user_id)).await
            },
            GatewayCall::Failed(e) => {
                info!("💸️ Refund [{}] for order {order_id} failed. {e}", gateway_request.refund_transaction_id);
                self.db.record_refund_failure(refund.id).await?;
                Err(e.into())
            },
            GatewayCall::TimedOut(waited) => {
                warn!(
                    "💸️ No answer from the gateway for refund [{}] after {waited:?}. It is left pending and order \
                     {order_id} stays in REFUNDING until the refund is reconciled.",
                    gateway_request.refund_transaction_id
                );
                Err(OrderFlowError::GatewayOutcomeUnknown {
                    reference: gateway_request.refund_transaction_id.clone(),
                    waited,
                })
            },
        }
    }

    /// Settles a refund that was left `PENDING` because the gateway did not answer in time.
    ///
    /// Until this is called the order stays in `REFUNDING`, and can be neither refunded again nor moved along. An
    /// approved refund completes exactly as a timely approval would have, cancelling the order if the payment is now
    /// fully refunded. A declined one is marked `FAILED` and the order goes back to its pre-refund state.
    pub async fn reconcile_refund(
        &self,
        refund_id: i64,
        outcome: SettlementOutcome,
    ) -> Result<RefundResult, OrderFlowError> {
        let refund = self
            .db
            .fetch_refund(refund_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("Refund record {refund_id}")))?;
        if refund.refund_status != RefundStatus::Pending {
            return Err(OrderFlowError::Validation(format!(
                "Refund #{refund_id} has already been settled as {}",
                refund.refund_status
            )));
        }
        info!("💸️ Reconciling refund #{refund_id} [{}] as {outcome:?}", refund.refund_transaction_id);
        match outcome {
            SettlementOutcome::Approved => {
                let payment = self
                    .db
                    .fetch_payment(refund.payment_id)
                    .await?
                    .ok_or_else(|| OrderFlowError::NotFound(format!("Payment record {}", refund.payment_id)))?;
                let refunded_before = self
                    .db
                    .fetch_refunds_for_order(refund.order_id)
                    .await?
                    .iter()
                    .filter(|r| {
                        r.id != refund.id && r.payment_id == payment.id && r.refund_status != RefundStatus::Failed
                    })
                    .try_fold(Money::zero(), |acc, r| acc.checked_add(r.refund_amount))
                    .ok_or_else(|| {
                        OrderFlowError::DatabaseError(format!("Refund total overflow on payment {}", payment.id))
                    })?;
                self.complete_refund(refund, payment.payment_amount, refunded_before, Operator::System).await
            },
            SettlementOutcome::Declined => {
                let (refund, order) = self.db.record_refund_failure(refund_id).await?;
                info!("💸️ Refund #{refund_id} declined. Order [{}] is {} again", order.order_number, order.payment_status);
                Ok(RefundResult::from(&refund))
            },
        }
    }

    /// Records an approved refund. If it brings the refunded total up to the payment amount, the order is cancelled
    /// in the same transaction.
    async fn complete_refund(
        &self,
        refund: RefundRecord,
        payment_amount: Money,
        refunded_before: Money,
        operator: Operator,
    ) -> Result<RefundResult, OrderFlowError> {
        let completed_at = Utc::now();
        let fully_refunded = refunded_before.checked_add(refund.refund_amount) == Some(payment_amount);
        let current = fetch_existing_order(&self.db, refund.order_id).await?;
        let change = if fully_refunded {
            let remark = format!("refunded: {}", refund.refund_reason);
            Some(plan_transition(&current, OrderTransition::RefundCancel, operator, Some(remark), completed_at)?)
        } else {
            None
        };
        let (refund, updated) = match self.db.record_refund_success(refund.id, completed_at, change).await {
            Ok(recorded) => recorded,
            Err(e) => {
                error!(
                    "💸️ The gateway returned {} as [{}] for order {}, but the refund could not be recorded. {e}",
                    refund.refund_amount, refund.refund_transaction_id, refund.order_id
                );
                return Err(e.into());
            },
        };
        info!(
            "💸️ Refund [{}] of {} for order [{}] completed. The order is {}",
            refund.refund_transaction_id, refund.refund_amount, updated.order_number, updated.order_status
        );
        let result = RefundResult::from(&refund);
        if fully_refunded {
            self.producers
                .publish_status_changed(OrderStatusChangedEvent::new(updated.clone(), current.order_status, operator))
                .await;
        }
        self.producers.publish_order_refunded(OrderRefundedEvent::new(updated, refund)).await;
        Ok(result)
    }
}
