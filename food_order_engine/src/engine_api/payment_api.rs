use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;

use crate::{
    config::GatewayConfig,
    db_types::{NewPaymentRecord, Operator, Order, OrderPaymentStatus, OrderStatusType, PaymentRecord, PaymentStatus},
    engine_api::{
        errors::OrderFlowError,
        order_flow_api::{ensure_owner, fetch_existing_order},
        order_objects::{PaymentResult, SettlementOutcome},
    },
    events::{EventProducers, OrderPaidEvent, OrderStatusChangedEvent},
    gateway::{call_gateway, ChargeRequest, GatewayCall, PaymentGateway},
    helpers::{new_transaction_id, TransactionKind},
    order_state::{plan_transition, OrderTransition},
    traits::OrderDatabase,
};

/// `PaymentApi` charges customers for their orders through a [`PaymentGateway`].
///
/// Each call to [`PaymentApi::pay_order`] creates one payment record and makes exactly one gateway call. Failed
/// payments are not retried automatically; the customer can simply pay again, which creates a new record.
pub struct PaymentApi<B, G> {
    db: B,
    gateway: G,
    timeout: Duration,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi (timeout: {:?})", self.timeout)
    }
}

impl<B, G> PaymentApi<B, G> {
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

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> PaymentApi<B, G>
where
    B: OrderDatabase,
    G: PaymentGateway,
{
    /// Pays for an order with the payment method chosen when it was placed.
    ///
    /// * If the gateway approves, the payment record becomes `SUCCESS` and the order `CONFIRMED`, in one transaction.
    /// * If the gateway declines, the payment record becomes `FAILED` and the order stays payable.
    /// * If the gateway does not answer in time, the payment record stays `PENDING`, the order is untouched, and
    ///   [`OrderFlowError::GatewayOutcomeUnknown`] is returned.
    pub async fn pay_order(&self, order_id: i64, user_id: i64) -> Result<PaymentResult, OrderFlowError> {
        let order = fetch_existing_order(&self.db, order_id).await?;
        ensure_owner(&order, user_id)?;
        if order.order_status != OrderStatusType::Created || order.payment_status != OrderPaymentStatus::Pending {
            warn!(
                "💰️ User {user_id} tried to pay for order {order_id}, which is {} with payment status {}",
                order.order_status, order.payment_status
            );
            return Err(OrderFlowError::Validation(format!(
                "Order {order_id} is {} with payment status {}, and cannot be paid",
                order.order_status, order.payment_status
            )));
        }
        if !self.gateway.supports(order.payment_method) {
            warn!("💰️ Order {order_id} asks for {}, which the gateway does not support", order.payment_method);
            return Err(OrderFlowError::Validation(format!("Unsupported payment method {}", order.payment_method)));
        }

        let transaction_id = new_transaction_id(TransactionKind::Payment, Utc::now());
        let payment = self
            .db
            .insert_payment(NewPaymentRecord {
                order_id,
                payment_method: order.payment_method,
                payment_amount: order.total_amount,
                transaction_id: transaction_id.clone(),
            })
            .await?;
        debug!("💰️ Charging {} for order {order_id} as [{transaction_id}]", order.total_amount);

        let request = ChargeRequest { transaction_id, amount: order.total_amount, method: order.payment_method };
        match call_gateway(self.timeout, self.gateway.charge(&request)).await {
            GatewayCall::Succeeded(receipt) => {
                debug!("💰️ Gateway approved [{}] with reference {}", request.transaction_id, receipt.reference);
                self.confirm_payment(order, payment, Operator::User(user_id)).await
            },
            GatewayCall::Failed(e) => {
                info!("💰️ Payment [{}] for order {order_id} failed. {e}", request.transaction_id);
                self.db.record_payment_failure(payment.id).await?;
                Err(e.into())
            },
            GatewayCall::TimedOut(waited) => {
                warn!(
                    "💰️ No answer from the gateway for payment [{}] after {waited:?}. It is left pending.",
                    request.transaction_id
                );
                Err(OrderFlowError::GatewayOutcomeUnknown { reference: request.transaction_id.clone(), waited })
            },
        }
    }

    /// Settles a payment that was left `PENDING` because the gateway did not answer in time.
    ///
    /// The operator establishes what really happened with the payment provider and reports it here. An approved
    /// payment confirms the order exactly as a timely approval would have. A declined one is marked `FAILED`, and the
    /// order can be paid again.
    pub async fn reconcile_payment(
        &self,
        payment_id: i64,
        outcome: SettlementOutcome,
    ) -> Result<PaymentResult, OrderFlowError> {
        let payment = self
            .db
            .fetch_payment(payment_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("Payment record {payment_id}")))?;
        if payment.payment_status != PaymentStatus::Pending {
            return Err(OrderFlowError::Validation(format!(
                "Payment #{payment_id} has already been settled as {}",
                payment.payment_status
            )));
        }
        let order = fetch_existing_order(&self.db, payment.order_id).await?;
        info!("💰️ Reconciling payment #{payment_id} [{}] as {outcome:?}", payment.transaction_id);
        match outcome {
            SettlementOutcome::Approved => self.confirm_payment(order, payment, Operator::System).await,
            SettlementOutcome::Declined => {
                let payment = self.db.record_payment_failure(payment_id).await?;
                Ok(PaymentResult {
                    payment_id: payment.id,
                    transaction_id: payment.transaction_id,
                    payment_status: payment.payment_status,
                })
            },
        }
    }

    /// Records an approved charge and confirms the order. If that is no longer possible, the payment is marked
    /// `FAILED` and the charge has to be reversed by hand.
    async fn confirm_payment(
        &self,
        order: Order,
        payment: PaymentRecord,
        operator: Operator,
    ) -> Result<PaymentResult, OrderFlowError> {
        let paid_at = Utc::now();
        let recorded = match plan_transition(&order, OrderTransition::Confirm, operator, None, paid_at) {
            Ok(change) => self.db.record_payment_success(payment.id, paid_at, change).await.map_err(OrderFlowError::from),
            Err(e) => Err(e.into()),
        };
        let (payment, updated) = match recorded {
            Ok(recorded) => recorded,
            Err(e) => {
                error!(
                    "💰️ The gateway took payment [{}] for order {}, but it could not be recorded. {e}. The charge \
                     must be reversed manually.",
                    payment.transaction_id, order.id
                );
                if let Err(e2) = self.db.record_payment_failure(payment.id).await {
                    error!("💰️ Could not mark payment #{} as failed either. {e2}", payment.id);
                }
                return Err(e);
            },
        };
        info!("💰️ Order [{}] paid with [{}]", updated.order_number, payment.transaction_id);
        let result = PaymentResult {
            payment_id: payment.id,
            transaction_id: payment.transaction_id.clone(),
            payment_status: payment.payment_status,
        };
        self.producers
            .publish_status_changed(OrderStatusChangedEvent::new(updated.clone(), order.order_status, operator))
            .await;
        self.producers.publish_order_paid(OrderPaidEvent::new(updated, payment)).await;
        Ok(result)
    }
}
