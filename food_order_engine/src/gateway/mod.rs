//! # Payment gateway interface
//!
//! The engine talks to the outside payment network through the narrow [`PaymentGateway`] trait: charge an amount
//! with a payment method, or refund (part of) an earlier charge. The only implementation shipped with the engine is
//! [`SimulatedGateway`], a coin flip with a configurable success probability.
//!
//! Gateway calls are made outside any database transaction, and always through [`call_gateway`], which imposes a
//! time limit. A call that runs out of time has an *unknown* outcome: the money may or may not have moved.
mod simulated;

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use order_common::Money;
pub use simulated::SimulatedGateway;
use thiserror::Error;

use crate::db_types::PaymentMethod;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub transaction_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub refund_transaction_id: String,
    pub original_transaction_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub reference: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("The gateway declined the request: {0}")]
    Declined(String),
    #[error("The gateway is unavailable: {0}")]
    Unavailable(String),
    #[error("Payment method {0} is not supported by this gateway")]
    UnsupportedMethod(PaymentMethod),
}

#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// A short name for the processor, recorded on refund records.
    fn processor_type(&self) -> &str;

    /// Whether the payment method is wired end-to-end through this gateway.
    fn supports(&self, method: PaymentMethod) -> bool;

    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayReceipt, GatewayError>;

    async fn refund(&self, request: &RefundRequest) -> Result<GatewayReceipt, GatewayError>;
}

/// The result of a time-limited gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall<T> {
    Succeeded(T),
    Failed(GatewayError),
    /// No answer arrived within the limit. The outcome is unknown.
    TimedOut(Duration),
}

pub async fn call_gateway<F, T>(limit: Duration, call: F) -> GatewayCall<T>
where F: Future<Output = Result<T, GatewayError>> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(receipt)) => GatewayCall::Succeeded(receipt),
        Ok(Err(e)) => GatewayCall::Failed(e),
        Err(_) => GatewayCall::TimedOut(limit),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn call_gateway_reports_each_outcome() {
        let ok = call_gateway(Duration::from_millis(100), async { Ok::<_, GatewayError>(1) }).await;
        assert_eq!(ok, GatewayCall::Succeeded(1));
        let failed =
            call_gateway(Duration::from_millis(100), async { Err::<u8, _>(GatewayError::Declined("no".into())) }).await;
        assert_eq!(failed, GatewayCall::Failed(GatewayError::Declined("no".into())));
        let slow = call_gateway(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, GatewayError>(2)
        })
        .await;
        assert_eq!(slow, GatewayCall::TimedOut(Duration::from_millis(10)));
    }
}
