use std::{fmt::Display, time::Duration};

use thiserror::Error;

use crate::{
    gateway::GatewayError,
    helpers::{AmountError, DeliveryTimeError},
    order_state::TransitionError,
    traits::OrderDatabaseError,
};

/// The error categories reported to the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "VALIDATION_ERROR"),
            ErrorKind::NotFound => write!(f, "NOT_FOUND"),
            ErrorKind::Forbidden => write!(f, "FORBIDDEN"),
            ErrorKind::Internal => write!(f, "INTERNAL_ERROR"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("The payment gateway could not complete the request. {0}")]
    GatewayFailure(GatewayError),
    /// The gateway did not answer in time, so the money may or may not have moved. The record with the given
    /// transaction reference is left `PENDING` for reconciliation.
    #[error("No answer from the payment gateway for {reference} after {waited:?}. The outcome is unknown.")]
    GatewayOutcomeUnknown { reference: String, waited: Duration },
    #[error("Database error. {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderFlowError::Validation(_) => ErrorKind::Validation,
            OrderFlowError::NotFound(_) => ErrorKind::NotFound,
            OrderFlowError::Forbidden(_) => ErrorKind::Forbidden,
            OrderFlowError::GatewayFailure(_) |
            OrderFlowError::GatewayOutcomeUnknown { .. } |
            OrderFlowError::DatabaseError(_) => ErrorKind::Internal,
        }
    }

    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, OrderFlowError::GatewayOutcomeUnknown { .. })
    }
}

impl From<OrderDatabaseError> for OrderFlowError {
    fn from(e: OrderDatabaseError) -> Self {
        match e {
            OrderDatabaseError::OrderNotFound(id) => OrderFlowError::NotFound(format!("Order {id}")),
            OrderDatabaseError::PaymentNotFound(id) => OrderFlowError::NotFound(format!("Payment record {id}")),
            OrderDatabaseError::RefundNotFound(id) => OrderFlowError::NotFound(format!("Refund record {id}")),
            e @ (OrderDatabaseError::PreconditionMismatch(_) |
            OrderDatabaseError::PaymentAlreadySucceeded(_) |
            OrderDatabaseError::RefundExceedsPayment { .. }) => OrderFlowError::Validation(e.to_string()),
            e @ (OrderDatabaseError::DatabaseError(_) |
            OrderDatabaseError::OrderAlreadyExists(_) |
            OrderDatabaseError::RecordStatusUpdateError(_)) => OrderFlowError::DatabaseError(e.to_string()),
        }
    }
}

impl From<TransitionError> for OrderFlowError {
    fn from(e: TransitionError) -> Self {
        OrderFlowError::Validation(e.to_string())
    }
}

impl From<AmountError> for OrderFlowError {
    fn from(e: AmountError) -> Self {
        OrderFlowError::Validation(e.to_string())
    }
}

impl From<DeliveryTimeError> for OrderFlowError {
    fn from(e: DeliveryTimeError) -> Self {
        OrderFlowError::Validation(e.to_string())
    }
}

impl From<GatewayError> for OrderFlowError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::UnsupportedMethod(m) => OrderFlowError::Validation(format!("Unsupported payment method {m}")),
            e => OrderFlowError::GatewayFailure(e),
        }
    }
}
