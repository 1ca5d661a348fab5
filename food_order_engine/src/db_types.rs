use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use order_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been placed and is waiting for payment.
    Created,
    /// The order has been paid for and is waiting for the restaurant to accept it.
    Confirmed,
    /// The restaurant has accepted the order and is preparing it.
    Preparing,
    /// The order has been handed to a rider.
    Delivering,
    /// The customer has confirmed delivery.
    Completed,
    /// The order was cancelled before payment, or fully refunded after payment.
    Cancelled,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 6] = [
        OrderStatusType::Created,
        OrderStatusType::Confirmed,
        OrderStatusType::Preparing,
        OrderStatusType::Delivering,
        OrderStatusType::Completed,
        OrderStatusType::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Completed | OrderStatusType::Cancelled)
    }

    /// The states in which money has been taken for the order and can still be refunded.
    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatusType::Confirmed | OrderStatusType::Preparing | OrderStatusType::Delivering)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "CREATED"),
            OrderStatusType::Confirmed => write!(f, "CONFIRMED"),
            OrderStatusType::Preparing => write!(f, "PREPARING"),
            OrderStatusType::Delivering => write!(f, "DELIVERING"),
            OrderStatusType::Completed => write!(f, "COMPLETED"),
            OrderStatusType::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "CONFIRMED" => Ok(Self::Confirmed),
            "PREPARING" => Ok(Self::Preparing),
            "DELIVERING" => Ok(Self::Delivering),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------  OrderPaymentStatus   ---------------------------------------------------------
/// The payment status as tracked on the order itself. This is richer than [`PaymentStatus`], since it also tracks
/// refunds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderPaymentStatus {
    Pending,
    Success,
    /// A refund is in flight with the gateway.
    Refunding,
    Refunded,
}

impl Display for OrderPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderPaymentStatus::Pending => write!(f, "PENDING"),
            OrderPaymentStatus::Success => write!(f, "SUCCESS"),
            OrderPaymentStatus::Refunding => write!(f, "REFUNDING"),
            OrderPaymentStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Internal account balance.
    Balance,
    Alipay,
    WechatPay,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Balance => write!(f, "BALANCE"),
            PaymentMethod::Alipay => write!(f, "ALIPAY"),
            PaymentMethod::WechatPay => write!(f, "WECHAT_PAY"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BALANCE" => Ok(Self::Balance),
            "ALIPAY" => Ok(Self::Alipay),
            "WECHAT_PAY" | "WECHAT" => Ok(Self::WechatPay),
            _ => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
/// The status of a single payment attempt. Once it leaves `Pending`, it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Success => write!(f, "SUCCESS"),
            PaymentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

//--------------------------------------      RefundStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundStatus::Pending => write!(f, "PENDING"),
            RefundStatus::Completed => write!(f, "COMPLETED"),
            RefundStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundType {
    Full,
    Partial,
}

impl Display for RefundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundType::Full => write!(f, "FULL"),
            RefundType::Partial => write!(f, "PARTIAL"),
        }
    }
}

//--------------------------------------        Operator       ---------------------------------------------------------
/// Who caused a status change. Stored in the status log as the user id, or `system`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    User(i64),
    System,
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::User(id) => write!(f, "{id}"),
            Operator::System => write!(f, "system"),
        }
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub restaurant_id: i64,
    pub restaurant_name: String,
    pub address_id: i64,
    pub contact_name: String,
    pub contact_phone: String,
    pub delivery_address: String,
    pub order_status: OrderStatusType,
    pub payment_status: OrderPaymentStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub note: Option<String>,
    pub estimated_delivery_time: DateTime<Utc>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// The time the restaurant handed the order over for delivery.
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
/// A fully validated order, ready to be persisted together with its items.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: i64,
    pub restaurant_id: i64,
    pub restaurant_name: String,
    pub address_id: i64,
    pub contact_name: String,
    pub contact_phone: String,
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub note: Option<String>,
    pub estimated_delivery_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn with_order_number<S: Into<String>>(mut self, order_number: S) -> Self {
        self.order_number = order_number.into();
        self
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub dish_id: i64,
    pub dish_name: String,
    pub dish_image: Option<String>,
    pub price: Money,
    pub quantity: i64,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub dish_id: i64,
    pub dish_name: String,
    pub dish_image: Option<String>,
    pub price: Money,
    pub quantity: i64,
    pub subtotal: Money,
}

//--------------------------------------     PaymentRecord     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub order_id: i64,
    pub payment_method: PaymentMethod,
    pub payment_amount: Money,
    /// The reference assigned to this attempt and quoted to the gateway.
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    pub payment_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub order_id: i64,
    pub payment_method: PaymentMethod,
    pub payment_amount: Money,
    pub transaction_id: String,
}

//--------------------------------------      RefundRecord     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: i64,
    pub order_id: i64,
    /// The successful payment this refund is made against.
    pub payment_id: i64,
    pub refund_amount: Money,
    pub refund_reason: String,
    pub refund_type: RefundType,
    pub refund_status: RefundStatus,
    pub processor_type: String,
    pub refund_transaction_id: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefundRecord {
    pub order_id: i64,
    pub payment_id: i64,
    pub refund_amount: Money,
    pub refund_reason: String,
    pub refund_type: RefundType,
    pub processor_type: String,
    pub refund_transaction_id: String,
}

//--------------------------------------     OrderStatusLog    ---------------------------------------------------------
/// One row of the append-only audit trail of order status changes.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderStatusLog {
    pub id: i64,
    pub order_id: i64,
    pub order_status: OrderStatusType,
    pub operator: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   Catalog entities    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub delivery_fee: Money,
    pub avg_delivery_minutes: i64,
    /// The user account that manages this restaurant, if any.
    pub merchant_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub contact_name: String,
    pub contact_phone: String,
    pub full_address: String,
}
