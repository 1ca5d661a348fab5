use std::time::Duration;

use food_order_engine::{
    db_types::{Money, Operator, OrderPaymentStatus, OrderStatusType, PaymentMethod, PaymentStatus},
    order_objects::SettlementOutcome,
    ErrorKind,
    OrderDatabase,
    OrderFlowError,
    SimulatedGateway,
};
use rust_decimal_macros::dec;

use crate::support::{
    catalog::{count_rows, noodle_order, CUSTOMER, STRANGER},
    system::TestSystem,
};

mod support;

#[tokio::test]
async fn happy_path_payment_confirms_the_order() {
    let sys = TestSystem::new().await;
    let order_id = sys.place_noodle_order().await;
    let result = sys.payments(SimulatedGateway::always_succeeds()).pay_order(order_id, CUSTOMER).await.unwrap();
    assert_eq!(result.payment_status, PaymentStatus::Success);
    assert!(result.transaction_id.starts_with("PAY"));

    let order = sys.order(order_id).await;
    assert_eq!(order.order_status, OrderStatusType::Confirmed);
    assert_eq!(order.payment_status, OrderPaymentStatus::Success);
    assert!(order.paid_at.is_some());

    let payments = sys.db.fetch_payments_for_order(order_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    let payment = &payments[0];
    assert_eq!(payment.id, result.payment_id);
    assert_eq!(payment.payment_amount, Money::from(dec!(45.00)));
    assert_eq!(payment.payment_method, PaymentMethod::Balance);
    assert_eq!(payment.payment_time, order.paid_at);

    let log = sys.status_log(order_id).await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].order_status, OrderStatusType::Confirmed);
    sys.tear_down().await;
}

#[tokio::test]
async fn second_payment_is_rejected() {
    let sys = TestSystem::new().await;
    let order_id = sys.place_paid_order().await;
    let err = sys
        .payments(SimulatedGateway::always_succeeds())
        .pay_order(order_id, CUSTOMER)
        .await
        .expect_err("An order can only be paid once");
    assert_eq!(err.kind(), ErrorKind::Validation);
    let payments = sys.db.fetch_payments_for_order(order_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments.iter().filter(|p| p.payment_status == PaymentStatus::Success).count(), 1);
    assert_eq!(sys.status_log(order_id).await.len(), 2);
    sys.tear_down().await;
}

#[tokio::test]
async fn declined_payment_leaves_the_order_payable() {
    let sys = TestSystem::new().await;
    let order_id = sys.place_noodle_order().await;
    let before = sys.order(order_id).await;
    let err = sys.payments(SimulatedGateway::always_fails()).pay_order(order_id, CUSTOMER).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::GatewayFailure(_)), "{err}");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(sys.order(order_id).await, before);
    assert_eq!(sys.status_log(order_id).await.len(), 1);

    let payments = sys.db.fetch_payments_for_order(order_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].payment_status, PaymentStatus::Failed);
    assert!(payments[0].payment_time.is_none());

    // Retrying creates a new record
    let retry = sys.payments(SimulatedGateway::always_succeeds()).pay_order(order_id, CUSTOMER).await.unwrap();
    assert_ne!(retry.payment_id, payments[0].id);
    let payments = sys.db.fetch_payments_for_order(order_id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(sys.order(order_id).await.order_status, OrderStatusType::Confirmed);
    sys.tear_down().await;
}

#[tokio::test]
async fn gateway_timeout_is_reported_as_unknown_outcome() {
    let sys = TestSystem::new().await;
    let order_id = sys.place_noodle_order().await;
    let before = sys.order(order_id).await;
    let gateway = SimulatedGateway::always_succeeds().with_latency(Duration::from_millis(500));
    let api = sys.payments(gateway).with_gateway_timeout(Duration::from_millis(20));
    let err = api.pay_order(order_id, CUSTOMER).await.unwrap_err();
    assert!(err.is_outcome_unknown(), "{err}");
    assert_eq!(err.kind(), ErrorKind::Internal);

    let payments = sys.db.fetch_payments_for_order(order_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].payment_status, PaymentStatus::Pending);
    match err {
        OrderFlowError::GatewayOutcomeUnknown { reference, waited } => {
            assert_eq!(reference, payments[0].transaction_id);
            assert_eq!(waited, Duration::from_millis(20));
        },
        _ => panic!("Unexpected error"),
    }
    assert_eq!(sys.order(order_id).await, before);
    sys.tear_down().await;
}

#[tokio::test]
async fn timed_out_payment_can_be_reconciled() {
    let sys = TestSystem::new().await;
    let gateway = SimulatedGateway::always_succeeds().with_latency(Duration::from_millis(500));
    let api = sys.payments(gateway).with_gateway_timeout(Duration::from_millis(20));

    // Approved after the fact: the order is confirmed as if the gateway had answered in time
    let approved = sys.place_noodle_order().await;
    assert!(api.pay_order(approved, CUSTOMER).await.unwrap_err().is_outcome_unknown());
    let pending = sys.db.fetch_payments_for_order(approved).await.unwrap().remove(0);
    let settled = api.reconcile_payment(pending.id, SettlementOutcome::Approved).await.unwrap();
    assert_eq!(settled.payment_status, PaymentStatus::Success);
    assert_eq!(settled.transaction_id, pending.transaction_id);
    let order = sys.order(approved).await;
    assert_eq!(order.order_status, OrderStatusType::Confirmed);
    assert_eq!(order.payment_status, OrderPaymentStatus::Success);
    assert!(order.paid_at.is_some());
    let log = sys.status_log(approved).await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].operator, Operator::System.to_string());
    let err = api.reconcile_payment(pending.id, SettlementOutcome::Approved).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Declined after the fact: the order can be paid again
    let declined = sys.place_noodle_order().await;
    assert!(api.pay_order(declined, CUSTOMER).await.unwrap_err().is_outcome_unknown());
    let pending = sys.db.fetch_payments_for_order(declined).await.unwrap().remove(0);
    let settled = api.reconcile_payment(pending.id, SettlementOutcome::Declined).await.unwrap();
    assert_eq!(settled.payment_status, PaymentStatus::Failed);
    assert_eq!(sys.order(declined).await.payment_status, OrderPaymentStatus::Pending);
    sys.payments(SimulatedGateway::always_succeeds()).pay_order(declined, CUSTOMER).await.unwrap();
    assert_eq!(sys.order(declined).await.order_status, OrderStatusType::Confirmed);

    let err = api.reconcile_payment(9999, SettlementOutcome::Declined).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    sys.tear_down().await;
}

#[tokio::test]
async fn unsupported_method_is_rejected_before_any_record_is_written() {
    let sys = TestSystem::new().await;
    let mut request = noodle_order(&sys.catalog);
    request.payment_method = PaymentMethod::Alipay;
    let placed = sys.orders().create_order(CUSTOMER, request).await.unwrap();
    assert_eq!(placed.payment_method, PaymentMethod::Alipay);
    let err = sys.payments(SimulatedGateway::always_succeeds()).pay_order(placed.order_id, CUSTOMER).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("ALIPAY"));
    assert_eq!(count_rows(sys.db.pool(), "payment_records").await, 0);
    sys.tear_down().await;
}

#[tokio::test]
async fn payment_permissions() {
    let sys = TestSystem::new().await;
    let order_id = sys.place_noodle_order().await;
    let api = sys.payments(SimulatedGateway::always_succeeds());
    assert_eq!(api.pay_order(order_id, STRANGER).await.unwrap_err().kind(), ErrorKind::Forbidden);
    assert_eq!(api.pay_order(9999, CUSTOMER).await.unwrap_err().kind(), ErrorKind::NotFound);
    sys.orders().cancel_order(order_id, CUSTOMER).await.unwrap();
    assert_eq!(api.pay_order(order_id, CUSTOMER).await.unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(count_rows(sys.db.pool(), "payment_records").await, 0);
    sys.tear_down().await;
}

#[tokio::test]
async fn racing_payments_produce_one_success() {
    let sys = TestSystem::new().await;
    let order_id = sys.place_noodle_order().await;
    let first = sys.payments(SimulatedGateway::always_succeeds().with_latency(Duration::from_millis(50)));
    let second = sys.payments(SimulatedGateway::always_succeeds().with_latency(Duration::from_millis(50)));
    let (a, b) = tokio::join!(first.pay_order(order_id, CUSTOMER), second.pay_order(order_id, CUSTOMER));
    let loser = match (a, b) {
        (Ok(_), Err(l)) | (Err(l), Ok(_)) => l,
        (a, b) => panic!("Expected exactly one payment to go through: {a:?} {b:?}"),
    };
    // The loser sees the winner's committed payment, not a locked database
    assert_eq!(loser.kind(), ErrorKind::Validation, "{loser}");

    let payments = sys.db.fetch_payments_for_order(order_id).await.unwrap();
    assert_eq!(payments.iter().filter(|p| p.payment_status == PaymentStatus::Success).count(), 1);
    let order = sys.order(order_id).await;
    assert_eq!(order.order_status, OrderStatusType::Confirmed);
    assert_eq!(sys.status_log(order_id).await.len(), 2);
    sys.tear_down().await;
}
