use std::str::FromStr;

use cucumber::{then, when};
use food_order_engine::{
    db_types::{Money, OrderStatusType, RefundStatus},
    order_objects::{OrderItemRequest, RefundOrderRequest},
    OrderDatabase,
    SimulatedGateway,
};

use crate::{
    cucumber::FoodOrderWorld,
    support::catalog::{count_rows, noodle_order, CUSTOMER},
};

fn money(s: &str) -> Money {
    Money::from_str(s).expect("Not a valid amount")
}

#[when(
    expr = "the customer orders {int} {string} at {word} declaring subtotal {word}, delivery fee {word} and total {word}"
)]
async fn place_order(
    world: &mut FoodOrderWorld,
    quantity: i64,
    dish: String,
    price: String,
    subtotal: String,
    fee: String,
    total: String,
) {
    let sys = world.system();
    let catalog = &sys.catalog;
    let dish_id = match dish.as_str() {
        "Beef Noodles" => catalog.noodles_id,
        "Dumplings" => catalog.dumplings_id,
        other => panic!("Unknown dish {other}"),
    };
    let mut request = noodle_order(catalog);
    request.items = vec![OrderItemRequest { dish_id, name: dish, price: money(&price), quantity }];
    request.subtotal = money(&subtotal);
    request.delivery_fee = money(&fee);
    request.total = money(&total);
    let result = sys.orders().create_order(CUSTOMER, request.clone()).await;
    world.request = Some(request);
    match result {
        Ok(placed) => world.order_id = Some(placed.order_id),
        Err(e) => world.last_error = Some(e),
    }
}

#[when("the customer pays with a gateway that always approves")]
async fn pay_approved(world: &mut FoodOrderWorld) {
    let order_id = world.order_id();
    let result = world.system().payments(SimulatedGateway::always_succeeds()).pay_order(order_id, CUSTOMER).await;
    world.last_error = result.err();
}

#[when(expr = "the customer asks for a refund because {string}")]
async fn refund(world: &mut FoodOrderWorld, reason: String) {
    refund_with(world, reason, SimulatedGateway::always_succeeds()).await;
}

#[when(expr = "the customer asks for a refund because {string} but the gateway declines")]
async fn refund_declined(world: &mut FoodOrderWorld, reason: String) {
    refund_with(world, reason, SimulatedGateway::always_fails()).await;
}

async fn refund_with(world: &mut FoodOrderWorld, reason: String, gateway: SimulatedGateway) {
    let order_id = world.order_id();
    let result =
        world.system().refunds(gateway).refund_order(order_id, CUSTOMER, RefundOrderRequest::full(reason)).await;
    world.last_error = result.err();
}

#[then("the order is accepted")]
async fn order_accepted(world: &mut FoodOrderWorld) {
    assert!(world.last_error.is_none(), "{:?}", world.last_error);
    let order = world.system().order(world.order_id()).await;
    assert_eq!(order.order_status, OrderStatusType::Created);
    let request = world.request.as_ref().expect("No order request");
    assert_eq!(order.total_amount, request.total);
}

#[then(expr = "the request is rejected with {word}")]
async fn rejected_with(world: &mut FoodOrderWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The request was not rejected");
    assert_eq!(err.kind().to_string(), kind, "{err}");
}

#[then(expr = "the order status is {word}")]
async fn order_status_is(world: &mut FoodOrderWorld, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not an order status");
    let order = world.system().order(world.order_id()).await;
    assert_eq!(order.order_status, expected);
}

#[then(expr = "the payment status is {word}")]
async fn payment_status_is(world: &mut FoodOrderWorld, status: String) {
    let order = world.system().order(world.order_id()).await;
    assert_eq!(order.payment_status.to_string(), status);
}

#[then(expr = "the status log has {int} entries")]
async fn status_log_length(world: &mut FoodOrderWorld, n: usize) {
    let log = world.system().status_log(world.order_id()).await;
    assert_eq!(log.len(), n);
    let order = world.system().order(world.order_id()).await;
    assert_eq!(log.last().map(|e| e.order_status), Some(order.order_status));
}

#[then(expr = "there are {int} orders")]
async fn order_count(world: &mut FoodOrderWorld, n: i64) {
    assert_eq!(count_rows(world.system().db.pool(), "orders").await, n);
}

#[then(expr = "there is exactly {int} {word} refund against the original payment")]
async fn refunds_against_payment(world: &mut FoodOrderWorld, n: usize, status: String) {
    let sys = world.system();
    let order_id = world.order_id();
    let payments = sys.db.fetch_payments_for_order(order_id).await.expect("Error fetching payments");
    let refunds = sys.db.fetch_refunds_for_order(order_id).await.expect("Error fetching refunds");
    assert_eq!(refunds.len(), n);
    for refund in refunds {
        let expected = match status.as_str() {
            "COMPLETED" => RefundStatus::Completed,
            "FAILED" => RefundStatus::Failed,
            "PENDING" => RefundStatus::Pending,
            other => panic!("Unknown refund status {other}"),
        };
        assert_eq!(refund.refund_status, expected);
        assert_eq!(refund.payment_id, payments[0].id);
    }
}
