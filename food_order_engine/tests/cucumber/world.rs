use cucumber::World;
use food_order_engine::{order_objects::NewOrderRequest, OrderFlowError};

use crate::support::system::TestSystem;

#[derive(Default, Debug, World)]
pub struct FoodOrderWorld {
    pub system: Option<TestSystem>,
    pub request: Option<NewOrderRequest>,
    pub order_id: Option<i64>,
    pub last_error: Option<OrderFlowError>,
}

impl FoodOrderWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("The system has not been initialised. Start with 'Given a fresh install'")
    }

    pub fn order_id(&self) -> i64 {
        self.order_id.expect("No order has been placed in this scenario")
    }
}
