use cucumber::given;

use crate::{
    cucumber::FoodOrderWorld,
    support::system::TestSystem,
};

#[given("a fresh install")]
async fn fresh_database(world: &mut FoodOrderWorld) {
    let system = TestSystem::new().await;
    world.system = Some(system);
}

#[given("the customer has a paid order")]
async fn paid_order(world: &mut FoodOrderWorld) {
    let order_id = world.system().place_paid_order().await;
    world.order_id = Some(order_id);
}
