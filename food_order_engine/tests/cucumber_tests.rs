mod cucumber;
mod support;

use ::cucumber::{codegen::LocalBoxFuture, event::ScenarioFinished, gherkin, writer, World};
use futures_util::FutureExt;
use log::*;
use tokio::runtime::Runtime;

use crate::cucumber::FoodOrderWorld;

fn main() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let sys = Runtime::new().unwrap();
    sys.block_on(
        FoodOrderWorld::cucumber()
            .with_writer(writer::Libtest::or_basic())
            .after(|_f, _r, scenario, ev, w| post_test_hook(scenario, ev, w))
            .run("tests/features"),
    );
    info!("🚀️ Tests complete");
}

fn post_test_hook<'a>(
    scenario: &'a gherkin::Scenario,
    ev: &'a ScenarioFinished,
    world: Option<&'a mut FoodOrderWorld>,
) -> LocalBoxFuture<'a, ()> {
    let fut = async move {
        trace!("🚀️ After-scenario hook running for \"{}\"", scenario.name);
        match world.and_then(|w| w.system.take()) {
            Some(sys) => match ev {
                ScenarioFinished::StepFailed(_, _, _) | ScenarioFinished::StepSkipped => {
                    error!("🚀️ Error in scenario, database retained: {}", sys.url);
                },
                ScenarioFinished::StepPassed => {
                    debug!("🚀️ Scenario complete, removing database: {}", sys.url);
                    sys.tear_down().await;
                },
                _ => trace!("🚀️ Unhandled event: {ev:?}"),
            },
            None => warn!("🚀️ World was not specified. Cannot cleanup database."),
        }
        trace!("🚀️ After-scenario hook complete");
    };
    fut.boxed_local()
}
