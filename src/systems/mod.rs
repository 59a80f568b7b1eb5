mod bookkeeping;
mod environment;
mod population;
mod servants;

pub use bookkeeping::BookkeepingSystem;
pub use environment::EnvironmentSystem;
pub use population::{
    adult_pairs, breed, breeding_chance, feed_and_water, run_daily_pass, FeedReport,
    PopulationSystem, CHILD_NAMES,
};
pub use servants::ServantSystem;
