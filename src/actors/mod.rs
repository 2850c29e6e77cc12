pub mod rules_watcher;
pub mod sweeper;

pub use rules_watcher::{load_rules_file, RulesWatcherHandle};
pub use sweeper::SweeperHandle;

use tokio::time::Duration;

const MIN_TICK: Duration = Duration::from_millis(1);

/// `tokio::time::interval` panics on a zero period
fn tick_period(requested: Duration, actor: &str) -> Duration {
    if requested < MIN_TICK {
        tracing::warn!(
            "[{}] Interval {:?} is below the minimum, using {:?}",
            actor,
            requested,
            MIN_TICK
        );
        MIN_TICK
    } else {
        requested
    }
}
