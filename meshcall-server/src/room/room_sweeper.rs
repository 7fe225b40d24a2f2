use crate::room::RoomRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Periodically drops room entries left without members.
///
/// `leave` already removes a room eagerly; this loop only catches entries that
/// slipped past it. Aborting the returned handle stops the loop.
pub fn spawn_room_sweeper(registry: Arc<RoomRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = registry.sweep_empty();
            if removed > 0 {
                debug!("Room sweep removed {} empty rooms", removed);
            }
        }
    })
}
