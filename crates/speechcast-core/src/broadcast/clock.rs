//! Periodic wall-clock broadcast

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::info;

use super::hub::HubHandle;

/// Publish the current local time to every client each `period`.
///
/// The first message goes out one full period after spawning. The task ends
/// when the hub stops accepting messages.
pub fn spawn_clock(hub: HubHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if hub.publish(clock_message(Local::now())).await.is_err() {
                info!("Broadcast hub gone, stopping clock");
                break;
            }
        }
    })
}

pub fn clock_message<Tz>(now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("The Current Time Is {}", now.format("%Y-%m-%d %H:%M:%S"))
}
