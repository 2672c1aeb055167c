use crate::event::BotEvent;
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Posts `Tick(round_id)` once a second until aborted or the event loop is gone.
/// The first tick fires one full second after the round starts.
pub fn spawn(round_id: u64, events: mpsc::Sender<BotEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if events.send(BotEvent::Tick(round_id)).await.is_err() {
                debug!("Event loop closed, countdown for round {} ends", round_id);
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second_with_round_id() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn(7, tx);

        for _ in 0..3 {
            match rx.recv().await {
                Some(BotEvent::Tick(id)) => assert_eq!(id, 7),
                _ => panic!("expected a tick"),
            }
        }
        handle.abort();
    }
}
