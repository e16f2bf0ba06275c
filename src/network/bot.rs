//! Bot Command Generator
//!
//! Plays the reader's role for a bot seat: on a fixed cadence it pushes a
//! deploy line into the bot's own command queue, so bot commands go through
//! the same validation as a human's.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::core::rng::DeterministicRng;
use crate::game::command::DeployCommand;
use crate::game::map::{Lane, Side};
use crate::game::unit::UnitKind;
use crate::network::participant::Difficulty;

/// What the generator may observe about its session.
///
/// Published by the session loop; the bot never touches match state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BotView {
    /// Is a match being played right now?
    pub active: bool,
    /// Mana of both seats
    pub mana: [u32; 2],
}

/// Delay between attempts for a difficulty.
pub fn deploy_interval(difficulty: Difficulty) -> Duration {
    match difficulty {
        Difficulty::Easy => Duration::from_secs(7),
        Difficulty::Medium => Duration::from_secs(4),
        Difficulty::Hard => Duration::from_secs(2),
    }
}

/// The deploy a bot wants to make next.
pub fn choose_deploy(difficulty: Difficulty, rng: &mut DeterministicRng) -> DeployCommand {
    match difficulty {
        Difficulty::Easy => DeployCommand { kind: UnitKind::Pawn, lane: Lane::Left },
        Difficulty::Medium => DeployCommand { kind: UnitKind::Knight, lane: Lane::Center },
        Difficulty::Hard => {
            let kind = rng.choose(&UnitKind::ALL).copied().unwrap_or(UnitKind::Pawn);
            let lane = rng.choose(&Lane::ALL).copied().unwrap_or(Lane::Center);
            DeployCommand { kind, lane }
        }
    }
}

/// Spawn the generator for the bot sitting in `side`.
///
/// Stops on the session teardown signal or when its command queue closes.
pub fn spawn_bot(
    difficulty: Difficulty,
    side: Side,
    seed: u64,
    commands: mpsc::Sender<String>,
    view: watch::Receiver<BotView>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = DeterministicRng::new(seed);
        let period = deploy_interval(difficulty);
        debug!("Bot {:?} started for {}", difficulty, side);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = commands.closed() => break,
                _ = tokio::time::sleep(period) => {
                    let BotView { active, mana } = *view.borrow();
                    if !active {
                        continue;
                    }

                    let deploy = choose_deploy(difficulty, &mut rng);
                    if mana[side.index()] < deploy.kind.cost() {
                        trace!("Bot waiting for mana ({} < {})", mana[side.index()], deploy.kind.cost());
                        continue;
                    }

                    match commands.try_send(deploy.to_line()) {
                        Ok(()) => trace!("Bot queued {}", deploy.to_line()),
                        Err(TrySendError::Full(_)) => debug!("Bot queue full, skipping"),
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
            }
        }

        debug!("Bot {:?} stopped", difficulty);
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_strategies() {
        let mut rng = DeterministicRng::new(1);
        assert_eq!(choose_deploy(Difficulty::Easy, &mut rng).to_line(), "pawn-L");
        assert_eq!(choose_deploy(Difficulty::Medium, &mut rng).to_line(), "knight-C");
    }

    #[test]
    fn test_hard_is_seeded() {
        let mut a = DeterministicRng::new(77);
        let mut b = DeterministicRng::new(77);
        for _ in 0..20 {
            assert_eq!(choose_deploy(Difficulty::Hard, &mut a), choose_deploy(Difficulty::Hard, &mut b));
        }
    }

    #[test]
    fn test_intervals() {
        assert_eq!(deploy_interval(Difficulty::Easy), Duration::from_secs(7));
        assert_eq!(deploy_interval(Difficulty::Medium), Duration::from_secs(4));
        assert_eq!(deploy_interval(Difficulty::Hard), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_waits_for_mana_and_activity() {
        let (tx, mut rx) = mpsc::channel(10);
        let (view_tx, view_rx) = watch::channel(BotView::default());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_bot(Difficulty::Medium, Side::P2, 9, tx, view_rx, shutdown_rx);

        // Inactive: nothing after a full period
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());

        // Active but poor: still nothing
        view_tx.send_replace(BotView { active: true, mana: [10, 4] });
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(rx.try_recv().is_err());

        view_tx.send_replace(BotView { active: true, mana: [0, 5] });
        assert_eq!(rx.recv().await.as_deref(), Some("knight-C"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_skips_deploy_and_keeps_running() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send("held".to_string()).unwrap();
        let (_view_tx, view_rx) = watch::channel(BotView { active: true, mana: [0, 10] });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_bot(Difficulty::Medium, Side::P2, 9, tx, view_rx, shutdown_rx);

        // Two periods pass with the queue full
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(rx.recv().await.as_deref(), Some("held"));
        assert!(rx.try_recv().is_err());

        // The generator is still alive and fills the freed slot
        assert_eq!(rx.recv().await.as_deref(), Some("knight-C"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
