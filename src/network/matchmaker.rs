//! Matchmaking
//!
//! PvP requests wait in a bounded FIFO queue that a background loop pairs up
//! two at a time. Bot requests bypass the queue and start immediately.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::game::map::Side;
use crate::network::bot::spawn_bot;
use crate::network::participant::{Difficulty, Participant};
use crate::network::profile::ProfileStore;
use crate::network::registry::{SessionEntry, SessionRegistry};
use crate::network::session::{short_id, MatchSession, SessionConfig};

/// Matchmaking errors.
#[derive(Debug, Error)]
pub enum MatchmakingError {
    /// The pairing loop is gone.
    #[error("matchmaking queue closed")]
    QueueClosed,

    /// Bot difficulty outside `1..=3`.
    #[error("invalid difficulty {0} (expected 1-3)")]
    InvalidDifficulty(u8),
}

/// Pairs participants and starts their sessions.
pub struct Matchmaker {
    config: SessionConfig,
    registry: Arc<SessionRegistry>,
    profiles: Arc<dyn ProfileStore>,
    queue_tx: mpsc::Sender<Participant>,
    queue_rx: Mutex<Option<mpsc::Receiver<Participant>>>,
}

impl Matchmaker {
    /// Create a matchmaker with a PvP queue of `queue_capacity` entries.
    pub fn new(
        config: SessionConfig,
        registry: Arc<SessionRegistry>,
        profiles: Arc<dyn ProfileStore>,
        queue_capacity: usize,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity.max(1));
        Self {
            config,
            registry,
            profiles,
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// Registry of the sessions this matchmaker started.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Queue a participant for a PvP match.
    pub async fn request_match(&self, participant: Participant) -> Result<(), MatchmakingError> {
        debug!("{} queued for PvP", participant.username);
        self.queue_tx
            .send(participant)
            .await
            .map_err(|_| MatchmakingError::QueueClosed)
    }

    /// Start a match against a bot of difficulty `level` (`1..=3`).
    ///
    /// The participant is dropped when the difficulty is invalid.
    pub async fn request_bot_match(&self, participant: Participant, level: u8) -> Result<Uuid, MatchmakingError> {
        let difficulty = Difficulty::from_level(level).ok_or(MatchmakingError::InvalidDifficulty(level))?;

        let (bot_tx, bot_rx) = mpsc::channel(self.config.command_queue_depth);
        let bot = Participant::bot(difficulty, bot_rx);
        let session = MatchSession::new(self.config.clone(), [participant, bot], Arc::clone(&self.profiles));

        spawn_bot(
            difficulty,
            Side::P2,
            session.seed(),
            bot_tx,
            session.bot_view(),
            session.subscribe_shutdown(),
        );

        Ok(self.launch(session).await)
    }

    /// Pair queued participants until shutdown.
    ///
    /// A participant whose connection vanished while queued is discarded; the
    /// one left waiting keeps its place at the head of the queue.
    #[instrument(skip_all)]
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let Some(mut queue) = self.queue_rx.lock().await.take() else {
            warn!("Matchmaking loop already running");
            return;
        };
        info!("Matchmaking loop started");

        let mut waiting: Option<Participant> = None;
        loop {
            let next = tokio::select! {
                _ = shutdown.recv() => break,
                next = queue.recv() => match next {
                    Some(participant) => participant,
                    None => break,
                },
            };

            if !next.is_connected() {
                debug!("{} left the queue", next.username);
                continue;
            }

            waiting = match waiting.take() {
                Some(first) if first.is_connected() => {
                    let session = MatchSession::new(self.config.clone(), [first, next], Arc::clone(&self.profiles));
                    self.launch(session).await;
                    None
                }
                Some(first) => {
                    debug!("{} left the queue", first.username);
                    Some(next)
                }
                None => Some(next),
            };
        }

        info!("Matchmaking loop stopped");
    }

    /// Register a session and run it on its own task. Returns the session id.
    pub async fn launch(&self, session: MatchSession) -> Uuid {
        let id = session.id();
        let entry = SessionEntry {
            participants: session.participant_ids(),
            usernames: session.usernames(),
            state: session.state(),
            started_at: Instant::now(),
        };
        info!("Starting session {}: {} vs {}", short_id(&id), entry.usernames[0], entry.usernames[1]);
        self.registry.register(id, entry).await;

        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let report = session.run().await;
            registry.unregister(&report.session_id).await;
            debug!(
                "Session {} closed after {} match(es)",
                short_id(&report.session_id),
                report.outcomes.len()
            );
        });

        id
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::network::participant::Connection;
    use crate::network::profile::MemoryProfileStore;
    use crate::network::protocol::ServerMessage;

    struct Remote {
        commands: mpsc::Sender<String>,
        outbound: mpsc::Receiver<ServerMessage>,
    }

    fn human(name: &str) -> (Participant, Remote) {
        let (commands_tx, commands_rx) = mpsc::channel(10);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let participant = Participant::human(name, 1, Connection { outbound: outbound_tx, commands: commands_rx });
        (participant, Remote { commands: commands_tx, outbound: outbound_rx })
    }

    fn matchmaker() -> Arc<Matchmaker> {
        let config = SessionConfig {
            tick_interval: Duration::from_millis(100),
            ..SessionConfig::default()
        };
        Arc::new(Matchmaker::new(
            config,
            Arc::new(SessionRegistry::new()),
            Arc::new(MemoryProfileStore::new()),
            16,
        ))
    }

    async fn next_start(remote: &mut Remote) -> String {
        loop {
            match remote.outbound.recv().await {
                Some(ServerMessage::MatchStart(info)) => return info.opponent,
                Some(_) => continue,
                None => panic!("connection closed before match start"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairs_in_arrival_order() {
        let mm = matchmaker();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(Arc::clone(&mm).run(shutdown_rx));

        let (a, mut ra) = human("alice");
        let (b, mut rb) = human("bob");
        let (c, _rc) = human("carol");
        mm.request_match(a).await.unwrap();
        mm.request_match(b).await.unwrap();
        mm.request_match(c).await.unwrap();

        assert_eq!(next_start(&mut ra).await, "bob");
        assert_eq!(next_start(&mut rb).await, "alice");
        assert_eq!(mm.registry().session_count().await, 1);
        let _ = shutdown_tx.send(());
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_participant_is_skipped() {
        let mm = matchmaker();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(Arc::clone(&mm).run(shutdown_rx));

        let (a, ra) = human("alice");
        let (b, mut rb) = human("bob");
        let (c, mut rc) = human("carol");
        drop(ra);
        mm.request_match(a).await.unwrap();
        mm.request_match(b).await.unwrap();
        mm.request_match(c).await.unwrap();

        assert_eq!(next_start(&mut rb).await, "carol");
        assert_eq!(next_start(&mut rc).await, "bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_match_starts_immediately() {
        let mm = matchmaker();
        let (a, mut ra) = human("alice");

        let session_id = mm.request_bot_match(a, 2).await.unwrap();
        assert_eq!(next_start(&mut ra).await, "BotLv2");

        let entry = mm.registry().get(&session_id).await.unwrap();
        assert_eq!(entry.usernames, ["alice".to_string(), "BotLv2".to_string()]);

        // Leaving ends the session and clears the registry
        drop(ra.commands);
        drop(ra.outbound);
        tokio::time::timeout(Duration::from_secs(5), async {
            while mm.registry().session_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_bot_match_rejects_bad_difficulty() {
        let mm = matchmaker();
        let (a, _ra) = human("alice");
        let err = mm.request_bot_match(a, 4).await.unwrap_err();
        assert!(matches!(err, MatchmakingError::InvalidDifficulty(4)));
        assert_eq!(mm.registry().session_count().await, 0);
    }
}
