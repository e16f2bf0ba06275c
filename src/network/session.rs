//! Match Session Loop
//!
//! Drives one session from its first match to teardown:
//!
//! ```text
//! Active ──► Ended ──► ReplayNegotiation ──► Active (reset)
//!                                       └──► Terminated
//! ```
//!
//! The loop is the only writer of the match state. Participants' command
//! queues and the clock are multiplexed with `select!`; everything else
//! (registry snapshots, the bot generator) only reads.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::rng::derive_session_seed;
use crate::TICK_INTERVAL_MS;
use crate::game::command::{apply_deploy, parse_replay_answer};
use crate::game::map::Side;
use crate::game::render::render_board;
use crate::game::state::{MatchOutcome, MatchState};
use crate::game::tick::{tick, LoggedCommand, MatchConfig};
use crate::network::bot::BotView;
use crate::network::participant::{Participant, ParticipantError};
use crate::network::profile::ProfileStore;
use crate::network::protocol::{MatchEndInfo, MatchStartInfo, ServerMessage, StateUpdate};

/// Configuration for a match session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Clock period (one simulation tick).
    pub tick_interval: Duration,
    /// Simulation rules.
    pub match_config: MatchConfig,
    /// Depth of each participant's command queue.
    pub command_queue_depth: usize,
    /// How long each participant has to answer the replay prompt.
    pub replay_answer_timeout: Duration,
    /// Bound on the whole replay negotiation.
    pub replay_overall_timeout: Duration,
    /// Experience credited to a winning human.
    pub win_experience: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            match_config: MatchConfig::default(),
            command_queue_depth: 10,
            replay_answer_timeout: Duration::from_secs(20),
            replay_overall_timeout: Duration::from_secs(30),
            win_experience: 30,
        }
    }
}

/// Where the session loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// A match is being played.
    Active,
    /// A match just finished.
    Ended(MatchOutcome),
    /// Waiting for replay answers.
    ReplayNegotiation,
    /// Tearing down.
    Terminated,
}

/// Result of a replay negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayDecision {
    Replay,
    Decline,
    Expired,
}

/// What woke the active loop.
enum LoopEvent {
    Command(Side, Option<String>),
    Tick,
}

/// What a finished session leaves behind.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Session identifier.
    pub session_id: Uuid,
    /// RNG seed the session ran with.
    pub seed: u64,
    /// One outcome per match played.
    pub outcomes: Vec<MatchOutcome>,
    /// Commands of the last match, in application order.
    pub last_command_log: Vec<LoggedCommand>,
}

/// Short hex form of a session id for logs.
pub fn short_id(id: &Uuid) -> String {
    hex::encode(&id.as_bytes()[..4])
}

/// A running session: two seats, one match state, one clock.
pub struct MatchSession {
    id: Uuid,
    seed: u64,
    config: SessionConfig,
    participants: [Participant; 2],
    state: Arc<RwLock<MatchState>>,
    profiles: Arc<dyn ProfileStore>,
    phase: SessionPhase,
    shutdown_tx: broadcast::Sender<()>,
    view_tx: watch::Sender<BotView>,
    command_log: Vec<LoggedCommand>,
    outcomes: Vec<MatchOutcome>,
}

impl MatchSession {
    /// Create a session with fresh structures scaled to each participant's level.
    pub fn new(config: SessionConfig, participants: [Participant; 2], profiles: Arc<dyn ProfileStore>) -> Self {
        let id = Uuid::new_v4();
        let seed = derive_session_seed(
            id.as_bytes(),
            &[*participants[0].id.as_bytes(), *participants[1].id.as_bytes()],
        );
        let levels = [participants[0].level, participants[1].level];
        let state = MatchState::new(*id.as_bytes(), seed, levels);
        let (shutdown_tx, _) = broadcast::channel(1);
        let (view_tx, _) = watch::channel(BotView::default());

        Self {
            id,
            seed,
            config,
            participants,
            state: Arc::new(RwLock::new(state)),
            profiles,
            phase: SessionPhase::Active,
            shutdown_tx,
            view_tx,
            command_log: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session RNG seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Read handle on the match state.
    pub fn state(&self) -> Arc<RwLock<MatchState>> {
        Arc::clone(&self.state)
    }

    /// Participant ids in seat order.
    pub fn participant_ids(&self) -> [Uuid; 2] {
        [self.participants[0].id, self.participants[1].id]
    }

    /// Participant names in seat order.
    pub fn usernames(&self) -> [String; 2] {
        [self.participants[0].username.clone(), self.participants[1].username.clone()]
    }

    /// Teardown signal for auxiliary tasks.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Read-only activity/mana view for a bot generator.
    pub fn bot_view(&self) -> watch::Receiver<BotView> {
        self.view_tx.subscribe()
    }

    /// Run the session to completion. Consumes the session; participants are
    /// dropped (closing their connections) when this returns.
    #[instrument(skip(self), fields(session = %short_id(&self.id)))]
    pub async fn run(mut self) -> SessionReport {
        info!(
            "Session started: {} (lv {}) vs {} (lv {})",
            self.participants[0].username,
            self.participants[0].level,
            self.participants[1].username,
            self.participants[1].level,
        );
        self.announce_start(false).await;

        loop {
            let phase = self.phase;
            self.phase = match phase {
                SessionPhase::Active => SessionPhase::Ended(self.play().await),
                SessionPhase::Ended(outcome) => {
                    self.conclude(outcome).await;
                    SessionPhase::ReplayNegotiation
                }
                SessionPhase::ReplayNegotiation => match self.negotiate_replay().await {
                    ReplayDecision::Replay => {
                        self.reset().await;
                        SessionPhase::Active
                    }
                    ReplayDecision::Decline => {
                        self.farewell().await;
                        SessionPhase::Terminated
                    }
                    ReplayDecision::Expired => {
                        info!("Replay negotiation timed out");
                        SessionPhase::Terminated
                    }
                },
                SessionPhase::Terminated => break,
            };
        }

        // Stop the bot generator and any other auxiliary task
        let _ = self.shutdown_tx.send(());
        info!("Session ended after {} match(es)", self.outcomes.len());

        SessionReport {
            session_id: self.id,
            seed: self.seed,
            outcomes: std::mem::take(&mut self.outcomes),
            last_command_log: std::mem::take(&mut self.command_log),
        }
    }

    // =========================================================================
    // ACTIVE
    // =========================================================================

    /// Play one match until it ends.
    async fn play(&mut self) -> MatchOutcome {
        let period = self.config.tick_interval;
        let mut clock = time::interval_at(Instant::now() + period, period);
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.publish_view(true).await;

        let outcome = loop {
            let event = {
                let [first, second] = &mut self.participants;
                tokio::select! {
                    line = first.recv_command() => LoopEvent::Command(Side::P1, line),
                    line = second.recv_command() => LoopEvent::Command(Side::P2, line),
                    _ = clock.tick() => LoopEvent::Tick,
                }
            };

            let ended = match event {
                LoopEvent::Command(side, None) => {
                    info!("{} disconnected", self.participants[side.index()].username);
                    Some(MatchOutcome::disconnect(side))
                }
                LoopEvent::Command(side, Some(line)) => self.handle_command(side, line).await,
                LoopEvent::Tick => self.handle_tick().await,
            };

            if let Some(outcome) = ended {
                break outcome;
            }
        };

        // Ticks already record their outcome; disconnects are recorded here
        self.state.write().await.end_match(outcome);
        self.publish_view(false).await;
        self.outcomes.push(outcome);
        info!("Match ended: {:?} ({})", outcome.winner, outcome.reason);
        outcome
    }

    /// Apply one command and answer its sender.
    async fn handle_command(&mut self, side: Side, line: String) -> Option<MatchOutcome> {
        let result = {
            let mut state = self.state.write().await;
            let result = apply_deploy(&mut state, side, &line);
            self.command_log.push(LoggedCommand {
                tick: state.elapsed_ticks,
                side,
                line,
            });
            for event in state.take_events() {
                debug!(?event, "command");
            }
            result
        };

        let reply = match result {
            Ok(receipt) => ServerMessage::Deployed {
                kind: receipt.kind,
                lane: receipt.lane,
                mana_left: receipt.mana_left,
            },
            Err(e) => ServerMessage::Rejected { reason: e.to_string() },
        };
        if self.send_to(side, reply).await.is_err() {
            return Some(MatchOutcome::disconnect(side));
        }

        self.publish_view(true).await;
        None
    }

    /// Advance the simulation one tick and broadcast the board.
    async fn handle_tick(&mut self) -> Option<MatchOutcome> {
        let (result, board, mana, elapsed) = {
            let mut state = self.state.write().await;
            let result = tick(&mut state, &self.config.match_config);
            let board = render_board(&state);
            let mana = [state.mana(Side::P1), state.mana(Side::P2)];
            (result, board, mana, state.elapsed_ticks)
        };

        for event in &result.events {
            debug!(?event, "tick");
        }
        if let Some(outcome) = result.outcome {
            return Some(outcome);
        }

        for side in Side::ALL {
            let update = ServerMessage::State(StateUpdate {
                side,
                mana: mana[side.index()],
                elapsed,
                board: board.clone(),
            });
            if self.send_to(side, update).await.is_err() {
                info!("Send to {} failed", self.participants[side.index()].username);
                return Some(MatchOutcome::disconnect(side));
            }
        }

        self.publish_view(true).await;
        None
    }

    // =========================================================================
    // ENDED
    // =========================================================================

    /// Announce the result, credit the winner and prompt for a replay.
    async fn conclude(&mut self, outcome: MatchOutcome) {
        for side in Side::ALL {
            let i = side.index();
            if self.participants[i].is_bot() {
                continue;
            }

            // Stale commands must not be read as replay answers
            let drained = self.participants[i].drain_commands();
            if drained > 0 {
                debug!("Dropped {} stale command(s) from {}", drained, self.participants[i].username);
            }

            let connected = self.participants[i].is_connected();
            if connected {
                let _ = self.participants[i]
                    .send(ServerMessage::MatchEnd(MatchEndInfo::for_side(outcome, side)))
                    .await;
            }

            if outcome.winner == Some(side) {
                self.credit_win(side).await;
            }

            if connected {
                let _ = self.participants[i].send(ServerMessage::ReplayPrompt).await;
            }
        }
    }

    /// Credit the win experience through the profile store.
    async fn credit_win(&mut self, side: Side) {
        let participant = &mut self.participants[side.index()];
        let profiles = Arc::clone(&self.profiles);
        let username = participant.username.clone();
        let amount = self.config.win_experience;

        let award = tokio::task::spawn_blocking(move || profiles.award_experience(&username, amount)).await;
        match award {
            Ok(Ok(award)) => {
                participant.level = award.level;
                if award.leveled_up {
                    info!("{} reached level {}", participant.username, award.level);
                    let _ = participant.send(ServerMessage::LevelUp { level: award.level }).await;
                }
                let _ = participant.send(ServerMessage::ExperienceGained(award.summary())).await;
            }
            Ok(Err(e)) => warn!("Failed to credit {}: {}", participant.username, e),
            Err(e) => warn!("Experience task failed: {}", e),
        }
    }

    // =========================================================================
    // REPLAY NEGOTIATION
    // =========================================================================

    /// Collect replay answers from every human seat.
    async fn negotiate_replay(&mut self) -> ReplayDecision {
        if self.participants.iter().any(|p| !p.is_bot() && !p.is_connected()) {
            debug!("A participant is gone, no replay");
            return ReplayDecision::Decline;
        }

        let answer_timeout = self.config.replay_answer_timeout;
        let overall = time::sleep(self.config.replay_overall_timeout);
        tokio::pin!(overall);

        let [first, second] = &mut self.participants;
        let mut answers: FuturesUnordered<_> = [first, second]
            .into_iter()
            .filter(|p| !p.is_bot())
            .map(|p| await_replay_answer(p, answer_timeout))
            .collect();

        loop {
            tokio::select! {
                _ = &mut overall => return ReplayDecision::Expired,
                answer = answers.next() => match answer {
                    Some(true) => continue,
                    Some(false) => return ReplayDecision::Decline,
                    None => return ReplayDecision::Replay,
                },
            }
        }
    }

    /// Restore a fresh match and announce it.
    async fn reset(&mut self) {
        for participant in &mut self.participants {
            participant.drain_commands();
        }
        let levels = [self.participants[0].level, self.participants[1].level];
        self.state.write().await.reset(levels);
        self.command_log.clear();
        info!("Replay accepted, match reset");
        self.announce_start(true).await;
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn announce_start(&self, rematch: bool) {
        for side in Side::ALL {
            let opponent = self.participants[side.opponent().index()].username.clone();
            let message = ServerMessage::MatchStart(MatchStartInfo { side, opponent, rematch });
            // A dead seat is noticed by the active loop
            let _ = self.participants[side.index()].send(message).await;
        }
    }

    async fn farewell(&self) {
        for participant in &self.participants {
            if !participant.is_bot() && participant.is_connected() {
                let _ = participant.send(ServerMessage::Goodbye).await;
            }
        }
    }

    async fn send_to(&self, side: Side, message: ServerMessage) -> Result<(), ParticipantError> {
        self.participants[side.index()].send(message).await
    }

    async fn publish_view(&self, active: bool) {
        let mana = {
            let state = self.state.read().await;
            [state.mana(Side::P1), state.mana(Side::P2)]
        };
        self.view_tx.send_replace(BotView { active, mana });
    }
}

/// Read one replay answer. Anything but a timely `Y` counts as a decline.
async fn await_replay_answer(participant: &mut Participant, bound: Duration) -> bool {
    match time::timeout(bound, participant.recv_command()).await {
        Ok(Some(line)) => match parse_replay_answer(&line) {
            Some(true) => {
                let _ = participant.send(ServerMessage::ReplayAccepted).await;
                true
            }
            Some(false) => {
                let _ = participant.send(ServerMessage::ReplayDeclined).await;
                false
            }
            None => {
                let _ = participant.send(ServerMessage::InvalidReplayAnswer).await;
                false
            }
        },
        Ok(None) => false,
        Err(_) => {
            let _ = participant.send(ServerMessage::ReplayTimeout).await;
            false
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
