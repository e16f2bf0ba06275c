//! TCP Game Server
//!
//! Accepts line-oriented TCP connections, runs the username / mode handshake
//! and hands each participant to the matchmaker.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::game::tick::MatchConfig;
use crate::network::matchmaker::{Matchmaker, MatchmakingError};
use crate::network::participant::{spawn_connection, Connection, Difficulty, Participant};
use crate::network::profile::{JsonProfileStore, MemoryProfileStore, ProfileError, ProfileStore};
use crate::network::registry::SessionRegistry;
use crate::network::protocol::ServerMessage;
use crate::network::session::{short_id, SessionConfig};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Profile file; `None` keeps profiles in memory.
    pub profile_path: Option<PathBuf>,
    /// Settings for every session this server starts.
    pub session: SessionConfig,
    /// Capacity of the PvP matchmaking queue.
    pub matchmaking_queue: usize,
    /// How long a client may idle at a handshake prompt.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5555)),
            profile_path: None,
            session: SessionConfig::default(),
            matchmaking_queue: 64,
            handshake_timeout: Duration::from_secs(120),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `LANE_CLASH_BIND`, `LANE_CLASH_TICK_MS`,
    /// `LANE_CLASH_MATCH_SECS` and `LANE_CLASH_PROFILES`.
    ///
    /// Profiles go to `players.json` unless `LANE_CLASH_PROFILES` names another
    /// file; an empty value keeps them in memory.
    pub fn from_env() -> Result<Self, GameServerError> {
        let mut config = Self {
            profile_path: Some(PathBuf::from("players.json")),
            ..Self::default()
        };

        if let Some(bind) = env_var("LANE_CLASH_BIND") {
            config.bind_addr = bind
                .parse()
                .map_err(|e| GameServerError::Config(format!("LANE_CLASH_BIND={}: {}", bind, e)))?;
        }

        if let Some(tick_ms) = env_var("LANE_CLASH_TICK_MS") {
            let tick_ms: u64 = tick_ms
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| GameServerError::Config(format!("LANE_CLASH_TICK_MS={}", tick_ms)))?;
            config.session.tick_interval = Duration::from_millis(tick_ms);
        }

        if let Some(secs) = env_var("LANE_CLASH_MATCH_SECS") {
            let secs: u64 = secs
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| GameServerError::Config(format!("LANE_CLASH_MATCH_SECS={}", secs)))?;
            config.session.match_config = MatchConfig {
                duration_ticks: match_ticks(Duration::from_secs(secs), config.session.tick_interval),
                ..config.session.match_config
            };
        }

        if let Ok(path) = std::env::var("LANE_CLASH_PROFILES") {
            let path = path.trim();
            config.profile_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Ticks in a match of `length` at one tick per `tick_interval` (at least one).
pub fn match_ticks(length: Duration, tick_interval: Duration) -> u32 {
    let ticks = length.as_millis() / tick_interval.as_millis().max(1);
    ticks.clamp(1, u32::MAX as u128) as u32
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind or accept.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Client went away during the handshake.
    #[error("client disconnected during handshake")]
    Disconnected,

    /// Client did not answer a handshake prompt in time.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// Profile lookup failed.
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Matchmaking refused the participant.
    #[error("matchmaking error: {0}")]
    Matchmaking(#[from] MatchmakingError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// What the client picked at the mode menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeChoice {
    Bot(Difficulty),
    Pvp,
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    profiles: Arc<dyn ProfileStore>,
    matchmaker: Arc<Matchmaker>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server with the profile store named by the config.
    pub fn new(config: ServerConfig) -> Self {
        let profiles: Arc<dyn ProfileStore> = match &config.profile_path {
            Some(path) => Arc::new(JsonProfileStore::new(path)),
            None => Arc::new(MemoryProfileStore::new()),
        };
        Self::with_profiles(config, profiles)
    }

    /// Create a server backed by the given profile store.
    pub fn with_profiles(config: ServerConfig, profiles: Arc<dyn ProfileStore>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let matchmaker = Arc::new(Matchmaker::new(
            config.session.clone(),
            Arc::new(SessionRegistry::new()),
            Arc::clone(&profiles),
            config.matchmaking_queue,
        ));

        Self {
            config,
            profiles,
            matchmaker,
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let matchmaking_handle = tokio::spawn(Arc::clone(&self.matchmaker).run(self.shutdown_tx.subscribe()));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if let Err(e) = matchmaking_handle.await {
            warn!("Matchmaking task failed: {}", e);
        }
        self.log_live_sessions().await;
        Ok(())
    }

    /// Log where every session still running stands.
    async fn log_live_sessions(&self) {
        let registry = self.matchmaker.registry();
        for id in registry.session_ids().await {
            if let Some(state) = registry.snapshot(&id).await {
                info!(
                    "Session {} still running at tick {} (match ended: {})",
                    short_id(&id),
                    state.elapsed_ticks,
                    state.is_ended()
                );
            }
        }
    }

    /// Run the handshake for a new connection on its own task.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let (read_half, write_half) = stream.into_split();
        let connection = spawn_connection(read_half, write_half, self.config.session.command_queue_depth);

        let profiles = Arc::clone(&self.profiles);
        let matchmaker = Arc::clone(&self.matchmaker);
        let prompt_timeout = self.config.handshake_timeout;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let outbound = connection.outbound.clone();
            let result = tokio::select! {
                result = admit(connection, profiles, matchmaker, prompt_timeout) => result,
                _ = shutdown_rx.recv() => {
                    let _ = outbound
                        .send(ServerMessage::Shutdown { reason: "server is stopping".to_string() })
                        .await;
                    return;
                }
            };

            match result {
                Ok(()) => debug!("Client {} handed to matchmaking", addr),
                Err(GameServerError::Disconnected) => debug!("Client {} left during handshake", addr),
                Err(e) => {
                    warn!("Handshake with {} failed: {}", addr, e);
                    let _ = outbound.send(ServerMessage::Error { message: e.to_string() }).await;
                }
            }
        });
    }

    /// Stop accepting connections and stop the matchmaking loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.matchmaker.registry().session_count().await
    }

    /// Registry of live sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.matchmaker.registry()
    }
}

/// Username, profile, mode menu, then matchmaking.
async fn admit(
    mut connection: Connection,
    profiles: Arc<dyn ProfileStore>,
    matchmaker: Arc<Matchmaker>,
    prompt_timeout: Duration,
) -> Result<(), GameServerError> {
    let username = next_line(&mut connection, prompt_timeout).await?;
    let lookup = username.clone();
    let profile = tokio::task::spawn_blocking(move || profiles.load_profile(&lookup))
        .await
        .map_err(|e| GameServerError::Internal(e.to_string()))??;
    info!("{} logged in at level {}", username, profile.level);

    send(&connection, ServerMessage::Welcome(profile.summary())).await?;
    let choice = choose_mode(&mut connection, prompt_timeout).await?;

    let participant = Participant::human(username, profile.level, connection);
    match choice {
        ModeChoice::Bot(difficulty) => {
            matchmaker.request_bot_match(participant, difficulty.level()).await?;
        }
        ModeChoice::Pvp => matchmaker.request_match(participant).await?,
    }
    Ok(())
}

/// Ask for a mode (and a difficulty for bot games) until a valid answer.
async fn choose_mode(connection: &mut Connection, prompt_timeout: Duration) -> Result<ModeChoice, GameServerError> {
    loop {
        send(connection, ServerMessage::ModeMenu).await?;
        match next_line(connection, prompt_timeout).await?.as_str() {
            "1" => loop {
                send(connection, ServerMessage::DifficultyMenu).await?;
                let answer = next_line(connection, prompt_timeout).await?;
                match answer.parse::<u8>().ok().and_then(Difficulty::from_level) {
                    Some(difficulty) => return Ok(ModeChoice::Bot(difficulty)),
                    None => {
                        let message = format!("invalid difficulty {:?}, choose 1-3", answer);
                        send(connection, ServerMessage::Error { message }).await?;
                    }
                }
            },
            "2" => {
                send(connection, ServerMessage::Waiting).await?;
                return Ok(ModeChoice::Pvp);
            }
            other => {
                let message = format!("invalid choice {:?}, choose 1 or 2", other);
                send(connection, ServerMessage::Error { message }).await?;
            }
        }
    }
}

async fn next_line(connection: &mut Connection, prompt_timeout: Duration) -> Result<String, GameServerError> {
    match timeout(prompt_timeout, connection.commands.recv()).await {
        Ok(Some(line)) => Ok(line),
        Ok(None) => Err(GameServerError::Disconnected),
        Err(_) => Err(GameServerError::HandshakeTimeout),
    }
}

async fn send(connection: &Connection, message: ServerMessage) -> Result<(), GameServerError> {
    connection
        .outbound
        .send(message)
        .await
        .map_err(|_| GameServerError::Disconnected)
}
