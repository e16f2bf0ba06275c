//! Network Layer
//!
//! TCP server, matchmaking and the per-session loop.
//! This layer is **non-deterministic** - all match rules run through `game/`.

pub mod protocol;
pub mod participant;
pub mod profile;
pub mod bot;
pub mod session;
pub mod registry;
pub mod matchmaker;
pub mod server;

pub use protocol::{ServerMessage, MatchStartInfo, MatchEndInfo, MatchResult, StateUpdate, ProfileSummary};
pub use participant::{Participant, ParticipantKind, Difficulty, Connection, spawn_connection};
pub use profile::{Profile, ProfileStore, ProfileError, MemoryProfileStore, JsonProfileStore};
pub use session::{MatchSession, SessionConfig, SessionPhase, SessionReport};
pub use registry::{SessionRegistry, SessionEntry};
pub use matchmaker::{Matchmaker, MatchmakingError};
pub use server::{GameServer, ServerConfig, GameServerError};
