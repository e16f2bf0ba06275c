//! # Lane Clash Server
//!
//! Real-time two-player lane combat: each side deploys units that march down
//! three lanes toward the opponent's guards and king while mana accumulates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    LANE CLASH SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Deterministic primitives                │
//! │  └── rng.rs        - Xorshift128+ PRNG, session seeds        │
//! │                                                              │
//! │  game/             - Match rules (deterministic)             │
//! │  ├── map.rs        - Sides, lanes, position frame            │
//! │  ├── unit.rs       - Unit roster and level scaling           │
//! │  ├── structure.rs  - Guards, kings, lane rerouting           │
//! │  ├── combat.rs     - Damage formula                          │
//! │  ├── state.rs      - Match state                             │
//! │  ├── command.rs    - Deploy parsing and validation           │
//! │  ├── tick.rs       - Authoritative simulation step           │
//! │  └── render.rs     - Text board                              │
//! │                                                              │
//! │  network/          - Networking (non-deterministic)          │
//! │  ├── server.rs     - TCP server and handshake                │
//! │  ├── matchmaker.rs - PvP queue and bot matches               │
//! │  ├── session.rs    - Session loop state machine              │
//! │  ├── registry.rs   - Live sessions                           │
//! │  ├── participant.rs- Seats and connection tasks              │
//! │  ├── bot.rs        - Bot command generator                   │
//! │  ├── profile.rs    - Level / experience store                │
//! │  └── protocol.rs   - Outbound messages                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read the clock or any ambient randomness. Crit
//! rolls and bot choices come from a seeded Xorshift128+, so a match is
//! reproducible from its seed and its command log
//! (see [`game::tick::replay_match`]).

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::{Lane, Side, UnitKind, MatchState, MatchOutcome, EndReason};
pub use network::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default clock period in milliseconds (one simulation tick)
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Mana ceiling per side
pub const MANA_CAP: u32 = 10;

/// Mana credited to each side per tick
pub const MANA_PER_TICK: u32 = 1;

/// Match duration in ticks (three minutes at one tick per second)
pub const MATCH_DURATION_TICKS: u32 = 180;
