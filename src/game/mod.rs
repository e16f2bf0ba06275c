//! Game Logic Module
//!
//! All match simulation code. Deterministic given a seed and a command log.
//!
//! ## Module Structure
//!
//! - `map`: Sides, lanes and the position frame
//! - `unit`: Unit roster and deployed units
//! - `structure`: Guards and kings
//! - `combat`: Damage formula
//! - `state`: Match state
//! - `command`: Deploy parsing and validation
//! - `tick`: Authoritative simulation step
//! - `render`: Text board
//! - `events`: Game events for logging/replay

pub mod map;
pub mod unit;
pub mod structure;
pub mod combat;
pub mod state;
pub mod command;
pub mod tick;
pub mod render;
pub mod events;

// Re-export key types
pub use map::{Lane, Side};
pub use unit::{Unit, UnitKind};
pub use state::{MatchState, MatchOutcome, EndReason, MatchPhase};
pub use command::{apply_deploy, CommandError};
pub use tick::{tick, MatchConfig, TickResult};
pub use render::render_board;
pub use events::GameEvent;
