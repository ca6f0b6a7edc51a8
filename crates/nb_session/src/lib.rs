pub mod chunker;
pub mod dedup;
pub mod orchestrator;
pub mod session;

pub use chunker::{chunk, DEFAULT_CHUNK_SIZE};
pub use dedup::filter_unseen;
pub use orchestrator::{Orchestrator, OrchestratorConfig, TurnOutcome, TurnPhase};
pub use session::{Checkpoint, HistoryWindow, SessionState, SYSTEM_PROMPT};
