/// Hearth - Realtime Chat Client Core
///
/// The reusable middle of a chat client: a live subscription to a remote
/// message collection exposed as a stream of full-list snapshots, plus the
/// placeholder-then-upload submission chain, all behind narrow backend
/// contracts so hosted services stay swappable.

pub mod backend;
pub mod config;
pub mod error;
pub mod message;
pub mod state;
pub mod submit;
pub mod sync;

pub use backend::MemoryBackend;
pub use config::ChatConfig;
pub use error::{HearthError, Result};
pub use message::Message;
pub use state::ChatSession;
