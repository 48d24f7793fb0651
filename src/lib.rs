// Pawbird — rate-limited engagement scheduler for a microblogging bot.
//
// atoms/  : constants, data types, the error enum and collaborator traits
// engine/ : quota tracking, candidate scoring, account rotation, tagging,
//           the orchestrator and the timers that drive it

pub mod atoms;
pub mod engine;

pub use atoms::error::{EngineError, EngineResult};
pub use atoms::traits::{ContentTransport, TextGenerator};
pub use engine::config::BotConfig;
pub use engine::orchestrator::{Orchestrator, TickReport};
pub use engine::scheduler::StopSignal;
