// Pawbird Engine — scheduler, collaborators and their wiring.
// Leaf components (quota, registry, scorer, tagger) are pure and synchronous;
// the orchestrator composes them with the async generator and transport.

pub mod bootstrap;
pub mod config;
pub mod dry_run;
pub mod http;
pub mod orchestrator;
pub mod processed;
pub mod prompts;
pub mod providers;
pub mod quota;
pub mod registry;
pub mod scheduler;
pub mod scorer;
pub mod tagger;
pub mod twitter;
