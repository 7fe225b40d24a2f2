mod client_event;
mod membership;
mod session_orchestrator;

pub use client_event::*;
pub use membership::*;
pub use session_orchestrator::*;
