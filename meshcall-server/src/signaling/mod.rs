mod relay_outcome;
mod signaling_router;
mod ws_handler;

pub use relay_outcome::*;
pub use signaling_router::*;
pub use ws_handler::*;
