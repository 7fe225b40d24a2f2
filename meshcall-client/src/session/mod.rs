mod backoff;
mod candidate_buffer;
mod negotiation;
mod peer_session;
mod session_handle;
mod signaling_output;

pub use backoff::*;
pub use candidate_buffer::*;
pub use negotiation::*;
pub use peer_session::*;
pub use session_handle::*;
pub use signaling_output::*;
