pub mod config;
pub mod error;
pub mod room;
pub mod server;
pub mod signaling;

pub use config::*;
pub use error::*;
pub use room::*;
pub use server::*;
pub use signaling::*;
