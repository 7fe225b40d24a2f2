mod room;
mod room_registry;
mod room_sweeper;

pub use room::*;
pub use room_registry::*;
pub use room_sweeper::*;
