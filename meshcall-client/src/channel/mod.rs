mod message_channel;

pub use message_channel::*;
