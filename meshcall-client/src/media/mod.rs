mod local_media;
mod media_connection;
mod rtc_connection;

pub use local_media::*;
pub use media_connection::*;
pub use rtc_connection::*;
