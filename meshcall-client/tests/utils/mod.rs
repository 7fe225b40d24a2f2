pub mod fake_connection;
pub mod rtc_pair;
pub mod test_server;

pub use fake_connection::*;
pub use recording_output::*;
pub use rtc_pair::*;
pub use session_harness::*;
pub use test_server::*;
pub use wait::*;
