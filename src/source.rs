pub mod realtime;
pub mod transport;

pub use self::realtime::RealtimePositionClient;
pub use self::transport::HttpTransport;
