mod backoff;
mod channel;
mod messages;

pub use backoff::ReconnectPolicy;
pub use channel::{derive_ws_url, ConnectionState, PushChannel};
pub use messages::{event_types, Frame, PushEvent};
