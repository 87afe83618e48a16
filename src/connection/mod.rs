//! Connection layer — the single chat socket, its state machine and the
//! transport seam it drives

pub mod manager;
pub mod mock;
pub mod state;
pub mod transport;

pub use manager::{ChannelObserver, ConnectionManager, ConnectionObserver};
pub use state::{ConnectionEvent, ConnectionState, ReconnectAttempt};
pub use transport::{Connector, Transport, TransportSignal, WsConnector};
