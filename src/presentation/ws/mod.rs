//! Real-time gateway: connection registry, rooms, protocol, and the
//! dispatcher orchestrating them.

pub mod dispatcher;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod rooms;

pub use dispatcher::Dispatcher;
pub use handler::ws_handler;
pub use protocol::{ClientEvent, MessageView, ServerEvent};
pub use registry::{ConnectionId, ConnectionRegistry, Disconnected};
pub use rooms::{RoomId, RoomManager};
