//! Panel download protocol.

pub mod command;
pub mod packet;
pub mod response;

// Re-export common types
pub use command::{ACK_TOKEN, CONNECT_ACK, Command, TERMINATOR};
pub use packet::{PACKET_SIZE, PacketWindow, packet_sizes};
pub use response::ResponseWindow;
