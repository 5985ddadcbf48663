//! Outbound side of the backend connection.

use replterm_core::OutboundFrame;

use crate::error::ChannelError;

/// A connection to the execution backend.
///
/// The session owns its channel exclusively and swaps it wholesale on
/// reconnect, so implementations need no interior locking.
pub trait Channel {
    /// Put one frame on the wire.
    fn send(&mut self, frame: OutboundFrame) -> Result<(), ChannelError>;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, frame: OutboundFrame) -> Result<(), ChannelError> {
        (**self).send(frame)
    }
}
