//! # Diagnostics Server
//!
//! Publishes a [`DiagPacket`] for every navigation cycle. Diagnostics are best-effort, a failure
//! to publish is reported but never stops navigation.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::diag::DiagPacket, 
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions}
};

use crate::nav_loop::DiagSink;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Diagnostics server
pub struct DiagServer {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DiagServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send diagnostics: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the diagnostics: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not encode the {0} image: {1}")]
    ImageEncodeError(&'static str, image::ImageError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DiagServer {
    /// Create a new instance of the diagnostics server.
    ///
    /// This function will not block until a client connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, DiagServerError> {
        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            SocketOptions::publisher(),
            &params.diag_endpoint
        ).map_err(DiagServerError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    /// Publish a packet.
    ///
    /// The send does not block, if the socket's queue is full the packet is dropped.
    pub fn send(&mut self, packet: &DiagPacket) -> Result<(), DiagServerError> {
        let packet_str = serde_json::to_string(packet)
            .map_err(DiagServerError::SerializationError)?;

        self.socket.send(&packet_str, zmq::DONTWAIT)
            .map_err(DiagServerError::SendError)
    }
}

impl DiagSink for DiagServer {
    fn send_diag(&mut self, packet: &DiagPacket) -> Result<(), DiagServerError> {
        self.send(packet)
    }
}
