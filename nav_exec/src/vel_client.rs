//! # Velocity Client
//!
//! Publishes velocity commands to the robot base. Commands are fire-and-forget, the base never
//! acknowledges them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::vel::ControlCommand, 
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions}
};

use crate::nav_loop::CommandSink;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The velocity client
pub struct VelClient {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VelClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the command: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the command: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VelClient {
    /// Create a new instance of the velocity client.
    ///
    /// This function will not block until the base connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, VelClientError> {
        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            SocketOptions::publisher(),
            &params.vel_endpoint
        ).map_err(VelClientError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    /// Publish a command.
    pub fn send(&mut self, cmd: &ControlCommand) -> Result<(), VelClientError> {
        let cmd_str = serde_json::to_string(cmd)
            .map_err(VelClientError::SerializationError)?;

        self.socket.send(&cmd_str, 0)
            .map_err(VelClientError::SendError)
    }
}

impl CommandSink for VelClient {
    fn send_command(&mut self, cmd: &ControlCommand) -> Result<(), VelClientError> {
        self.send(cmd)
    }
}
