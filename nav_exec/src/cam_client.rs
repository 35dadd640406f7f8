//! # Camera Client
//!
//! The camera client requests frames from both cameras and recieves them back from the camera
//! server. Navigation only acts on the active camera but keeps the other one's latest frame so a
//! camera hand-off can be processed straight away.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use log::trace;

use comms_if::{
    net::{zmq, MonitoredSocket, SocketOptions, MonitoredSocketError, NetParams}, 
    eqpt::cam::*
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The camera client
pub struct CamClient {
    socket: MonitoredSocket,

    awaiting_response: bool
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CamClientError {

    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send the request to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the data: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),

    #[error(
        "Could not make another request to the server since the client is still waiting for the \
        response to the last request")]
    WaitingForResponse,

    #[error("Cannot recieve a response as no request has been made")]
    NoRequestMade,

    #[error("Error while decoding the image from the {0} camera: {1}")]
    ImageDecodeError(CamId, image::ImageError),

    #[error("The server responed with a message which was not valid UTF-8")]
    NonUtf8Response

}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamClient {
    /// Create a new instance of the camera client
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, CamClientError> {
        let socket = MonitoredSocket::new(
            ctx, 
            zmq::REQ, 
            SocketOptions::client(), 
            &params.cam_endpoint
        ).map_err(CamClientError::SocketError)?;

        Ok(Self {
            socket,
            awaiting_response: false
        })
    }

    /// Send a request for a frame from both cameras.
    ///
    /// Sending a request while still waiting on the response to a previous request will result in
    /// an error.
    pub fn request_frames(&mut self, format: ImageFormat) -> Result<(), CamClientError> {
        if !self.socket.connected() {
            // The request will never be answered once the connection has dropped
            self.awaiting_response = false;
            return Err(CamClientError::NotConnected)
        }

        if self.awaiting_response {
            return Err(CamClientError::WaitingForResponse)
        }

        let request = CamRequest {
            cameras: vec![CamId::Front, CamId::Back],
            format
        };

        let request_str = serde_json::to_string(&request)
            .map_err(CamClientError::SerializationError)?;

        self.socket.send(&request_str, 0)
            .map_err(CamClientError::SendError)?;

        self.awaiting_response = true;

        Ok(())
    }

    /// Receive the images in response to a request.
    ///
    /// Returns `None` if no response was recieved within the client's recieve timeout.
    pub fn receive_images(&mut self) -> Result<Option<HashMap<CamId, CamImage>>, CamClientError> {
        if !self.socket.connected() {
            self.awaiting_response = false;
            return Err(CamClientError::NotConnected)
        }

        if !self.awaiting_response {
            return Err(CamClientError::NoRequestMade)
        }

        let response_str = match self.socket.recv_string(0) {
            // Valid response
            Ok(Ok(s)) => s,
            // Invalid response
            Ok(Err(_)) => {
                self.awaiting_response = false;
                return Err(CamClientError::NonUtf8Response)
            },
            // No response yet
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(CamClientError::RecvError(e))
        };

        self.awaiting_response = false;

        let response: CamResponse = serde_json::from_str(&response_str)
            .map_err(CamClientError::DeserializeError)?;

        let mut images = HashMap::<CamId, CamImage>::new();
        for (id, frame) in response.frames {
            images.insert(
                id, 
                frame.to_cam_image()
                    .map_err(|e| CamClientError::ImageDecodeError(id, e))?
            );
        }

        trace!("Recieved {} camera images", images.len());

        Ok(Some(images))
    }
}
