//! # Output Server

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    msg::OutputMsg,
    net::{zmq, NetParams, SocketError, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Output server, publishing every output on a single socket
pub struct OutputServer {
    socket: zmq::Socket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OutputServerError {
    #[error("Socket error: {0}")]
    SocketError(SocketError),

    #[error("Could not send the {0} output: {1}")]
    SendError(&'static str, zmq::Error),

    #[error("Could not serialize the {0} output: {1}")]
    SerializationError(&'static str, serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OutputServer {
    /// Create a new instance of the output server.
    ///
    /// This function will not block until any subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, OutputServerError> {
        // Bind the socket
        let socket = SocketOptions::publisher(params.queue_depth)
            .create(ctx, zmq::PUB, &params.output_endpoint)
            .map_err(OutputServerError::SocketError)?;

        // Create self
        Ok(Self {
            socket
        })
    }

    /// Publish a single output.
    pub fn send(&self, msg: &OutputMsg) -> Result<(), OutputServerError> {
        // Serialize the output
        let msg_string = msg.to_json()
            .map_err(|e| OutputServerError::SerializationError(msg.kind(), e))?;

        // Send the output, with no subscribers or a full queue it is dropped
        match self.socket.send(&msg_string, zmq::DONTWAIT) {
            Ok(()) | Err(zmq::Error::EAGAIN) => Ok(()),
            Err(e) => Err(OutputServerError::SendError(msg.kind(), e))
        }
    }
}
