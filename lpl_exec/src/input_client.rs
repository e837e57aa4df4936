//! # Input Client
//!
//! Subscribes to every input endpoint and drains whatever has arrived since
//! the last cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;

use comms_if::{
    msg::{InputMsg, MsgParseError},
    net::{zmq, NetParams, SocketError, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Input client, one subscriber per input kind
pub struct InputClient {
    sockets: Vec<(&'static str, zmq::Socket)>
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InputClientError {
    #[error("Socket error: {0}")]
    SocketError(SocketError),

    #[error("Could not recieve a message on the {0} socket: {1}")]
    RecvError(&'static str, zmq::Error),

    #[error("Could not parse the recieved input: {0}")]
    InputParseError(MsgParseError),

    #[error("The {0} publisher sent a message which was not valid UTF-8")]
    NonUtf8Message(&'static str)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InputClient {

    /// Create a new instance of the input client.
    ///
    /// This function will not block until the publishers connect.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, InputClientError> {
        let socket_options = SocketOptions::subscriber(params.queue_depth);

        let endpoints: [(&'static str, &String); 7] = [
            ("pose", &params.pose_endpoint),
            ("cloud", &params.cloud_endpoint),
            ("goal", &params.goal_endpoint),
            ("operator", &params.operator_endpoint),
            ("auto_mode", &params.auto_mode_endpoint),
            ("speed", &params.speed_endpoint),
            ("clear_cloud", &params.clear_cloud_endpoint),
        ];

        let mut sockets = Vec::with_capacity(endpoints.len());
        for (name, endpoint) in endpoints.iter() {
            let socket = socket_options
                .create(ctx, zmq::SUB, endpoint)
                .map_err(InputClientError::SocketError)?;
            sockets.push((*name, socket));
        }

        Ok(Self {
            sockets
        })
    }

    /// Recieve every input currently queued on any socket, oldest first.
    ///
    /// Inputs which fail to parse are logged and dropped, they don't stop the others from being
    /// recieved.
    pub fn recieve_all(&self) -> Result<Vec<InputMsg>, InputClientError> {
        let mut inputs = Vec::new();

        for (name, socket) in self.sockets.iter() {
            loop {
                match Self::recieve_one(name, socket) {
                    Ok(Some(msg)) => inputs.push(msg),
                    Ok(None) => break,
                    Err(InputClientError::InputParseError(e)) => {
                        warn!("Could not parse {} input: {}", name, e)
                    },
                    Err(e) => return Err(e)
                }
            }
        }

        // Stable, so inputs with equal stamps keep their per-socket order
        inputs.sort_by(|a, b| a.time_s().partial_cmp(&b.time_s())
            .unwrap_or(std::cmp::Ordering::Equal));

        Ok(inputs)
    }

    fn recieve_one(
        name: &'static str,
        socket: &zmq::Socket
    ) -> Result<Option<InputMsg>, InputClientError> {
        // Attempt to read a string from the socket
        let msg_str = match socket.recv_string(zmq::DONTWAIT) {
            // Valid message
            Ok(Ok(s)) => s,
            // Non UTF-8 message
            Ok(Err(_)) => return Err(InputClientError::NonUtf8Message(name)),
            // Nothing queued
            Err(zmq::Error::EAGAIN) => return Ok(None),
            // Recieve error
            Err(e) => return Err(InputClientError::RecvError(name, e))
        };

        InputMsg::from_json(&msg_str)
            .map(Some)
            .map_err(InputClientError::InputParseError)
    }
}
