//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, the networking library chosen for the 
//! software.
//!
//! Inputs arrive on one SUB socket per input kind, so that a flood of one kind (clouds, usually)
//! cannot push another out of its queue. All outputs leave through a single PUB socket.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use zmq::{Context, Socket, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| SocketError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network endpoints and queue configuration, loaded from `net.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Endpoint publishing state estimates
    pub pose_endpoint: String,

    /// Endpoint publishing depth clouds
    pub cloud_endpoint: String,

    /// Endpoint publishing goal points
    pub goal_endpoint: String,

    /// Endpoint publishing operator joystick states
    pub operator_endpoint: String,

    /// Endpoint publishing the external auto-mode scalar
    pub auto_mode_endpoint: String,

    /// Endpoint publishing speed overrides
    pub speed_endpoint: String,

    /// Endpoint publishing obstacle memory clear requests
    pub clear_cloud_endpoint: String,

    /// Endpoint this executable binds its output publisher to
    pub output_endpoint: String,

    /// Maximum number of messages queued per input, older messages are dropped beyond this
    pub queue_depth: i32,
}

/// Represents options which can be set on a socket.
///
/// Most options here correspond to those found in the 
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) documentation.
#[derive(Debug, Clone)]
pub struct SocketOptions {

    /// Indicates if the socket should bind itself to the endpoint. Publishers should have this
    /// value set as `true`, subscribers should have it set as `false`.
    ///
    /// The default value is `false`.
    pub bind: bool,

    /// `ZMQ_SUBSCRIBE`: topic prefix filter, only used for SUB sockets. Empty subscribes to
    /// everything.
    pub subscribe: Vec<u8>,

    /// `ZMQ_LINGER`: Set linger period for socket shutdown
    pub linger: i32,

    /// `ZMQ_RECONNECT_IVL`: Set reconnection interval
    pub reconnect_ivl: i32,

    /// `ZMQ_RCVTIMEO`: Maximum time before a recv operation returns with `EAGAIN`
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: Maximum time before a send operation returns with `EAGAIN`
    pub send_timeout: i32,

    /// `ZMQ_RCVHWM`: High water mark for inbound messages
    pub recv_hwm: i32,

    /// `ZMQ_SNDHWM`: High water mark for outbound messages
    pub send_hwm: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum SocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Could not connect the socket to {0}: {1}")]
    CouldNotConnect(String, zmq::Error),

    #[error("Could not bind the socket to {0}: {1}")]
    CouldNotBind(String, zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SocketOptions {
    /// Options for a non-blocking subscriber holding at most `queue_depth` messages.
    pub fn subscriber(queue_depth: i32) -> Self {
        Self {
            recv_timeout: 0,
            recv_hwm: queue_depth,
            linger: 0,
            ..Default::default()
        }
    }

    /// Options for a bound publisher which never blocks the caller.
    pub fn publisher(queue_depth: i32) -> Self {
        Self {
            bind: true,
            send_timeout: 0,
            send_hwm: queue_depth,
            linger: 1,
            ..Default::default()
        }
    }

    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), SocketError> {

        // Set all the socket options, we use a macro here to make the error handling nice and
        // easy
        set_sockopts!(
            socket,
            (set_linger, self.linger),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout),
            (set_rcvhwm, self.recv_hwm),
            (set_sndhwm, self.send_hwm)
        );

        // If the socket is a sub type set the subscription
        if let Ok(SocketType::SUB) = socket.get_socket_type() {
            set_sockopts!(socket, (set_subscribe, &self.subscribe));
        }

        Ok(())
    }

    /// Create a socket of the given type with these options, and connect or bind it to the
    /// endpoint.
    pub fn create(
        &self,
        ctx: &Context,
        socket_type: SocketType,
        endpoint: &str
    ) -> Result<Socket, SocketError> {
        let socket = ctx.socket(socket_type)
            .map_err(SocketError::CreateSocketError)?;

        // Options must be set before connecting for the high water marks to apply
        self.set(&socket)?;

        match self.bind {
            true => socket.bind(endpoint)
                .map_err(|e| SocketError::CouldNotBind(endpoint.into(), e))?,
            false => socket.connect(endpoint)
                .map_err(|e| SocketError::CouldNotConnect(endpoint.into(), e))?
        }

        Ok(socket)
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // Defaults for sockopts taken from http://api.zeromq.org/4-2:zmq-setsockopt
        Self {
            bind: false,
            subscribe: Vec::new(),
            linger: 30_000,
            reconnect_ivl: 100,
            recv_timeout: -1,
            send_timeout: -1,
            recv_hwm: 1000,
            send_hwm: 1000,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_subscriber_options() {
        let opts = SocketOptions::subscriber(5);
        assert!(!opts.bind);
        assert_eq!(opts.recv_hwm, 5);
        assert_eq!(opts.recv_timeout, 0);
        assert!(opts.subscribe.is_empty());

        let opts = SocketOptions::publisher(5);
        assert!(opts.bind);
        assert_eq!(opts.send_hwm, 5);
    }

    #[test]
    fn test_inproc_pub_sub() {
        let ctx = Context::new();

        let publisher = SocketOptions::publisher(5)
            .create(&ctx, zmq::PUB, "inproc://net_test")
            .unwrap();
        let subscriber = SocketOptions {
            recv_timeout: 1000,
            ..SocketOptions::subscriber(5)
        }
            .create(&ctx, zmq::SUB, "inproc://net_test")
            .unwrap();

        // Slow joiner: keep publishing until the subscriber sees a message
        let mut received = None;
        for _ in 0..50 {
            publisher.send("hello", 0).unwrap();
            if let Ok(Ok(s)) = subscriber.recv_string(zmq::DONTWAIT) {
                received = Some(s);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert_eq!(received.as_deref(), Some("hello"));
    }
}
