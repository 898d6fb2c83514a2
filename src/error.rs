//! Error taxonomy for the menu client
//!
//! Errors fall in three classes that decide how the session reacts:
//! environment errors (no compositor, missing globals), resource errors
//! (shared memory, file descriptors) and protocol errors (dispatch failures, bad
//! keymaps). Each of them ends the process with a non-zero status, except
//! resource errors during a redraw, which only drop that frame.

use std::io;

use thiserror::Error;
use wayland_client::backend::WaylandError;
use wayland_client::{ConnectError, DispatchError};

/// Convenience alias used across the crate
pub type Result<T, E = RingError> = std::result::Result<T, E>;

/// How an error should be treated by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The display server cannot host the menu at all
    Environment,
    /// A local resource (memory, descriptor) could not be obtained
    Resource,
    /// The conversation with the display server broke down
    Protocol,
}

#[derive(Debug, Error)]
pub enum RingError {
    #[error("failed to connect to the Wayland display: {0}")]
    Connect(#[from] ConnectError),

    #[error("compositor does not expose required globals: {}", .0.join(", "))]
    MissingCapabilities(Vec<&'static str>),

    #[error("roundtrip with the compositor failed: {0}")]
    Roundtrip(#[from] DispatchError),

    #[error("failed to flush requests to the compositor: {0}")]
    Flush(WaylandError),

    #[error("failed to allocate a shared pixel buffer of {size} bytes: {source}")]
    Allocation {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to compile keymap: {0}")]
    Keymap(String),

    #[error("event loop failed: {0}")]
    EventLoop(#[from] calloop::Error),

    #[error("overlay surface was closed by the compositor")]
    SurfaceClosed,

    #[error("overlay surface has not been configured yet")]
    NotConfigured,

    #[error("no menu items on standard input")]
    EmptyMenu,
}

impl RingError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RingError::Connect(_) | RingError::MissingCapabilities(_) | RingError::EmptyMenu => {
                ErrorClass::Environment
            }
            RingError::Allocation { .. } | RingError::NotConfigured => {
                ErrorClass::Resource
            }
            RingError::Roundtrip(_)
            | RingError::Flush(_)
            | RingError::Keymap(_)
            | RingError::EventLoop(_)
            | RingError::SurfaceClosed => ErrorClass::Protocol,
        }
    }

    /// A redraw failing with this error only loses that frame
    pub fn skips_frame(&self) -> bool {
        self.class() == ErrorClass::Resource
    }
}
