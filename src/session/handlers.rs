//! Ordered handler registry for inbound data and frame fan-out
//!
//! Handlers are invoked synchronously, in registration order, for every
//! inbound message. A failing handler is logged and never prevents delivery
//! to the handlers registered after it.

use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::transport::MediaFrame;

/// Callback invoked for every inbound application-data message
pub type DataHandler = Arc<dyn Fn(&serde_json::Value) -> anyhow::Result<()> + Send + Sync>;

/// Callback invoked for every inbound decoded media frame
pub type FrameHandler = Arc<dyn Fn(&MediaFrame) -> anyhow::Result<()> + Send + Sync>;

/// Explicit ordered registry of data and frame handlers
#[derive(Default)]
pub struct HandlerRegistry {
    data: RwLock<Vec<DataHandler>>,
    frames: RwLock<Vec<FrameHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a data handler; delivery order matches registration order
    pub fn add_data_handler(&self, handler: DataHandler) {
        self.data
            .write()
            .expect("data handler registry poisoned")
            .push(handler);
    }

    /// Append a frame handler; delivery order matches registration order
    pub fn add_frame_handler(&self, handler: FrameHandler) {
        self.frames
            .write()
            .expect("frame handler registry poisoned")
            .push(handler);
    }

    /// Number of registered data handlers
    pub fn data_handler_count(&self) -> usize {
        self.data
            .read()
            .expect("data handler registry poisoned")
            .len()
    }

    /// Invoke every data handler in order with the given message
    pub fn dispatch_data(&self, value: &serde_json::Value) {
        let handlers = self
            .data
            .read()
            .expect("data handler registry poisoned")
            .clone();
        for (index, handler) in handlers.iter().enumerate() {
            if let Err(err) = handler(value) {
                warn!("data handler {} failed: {:#}", index, err);
            }
        }
    }

    /// Invoke every frame handler in order with the given frame
    pub fn dispatch_frame(&self, frame: &MediaFrame) {
        let handlers = self
            .frames
            .read()
            .expect("frame handler registry poisoned")
            .clone();
        for (index, handler) in handlers.iter().enumerate() {
            if let Err(err) = handler(frame) {
                warn!("frame handler {} failed: {:#}", index, err);
            }
        }
    }
}
