//! Session lifecycle: state machine, retry policy, handler fan-out,
//! and the negotiation controller.

pub mod controller;
pub mod handlers;
pub mod retry;
pub mod state;

pub use controller::{PendingSend, SessionController};
pub use handlers::{DataHandler, FrameHandler, HandlerRegistry};
pub use retry::RetryPolicy;
pub use state::{ConnectionState, PeerSelector};
