//! Tool Dispatcher for tutorflow.
//!
//! Sends normalized requests to the educational tool services and turns
//! every outcome into either content or a structured `DispatchError`.

pub mod dispatcher;
pub mod transport;

pub use dispatcher::{HttpToolDispatcher, MAX_ATTEMPTS, interpret_body};
pub use transport::{ReqwestTransport, ToolTransport, TransportError, TransportResponse};
