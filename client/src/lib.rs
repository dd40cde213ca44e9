//! Client side of the streaming chat protocol: decode the event stream,
//! pace its text into the transcript, and run one request at a time per
//! session.

pub mod config;
pub mod controller;
pub mod decoder;
pub mod errors;
pub mod models;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use controller::{ControllerState, SessionController, SessionUpdate, TurnOutcome};
pub use errors::{ClientError, DecodeError};
pub use session::{ConversationSession, Role, Turn};
pub use transport::{ChatTransport, HttpTransport, TransportResponse};
