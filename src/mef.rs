//! Client for the MeF A2A transmitter services.
//!
//! [`MefClient`] drives login, submission, acknowledgment retrieval and
//! logout over a pluggable [`Transport`].

mod ack;
mod client;
mod error;
pub mod messages;
mod retry;
mod session;
mod transport;

pub use ack::{AckStatus, Acknowledgment, AcknowledgmentError, PollOptions, Submission, SubmissionResult};
pub use client::{ClientSettings, ClientState, MefClient, SubmissionPayload};
pub use error::{MefError, MefErrorCategory};
pub use retry::{Backoff, RetryPolicy};
pub use session::{Credentials, Session};
pub use transport::{HttpTransport, Transport, TransportError, TransportResult};
