//! Session state and the flows that change it.

pub mod controller;
pub mod error;
pub mod session;

pub use controller::{LoginOutcome, SessionController};
pub use error::AuthError;
pub use session::{Session, SessionHandle};
