pub mod did;
pub mod envelope;
pub mod error;
pub mod peer;
pub mod web;

pub use envelope::{pack, unpack, Envelope};
pub use error::{EnvelopeError, Result};
