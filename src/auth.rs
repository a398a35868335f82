//! Identifiers, token secrets, and Application Default Credentials.

pub mod adc;
pub mod id;
pub mod secret;
pub mod source;

pub use adc::*;
pub use id::*;
pub use secret::*;
pub use source::*;
