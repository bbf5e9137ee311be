//! Request extractors.

pub mod caller;
pub use caller::{Caller, Claims};
