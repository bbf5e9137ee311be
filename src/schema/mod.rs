pub mod types;
pub mod mapper;
pub mod validator;
pub mod resolved;
pub mod loader;

pub use types::*;
pub use mapper::*;
pub use validator::*;
pub use resolved::*;
pub use loader::*;
