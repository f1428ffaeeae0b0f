pub mod audit;
pub mod cleanup_sweeper;
pub mod data_stores;
pub mod rate_limiter;
pub mod rotation_manager;
pub mod session_authority;
pub mod token_issuer;
pub mod token_validator;

pub use audit::*;
pub use cleanup_sweeper::*;
pub use rate_limiter::*;
pub use rotation_manager::*;
pub use session_authority::*;
pub use token_issuer::*;
pub use token_validator::*;
