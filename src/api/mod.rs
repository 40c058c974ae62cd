pub mod error;
pub mod handlers;
pub mod requester;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use requester::{BORROWER_ID_HEADER, Requester};
pub use router::create_router;
pub use types::*;
