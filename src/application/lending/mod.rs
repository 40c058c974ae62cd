mod coordinator;
mod errors;
mod inventory;
mod queries;

pub use coordinator::{ServiceDependencies, borrow_copy, return_loan};
pub use errors::{LendingError, Resource, Result};
pub use inventory::{CopyRemoval, RegisteredBook, add_copies, register_book, remove_copy};
pub use queries::{borrower_loans, view_loan};
