pub mod lending_read_model;
pub mod lending_store;

pub use lending_read_model::{CopyView, LendingReadModel, LoanStatus, LoanView};
pub use lending_store::{BoxError, LendingStore, LendingTransaction, StoreError};
