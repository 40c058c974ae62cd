pub mod commands;
pub mod errors;
pub mod inventory;
pub mod loan;
pub mod policy;
pub mod value_objects;

pub use errors::*;
pub use inventory::*;
pub use loan::Loan;
pub use value_objects::*;
