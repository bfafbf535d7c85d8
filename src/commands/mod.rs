//! Form submissions and entity bindings, one file per table.

pub mod branches;
pub mod clients;
pub mod leads;
pub mod products;
pub mod sales;
pub mod users;
