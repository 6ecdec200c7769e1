pub mod boundaries;
pub mod catalog;
pub mod gateways;
pub mod interactors;
pub mod models;
pub mod policies;
pub(crate) mod utils;
