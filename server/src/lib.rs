pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
pub mod validity;

#[cfg(test)]
pub(crate) mod test_support;
