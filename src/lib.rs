pub mod cart;
pub mod checkout;
pub mod client;
pub mod config;
pub mod http;
pub mod messaging;
pub mod notify;
pub mod session;
pub mod store;
pub mod types;
pub mod wishlist;

pub mod test_utils;

pub use client::Client;
pub use config::ClientConfig;
