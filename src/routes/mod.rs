pub mod auth;
pub mod error;
pub mod health;
pub mod protected;
pub mod records;
pub mod user;
