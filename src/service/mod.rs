pub mod auth;
pub mod cache;
pub mod oauth;
pub mod session;
pub mod token;
pub mod user;
