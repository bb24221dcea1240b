pub mod auth;
pub mod event;
pub mod message;
pub mod user;
