pub mod admin;
pub mod export;
pub mod health;
pub mod public;
pub mod sse;
pub mod validation;
pub mod ws;
