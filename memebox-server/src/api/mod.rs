//! HTTP API handlers for memebox-server

pub mod health;
pub mod memes;

pub use health::health_routes;
pub use memes::meme_routes;
