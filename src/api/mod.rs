//! HTTP API handlers for the photorestore service

pub mod contact;
pub mod health;
pub mod photos;

pub use contact::contact_routes;
pub use health::health_routes;
pub use photos::photo_routes;
