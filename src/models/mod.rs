//! Data models for the photorestore service

pub mod contact;
pub mod photo;

pub use contact::{Contact, NewContact};
pub use photo::{NewPhoto, Photo, PhotoStatus, PhotoUpdate};
