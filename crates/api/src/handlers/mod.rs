pub mod auth;
pub mod batch;
pub mod gallery;
pub mod media;
pub mod variations;
