pub mod auth;
pub mod clock;
pub mod image_source;
pub mod image_tools;
pub mod log;
pub mod recognition;
pub mod similarity;
pub mod tasks;
