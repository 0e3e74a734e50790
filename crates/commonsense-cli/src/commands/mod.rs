//! Command implementations for commonsense-cli

pub mod data;
pub mod metatags;
pub mod sensors;
pub mod smoke;
pub mod upload;

pub use data::data;
pub use metatags::metatags;
pub use sensors::{create, delete, sensors};
pub use smoke::smoke;
pub use upload::upload;
