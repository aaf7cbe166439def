pub mod api;
pub mod audit;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod pid;
pub mod protocol;
pub mod recipe;
pub mod system;
pub mod types;

pub use controller::*;
pub use types::*;
