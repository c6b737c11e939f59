pub mod config;
pub mod logging;
pub mod module;

pub use module::controller::CardController;
