pub mod executor;
pub mod report;
pub mod runner;

pub use executor::JsonlRendererPlugin;
pub use runner::{CommandStepRunner, FnStepRunner};
