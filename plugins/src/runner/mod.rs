mod command;
mod func;

pub use command::CommandStepRunner;
pub use func::FnStepRunner;
