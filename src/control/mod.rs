pub mod command;
pub mod listener;

pub use command::ControlCommand;
pub use listener::CommandListener;
