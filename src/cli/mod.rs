pub mod args;
pub mod commands;
pub mod root;

pub use root::RootCommand;
