#[cfg(feature = "cli")]
pub mod cli;
pub mod descriptor;
pub mod job;
pub mod secrets;
pub mod settings;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
