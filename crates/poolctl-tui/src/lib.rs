pub mod app;
pub mod bootstrap;
pub mod cli;
pub mod components;
pub mod console;
pub mod error;
pub mod state;
pub mod token_store;
pub mod view;

pub use app::{App, Mode, Section};
pub use bootstrap::{BootstrapReport, BootstrapStep, StepOutcome};
pub use console::Console;
pub use error::ConsoleError;
