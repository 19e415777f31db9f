pub mod cli_args;
pub mod command;
pub mod formatter;
pub mod session;

pub use cli_args::CliArgs;
pub use command::{Command, CommandError};
pub use formatter::OutputFormatter;
pub use session::{Reply, Session, SessionError};
