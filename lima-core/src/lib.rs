pub mod command;
pub mod error;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use command::{is_tool_installed, CommandOutput, CommandRunner, DuctRunner, ToolCommand};
pub use error::{LimaError, Result};
