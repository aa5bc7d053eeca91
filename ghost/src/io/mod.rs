//! Side-effecting collaborators: processes, the completion service, the terminal and files.

pub mod completion;
pub mod config;
pub mod confirm;
pub mod editor;
pub mod process;
pub mod prompt;
pub mod shell;
pub mod system;
