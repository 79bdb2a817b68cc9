//! Adapter implementations of the merge ports.

mod git_cli;
pub mod memory;

pub use git_cli::GitCli;
pub use shell_tests::ShellTestRunner;
