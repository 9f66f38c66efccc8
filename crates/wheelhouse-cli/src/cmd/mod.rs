//! Command implementations, one module per subcommand.

pub mod completions;
pub mod fetch;
pub mod info;
