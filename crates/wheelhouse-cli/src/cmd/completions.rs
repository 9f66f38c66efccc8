//! Completions command

use clap::CommandFactory;

/// Write completions for `shell` to stdout.
pub fn completions(shell: clap_complete::Shell) {
    let mut cmd = crate::Cli::command();
    clap_complete::generate(shell, &mut cmd, "wheelhouse", &mut std::io::stdout());
}
