//! Filesystem-backed reference host for gitup.
//!
//! Wires the update resolver and install relocator to a header-scanning
//! component registry, a JSON activation store, and the `gitup` CLI.

pub mod activation;
pub mod cli;
pub mod commands;
pub mod hooks;
pub mod registry;

pub use activation::{JsonActivationStore, ACTIVATION_STORE_FILE_NAME};
pub use cli::{Cli, CliCheckScope, CliCommand, CliComponentKind, CliTagPolicy};
pub use commands::{
    build_install_hooks, build_update_hooks, execute_check_command, execute_cli_command,
    execute_headers_command, execute_relocate_command,
};
pub use hooks::{before_update_check, InstallHooks, UpdateHooks};
pub use registry::{parse_header_block, FilesystemRegistry};
