//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Commands handled        |
//! |-----------|-------------------------|
//! | `deploy`  | `Deploy`                |
//! | `targets` | `Targets`               |
//! | `config`  | `Config`                |

pub mod config;
pub mod deploy;
pub mod targets;

pub use config::cmd_config;
pub use deploy::cmd_deploy;
pub use targets::cmd_targets;
