//! Configuration for lima-hv: run-wide options, per-host records and creation specs.

pub mod hosts;
pub mod options;
pub mod spec;


pub use hosts::{HostConfig, HostsFile, SshOptions, DEFAULT_HOST_USER};
pub use options::{LimaOptions, DEFAULT_LIMACTL, DEFAULT_TIMEOUT_SECS};
pub use spec::{normalized_yaml, stringify_keys, CreationSpec};
