//! Lima VM lifecycle library.
//!
//! [`LimaController`] drives `limactl` through an idempotent create/start/stop/delete
//! cycle and turns its SSH options dump into an [`SshInfo`] descriptor. Consumers that
//! only need the lifecycle contract should depend on the [`LimaOps`] trait.

// External crates
use lima_config::CreationSpec;
use lima_core::error::Result;
use serde_json::Value;

pub mod controller;
pub mod ssh_info;
pub mod status;

pub use controller::LimaController;
pub use lima_core::error::LimaError;
pub use ssh_info::SshInfo;
pub use status::VmStatus;

/// Lifecycle operations on Lima VMs.
///
/// `start`, `create` and the query operations fail hard. `stop` and `delete` only
/// report whether the VM reached the expected state afterwards.
pub trait LimaOps {
    /// `limactl info`, decoded.
    fn info(&self) -> Result<Value>;

    /// One record per VM; all VMs when `names` is empty.
    fn list(&self, names: &[String]) -> Result<Vec<Value>>;

    fn status(&self, name: &str) -> Result<VmStatus>;

    /// Ensure the VM runs, creating it from `spec` when it does not exist.
    fn start(&self, name: &str, spec: &CreationSpec) -> Result<bool>;

    fn create(&self, name: &str, spec: &CreationSpec) -> Result<bool>;

    /// True when the VM is stopped afterwards, whatever limactl reported.
    fn stop(&self, name: &str) -> bool;

    /// True when the VM is gone afterwards, whatever limactl reported.
    fn delete(&self, name: &str) -> bool;

    /// SSH descriptor of the VM; empty when limactl printed nothing.
    fn ssh_info(&self, name: &str) -> Result<SshInfo>;
}
