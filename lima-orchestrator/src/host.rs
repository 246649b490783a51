use lima_config::{CreationSpec, SshOptions};
use lima_core::error::Result;

/// How the framework should address a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMethod {
    Ip,
}

/// A target host as seen by the hypervisor.
///
/// The test framework owns the host; provisioning rewrites its address, port,
/// login user and SSH options in place.
pub trait Host {
    /// VM name, unique within limactl's namespace
    fn name(&self) -> &str;

    fn creation_spec(&self) -> &CreationSpec;

    /// Login user the next connection will use
    fn user(&self) -> &str;
    fn set_user(&mut self, user: &str);

    fn ip(&self) -> Option<&str>;
    fn set_ip(&mut self, ip: &str);

    fn port(&self) -> Option<u16>;
    fn set_port(&mut self, port: u16);

    fn ssh_options(&self) -> &SshOptions;
    fn ssh_options_mut(&mut self) -> &mut SshOptions;

    /// Run a shell command on the host as [`Host::user`], returning stdout.
    fn exec(&mut self, command: &str) -> Result<String>;

    /// Drop the live connection; the next `exec` reconnects with current settings.
    fn close(&mut self);
}
