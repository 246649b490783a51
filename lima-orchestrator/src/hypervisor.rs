use lima_config::{LimaOptions, SshOptions};
use lima_core::error::{LimaError, Result};
use lima_provider::{LimaController, LimaOps, SshInfo};
use tracing::{debug, info, info_span, warn};

use crate::bootstrap::{copy_ssh_to_root, enable_root_login};
use crate::host::{ConnectionMethod, Host};

/// Address every Lima VM is reached on; limactl forwards the guest's sshd to it.
pub const LOOPBACK: &str = "127.0.0.1";

/// Hypervisor entry points for hosts backed by Lima VMs.
pub struct LimaHypervisor<L = LimaController> {
    lima: L,
    options: LimaOptions,
}

impl LimaHypervisor<LimaController> {
    pub fn new(options: LimaOptions) -> Result<Self> {
        let lima = LimaController::new(options.clone())?;
        Ok(Self::with_lima(lima, options))
    }
}

impl<L: LimaOps> LimaHypervisor<L> {
    pub fn with_lima(lima: L, options: LimaOptions) -> Self {
        Self { lima, options }
    }

    pub fn lima(&self) -> &L {
        &self.lima
    }

    /// Start (or create) every host's VM and point the host at it.
    ///
    /// Stops at the first host that fails; hosts already provisioned stay as they are.
    pub fn provision<H: Host>(&self, hosts: &mut [H]) -> Result<()> {
        info!("Provisioning Lima");
        for host in hosts.iter_mut() {
            let span = info_span!("provision", host = host.name());
            let _enter = span.enter();

            info!("provisioning {}", host.name());
            self.lima.start(host.name(), host.creation_spec())?;

            match self.lima.list(&[host.name().to_string()]) {
                Ok(vms) => info!("vm_opts: {:?}", vms.first()),
                Err(e) => debug!("could not list {}: {}", host.name(), e),
            }

            self.setup_ssh(host)?;
            debug!(
                "node available at {}:{}",
                host.ip().unwrap_or_default(),
                host.port().unwrap_or_default()
            );
        }
        Ok(())
    }

    /// Stop and delete every host's VM. Never fails; outcomes are logged.
    pub fn cleanup<H: Host>(&self, hosts: &[H]) {
        info!("Cleaning up Lima");
        for host in hosts {
            debug!("stopping {}", host.name());
            if !self.lima.stop(host.name()) {
                debug!("{} was not confirmed stopped", host.name());
            }
            if self.lima.delete(host.name()) {
                info!("deleted {}", host.name());
            } else {
                warn!("{} was not confirmed deleted", host.name());
            }
        }
    }

    pub fn connection_preference<H: Host>(&self, _host: &H) -> Vec<ConnectionMethod> {
        vec![ConnectionMethod::Ip]
    }

    /// Translate limactl's SSH descriptor into the framework's SSH client options.
    pub fn ssh_options_for(&self, info: &SshInfo) -> SshOptions {
        let forward_agent = self.options.forward_ssh_agent;
        let keys_only = if forward_agent {
            false
        } else {
            info.identities_only.unwrap_or(true)
        };

        SshOptions {
            forward_agent: Some(forward_agent),
            host_name: Some(info.host_name.clone().unwrap_or_else(|| LOOPBACK.to_string())),
            keys: info.identity_files.clone(),
            keys_only: Some(keys_only),
            port: Some(info.port),
            use_agent: Some(forward_agent),
            user: info.user.clone(),
            auth_methods: info.preferred_authentications.as_ref().map(|methods| {
                methods
                    .split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect()
            }),
        }
    }

    fn setup_ssh<H: Host>(&self, host: &mut H) -> Result<()> {
        debug!("configure lima VMs (set ssh-config, switch to root user)");

        let default_user = host.user().to_string();

        let info = self.lima.ssh_info(host.name())?;
        if info.is_empty() || info.port == 0 {
            return Err(LimaError::Command(format!(
                "limactl reported no SSH endpoint for '{}'",
                host.name()
            )));
        }
        let ssh_config = self.ssh_options_for(&info);
        let vm_user = ssh_config.user.clone().ok_or_else(|| {
            LimaError::Command(format!("limactl reported no SSH user for '{}'", host.name()))
        })?;

        host.set_ip(LOOPBACK);
        host.set_port(info.port);
        host.ssh_options_mut().merge(ssh_config);
        host.set_user(&vm_user);

        copy_ssh_to_root(host)?;
        enable_root_login(host)?;
        // Shut the VM-user session down; the next exec reconnects as the restored user.
        host.close();

        host.set_user(&default_user);
        host.ssh_options_mut().user = Some(default_user);
        debug!("ssh options for {}: {:?}", host.name(), host.ssh_options());
        Ok(())
    }
}
