//! Commands that let a host be reached as root once the VM's own user is logged in.

use lima_core::error::Result;
use tracing::debug;

use crate::host::Host;

/// Copy the login user's `~/.ssh` (authorized keys included) into root's home.
pub const COPY_SSH_TO_ROOT: &str =
    r#"sudo su -c "cp -r .ssh /root/. && chown -R root:root /root/.ssh""#;

/// Allow key-based root logins in sshd.
pub const ENABLE_ROOT_LOGIN: &str = r#"sudo su -c "sed -ri 's/^#?PermitRootLogin .*/PermitRootLogin yes/' /etc/ssh/sshd_config && (grep -q '^PermitRootLogin yes' /etc/ssh/sshd_config || echo 'PermitRootLogin yes' >> /etc/ssh/sshd_config)""#;

/// Reload sshd on both systemd and sysvinit guests, whatever the unit is called.
pub const RESTART_SSHD: &str = r#"sudo su -c "systemctl restart sshd 2>/dev/null || systemctl restart ssh 2>/dev/null || service ssh restart 2>/dev/null || service sshd restart""#;

pub fn copy_ssh_to_root<H: Host>(host: &mut H) -> Result<()> {
    debug!("copying {}'s ssh keys to root on {}", host.user(), host.name());
    host.exec(COPY_SSH_TO_ROOT)?;
    Ok(())
}

pub fn enable_root_login<H: Host>(host: &mut H) -> Result<()> {
    debug!("enabling root login on {}", host.name());
    host.exec(ENABLE_ROOT_LOGIN)?;
    host.exec(RESTART_SSHD)?;
    Ok(())
}
