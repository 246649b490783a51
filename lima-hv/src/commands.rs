use anyhow::{Context, Result};
use lima_config::{HostsFile, LimaOptions};
use lima_core::command::is_tool_installed;
use lima_core::error::LimaError;
use lima_orchestrator::{LimaHypervisor, SshHost};
use lima_provider::{LimaController, LimaOps};
use tracing::debug;

use crate::cli::{Args, Command};

pub fn execute_command(args: Args) -> Result<()> {
    match &args.command {
        Command::Provision => provision(&args),
        Command::Cleanup => cleanup(&args),
        Command::Status { name } => {
            let lima = controller(&args)?;
            println!("{}", lima.status_raw(name)?);
            Ok(())
        }
        Command::List { names } => {
            let lima = controller(&args)?;
            for vm in lima.list(names)? {
                println!("{}", serde_json::to_string(&vm)?);
            }
            Ok(())
        }
        Command::Info => {
            let lima = controller(&args)?;
            println!("{}", serde_json::to_string_pretty(&lima.info()?)?);
            Ok(())
        }
        Command::SshInfo { name } => {
            let lima = controller(&args)?;
            println!("{}", serde_json::to_string_pretty(&lima.ssh_info(name)?)?);
            Ok(())
        }
    }
}

fn load_hosts(args: &Args) -> Result<HostsFile> {
    let mut file = HostsFile::load(&args.hosts)?;
    file.options = args.apply_overrides(file.options);
    Ok(file)
}

/// Options for single-VM commands: the hosts file is optional there.
fn options(args: &Args) -> Result<LimaOptions> {
    if args.hosts.exists() {
        Ok(load_hosts(args)?.options)
    } else {
        debug!("{} not found, using default options", args.hosts.display());
        Ok(args.apply_overrides(LimaOptions::default()))
    }
}

fn controller(args: &Args) -> Result<LimaController> {
    Ok(LimaController::new(options(args)?)?)
}

fn provision(args: &Args) -> Result<()> {
    let file = load_hosts(args)?;
    if !is_tool_installed("ssh") {
        return Err(LimaError::Dependency("ssh".into()).into());
    }

    let hypervisor = LimaHypervisor::new(file.options.clone())?;
    let mut hosts = file
        .hosts
        .into_iter()
        .map(SshHost::new)
        .collect::<Result<Vec<_>, _>>()?;

    hypervisor
        .provision(&mut hosts)
        .context("Provisioning failed")?;

    let provisioned = HostsFile {
        options: file.options,
        hosts: hosts.into_iter().map(SshHost::into_config).collect(),
    };
    print!("{}", provisioned.to_yaml()?);
    Ok(())
}

fn cleanup(args: &Args) -> Result<()> {
    let file = load_hosts(args)?;
    let hypervisor = LimaHypervisor::new(file.options.clone())?;
    let hosts = file
        .hosts
        .into_iter()
        .map(SshHost::new)
        .collect::<Result<Vec<_>, _>>()?;

    hypervisor.cleanup(&hosts);
    Ok(())
}
