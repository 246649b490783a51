use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lima_config::{CreationSpec, LimaOptions, SshOptions};
use lima_core::error::{LimaError, Result};
use lima_core::testing::ScriptedRunner;
use lima_core::CommandOutput;
use lima_orchestrator::bootstrap::{COPY_SSH_TO_ROOT, ENABLE_ROOT_LOGIN, RESTART_SSHD};
use lima_orchestrator::{ConnectionMethod, Host, LimaHypervisor};
use lima_provider::{LimaController, LimaOps, SshInfo, VmStatus};
use serde_json::{json, Value};

/// Host that records what the hypervisor did to it.
struct RecordingHost {
    name: String,
    spec: CreationSpec,
    user: String,
    ip: Option<String>,
    port: Option<u16>,
    ssh: SshOptions,
    /// (user at exec time, command)
    execs: Vec<(String, String)>,
    closes: usize,
}

impl RecordingHost {
    fn new(name: &str, spec: CreationSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
            user: "root".to_string(),
            ip: None,
            port: None,
            ssh: SshOptions::default(),
            execs: Vec::new(),
            closes: 0,
        }
    }
}

impl Host for RecordingHost {
    fn name(&self) -> &str {
        &self.name
    }
    fn creation_spec(&self) -> &CreationSpec {
        &self.spec
    }
    fn user(&self) -> &str {
        &self.user
    }
    fn set_user(&mut self, user: &str) {
        self.user = user.to_string();
    }
    fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }
    fn set_ip(&mut self, ip: &str) {
        self.ip = Some(ip.to_string());
    }
    fn port(&self) -> Option<u16> {
        self.port
    }
    fn set_port(&mut self, port: u16) {
        self.port = Some(port);
    }
    fn ssh_options(&self) -> &SshOptions {
        &self.ssh
    }
    fn ssh_options_mut(&mut self) -> &mut SshOptions {
        &mut self.ssh
    }
    fn exec(&mut self, command: &str) -> Result<String> {
        self.execs.push((self.user.clone(), command.to_string()));
        Ok(String::new())
    }
    fn close(&mut self) {
        self.closes += 1;
    }
}

/// `LimaOps` stand-in with per-VM SSH descriptors and a call log.
#[derive(Default)]
struct FakeLima {
    calls: Mutex<Vec<String>>,
    ssh: Vec<(String, SshInfo)>,
    failing_start: Option<String>,
    failing_list: bool,
    stop_result: bool,
    delete_result: bool,
}

impl FakeLima {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

impl LimaOps for FakeLima {
    fn info(&self) -> Result<Value> {
        self.record("info".into());
        Ok(json!({"version": "1.2.3"}))
    }

    fn list(&self, names: &[String]) -> Result<Vec<Value>> {
        self.record(format!("list {}", names.join(",")));
        if self.failing_list {
            return Err(LimaError::Command("list broke".into()));
        }
        Ok(names
            .iter()
            .map(|n| json!({"name": n, "status": "Running"}))
            .collect())
    }

    fn status(&self, name: &str) -> Result<VmStatus> {
        self.record(format!("status {name}"));
        Ok(VmStatus::Running)
    }

    fn start(&self, name: &str, _spec: &CreationSpec) -> Result<bool> {
        self.record(format!("start {name}"));
        if self.failing_start.as_deref() == Some(name) {
            return Err(LimaError::ToolInvocation {
                command: format!("limactl start {name}"),
                code: Some(1),
                stderr: "boom".into(),
            });
        }
        Ok(true)
    }

    fn create(&self, name: &str, _spec: &CreationSpec) -> Result<bool> {
        self.record(format!("create {name}"));
        Ok(true)
    }

    fn stop(&self, name: &str) -> bool {
        self.record(format!("stop {name}"));
        self.stop_result
    }

    fn delete(&self, name: &str) -> bool {
        self.record(format!("delete {name}"));
        self.delete_result
    }

    fn ssh_info(&self, name: &str) -> Result<SshInfo> {
        self.record(format!("ssh_info {name}"));
        Ok(self
            .ssh
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, info)| info.clone())
            .unwrap_or_default())
    }
}

fn descriptor(port: u16) -> SshInfo {
    SshInfo {
        host_name: Some("127.0.0.1".into()),
        port,
        user: Some("test".into()),
        identity_files: vec![
            "/home/test/.lima/_config/user".into(),
            "/home/test/.ssh/id_rsa".into(),
        ],
        preferred_authentications: Some("publickey".into()),
        ..Default::default()
    }
}

fn hosts() -> Vec<RecordingHost> {
    vec![
        RecordingHost::new("vm1", CreationSpec::template("template://ubuntu-lts")),
        RecordingHost::new(
            "vm2",
            CreationSpec::InlineConfig(serde_yaml_ng::from_str("images: []").unwrap()),
        ),
    ]
}

fn fake_lima() -> FakeLima {
    FakeLima {
        ssh: vec![
            ("vm1".into(), descriptor(54321)),
            ("vm2".into(), descriptor(54322)),
        ],
        stop_result: true,
        delete_result: true,
        ..Default::default()
    }
}

fn forwarding() -> LimaOptions {
    LimaOptions {
        forward_ssh_agent: true,
        ..Default::default()
    }
}

#[test]
fn test_provision_starts_and_rewires_every_host() {
    let hypervisor = LimaHypervisor::with_lima(fake_lima(), forwarding());
    let mut hosts = hosts();

    hypervisor.provision(&mut hosts).unwrap();

    for (host, port) in hosts.iter().zip([54321u16, 54322]) {
        let lima = hypervisor.lima();
        assert_eq!(lima.count(&format!("start {}", host.name)), 1);
        assert_eq!(lima.count(&format!("list {}", host.name)), 1);
        assert_eq!(lima.count(&format!("ssh_info {}", host.name)), 1);

        assert_eq!(host.ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(host.port, Some(port));
        assert_eq!(host.user, "root");
        assert_eq!(host.ssh.user.as_deref(), Some("root"));
        assert_eq!(host.ssh.port, Some(port));
        assert_eq!(host.ssh.host_name.as_deref(), Some("127.0.0.1"));
        assert_eq!(host.ssh.keys.len(), 2);
        assert_eq!(host.ssh.forward_agent, Some(true));
        assert_eq!(host.ssh.use_agent, Some(true));
        assert_eq!(host.ssh.keys_only, Some(false));
        assert_eq!(host.ssh.auth_methods, Some(vec!["publickey".to_string()]));
        assert_eq!(host.closes, 1);
    }
}

#[test]
fn test_provision_bootstraps_root_as_vm_user() {
    let hypervisor = LimaHypervisor::with_lima(fake_lima(), LimaOptions::default());
    let mut hosts = hosts();

    hypervisor.provision(&mut hosts).unwrap();

    let expected: Vec<(String, String)> = [COPY_SSH_TO_ROOT, ENABLE_ROOT_LOGIN, RESTART_SSHD]
        .iter()
        .map(|cmd| ("test".to_string(), cmd.to_string()))
        .collect();
    assert_eq!(hosts[0].execs, expected);
    assert_eq!(hosts[1].execs, expected);
}

#[test]
fn test_keys_only_follows_descriptor_without_agent_forwarding() {
    let hypervisor = LimaHypervisor::with_lima(fake_lima(), LimaOptions::default());

    let unspecified = descriptor(22);
    assert_eq!(hypervisor.ssh_options_for(&unspecified).keys_only, Some(true));

    let disabled = SshInfo {
        identities_only: Some(false),
        ..descriptor(22)
    };
    let options = hypervisor.ssh_options_for(&disabled);
    assert_eq!(options.keys_only, Some(false));
    assert_eq!(options.forward_agent, Some(false));
    assert_eq!(options.use_agent, Some(false));
}

#[test]
fn test_agent_forwarding_overrides_identities_only() {
    let hypervisor = LimaHypervisor::with_lima(fake_lima(), forwarding());
    let pinned = SshInfo {
        identities_only: Some(true),
        ..descriptor(22)
    };
    assert_eq!(hypervisor.ssh_options_for(&pinned).keys_only, Some(false));
}

#[test]
fn test_existing_ssh_options_are_merged_not_replaced() {
    let lima = FakeLima {
        ssh: vec![(
            "vm1".into(),
            SshInfo {
                preferred_authentications: None,
                ..descriptor(54321)
            },
        )],
        ..fake_lima()
    };
    let hypervisor = LimaHypervisor::with_lima(lima, LimaOptions::default());
    let mut hosts = hosts();
    hosts.truncate(1);
    hosts[0].ssh.auth_methods = Some(vec!["password".into()]);
    hosts[0].ssh.keys = vec!["~/.ssh/id_ed25519".into()];

    hypervisor.provision(&mut hosts).unwrap();
    assert_eq!(hosts[0].ssh.auth_methods, Some(vec!["password".to_string()]));
    assert_eq!(hosts[0].ssh.keys[0], "/home/test/.lima/_config/user");
    assert_eq!(hosts[0].ssh.port, Some(54321));
}

#[test]
fn test_provision_aborts_on_first_start_failure() {
    let lima = FakeLima {
        failing_start: Some("vm1".into()),
        ..fake_lima()
    };
    let hypervisor = LimaHypervisor::with_lima(lima, LimaOptions::default());
    let mut hosts = hosts();

    let err = hypervisor.provision(&mut hosts).unwrap_err();
    assert!(matches!(err, LimaError::ToolInvocation { .. }));
    assert_eq!(hypervisor.lima().count("start vm2"), 0);
    assert!(hosts[0].ip.is_none());
    assert!(hosts[0].execs.is_empty());
}

#[test]
fn test_provision_fails_without_ssh_descriptor() {
    let lima = FakeLima {
        ssh: Vec::new(),
        ..fake_lima()
    };
    let hypervisor = LimaHypervisor::with_lima(lima, LimaOptions::default());
    let mut hosts = hosts();

    assert!(hypervisor.provision(&mut hosts).is_err());
    assert!(hosts[0].port.is_none());
}

#[test]
fn test_list_failure_does_not_stop_provisioning() {
    let lima = FakeLima {
        failing_list: true,
        ..fake_lima()
    };
    let hypervisor = LimaHypervisor::with_lima(lima, LimaOptions::default());
    let mut hosts = hosts();

    hypervisor.provision(&mut hosts).unwrap();
    assert_eq!(hosts[1].port, Some(54322));
}

#[test]
fn test_cleanup_stops_then_deletes_every_host() {
    let hypervisor = LimaHypervisor::with_lima(fake_lima(), LimaOptions::default());
    let hosts = hosts();

    hypervisor.cleanup(&hosts);

    assert_eq!(
        hypervisor.lima().calls(),
        vec!["stop vm1", "delete vm1", "stop vm2", "delete vm2"]
    );
}

#[test]
fn test_cleanup_ignores_unconfirmed_results() {
    let lima = FakeLima {
        stop_result: false,
        delete_result: false,
        ..fake_lima()
    };
    let hypervisor = LimaHypervisor::with_lima(lima, LimaOptions::default());

    hypervisor.cleanup(&hosts());
    assert_eq!(hypervisor.lima().calls().len(), 4);
}

#[test]
fn test_connection_preference_is_ip() {
    let hypervisor = LimaHypervisor::with_lima(fake_lima(), LimaOptions::default());
    let host = RecordingHost::new("vm1", CreationSpec::Unset);
    assert_eq!(
        hypervisor.connection_preference(&host),
        vec![ConnectionMethod::Ip]
    );
}

// End to end through the real controller, with limactl scripted.

const SHOW_SSH_OUTPUT: &str = "IdentityFile=\"/home/test/.lima/_config/user\"\nUser=test\nHostname=127.0.0.1\nPort=60022\n";

fn scripted_hypervisor() -> (LimaHypervisor<LimaController>, Arc<ScriptedRunner>) {
    let runner = Arc::new(ScriptedRunner::new());
    let options = LimaOptions::default();
    let lima = LimaController::with_runner(options.clone(), runner.clone());
    (LimaHypervisor::with_lima(lima, options), runner)
}

#[test]
fn test_end_to_end_template_host() {
    let (hypervisor, runner) = scripted_hypervisor();
    let status = ["limactl", "list", "--format", "{{ .Status }}", "ubuntu"];
    let create = [
        "limactl",
        "start",
        "--name=ubuntu",
        "--timeout=600s",
        "template://ubuntu-lts",
    ];
    let show_ssh = ["limactl", "show-ssh", "--format", "options", "ubuntu"];
    runner
        .once(&status, CommandOutput::ok(""))
        .on(&create, CommandOutput::ok(""))
        .on(
            &["limactl", "list", "--json", "ubuntu"],
            CommandOutput::ok("{\"name\":\"ubuntu\",\"status\":\"Running\"}\n"),
        )
        .on(&show_ssh, CommandOutput::ok(SHOW_SSH_OUTPUT));

    let mut hosts = vec![RecordingHost::new(
        "ubuntu",
        CreationSpec::template("template://ubuntu-lts"),
    )];
    hypervisor.provision(&mut hosts).unwrap();

    let calls = runner.calls();
    let create_at = calls.iter().position(|c| c == &create).unwrap();
    let show_at = calls.iter().position(|c| c == &show_ssh).unwrap();
    assert!(create_at < show_at);
    assert_eq!(runner.count(&["limactl", "start", "--timeout=600s", "ubuntu"]), 0);

    assert_eq!(hosts[0].port, Some(60022));
    assert_eq!(hosts[0].ip.as_deref(), Some("127.0.0.1"));
    assert_eq!(hosts[0].user, "root");
}

#[test]
fn test_end_to_end_inline_config_host() {
    let (hypervisor, runner) = scripted_hypervisor();
    let validated: Arc<Mutex<Option<PathBuf>>> = Arc::default();
    let started: Arc<Mutex<Option<PathBuf>>> = Arc::default();

    runner.on(
        &["limactl", "list", "--format", "{{ .Status }}", "custom"],
        CommandOutput::ok(""),
    );
    let seen = validated.clone();
    runner.on_prefix(&["limactl", "validate"], move |cmd| {
        let path = PathBuf::from(cmd.arguments().last().unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_yaml_ng::Value = serde_yaml_ng::from_str(&content).unwrap();
        assert_eq!(
            parsed.get("images"),
            Some(&serde_yaml_ng::Value::Sequence(vec![]))
        );
        *seen.lock().unwrap() = Some(path);
        Ok(CommandOutput::ok(""))
    });
    let seen = started.clone();
    runner.on_prefix(&["limactl", "start", "--name=custom"], move |cmd| {
        *seen.lock().unwrap() = Some(PathBuf::from(cmd.arguments().last().unwrap()));
        Ok(CommandOutput::ok(""))
    });
    runner
        .on(&["limactl", "list", "--json", "custom"], CommandOutput::ok(""))
        .on(
            &["limactl", "show-ssh", "--format", "options", "custom"],
            CommandOutput::ok(SHOW_SSH_OUTPUT),
        );

    let mut hosts = vec![RecordingHost::new(
        "custom",
        CreationSpec::InlineConfig(serde_yaml_ng::from_str("images: []").unwrap()),
    )];
    hypervisor.provision(&mut hosts).unwrap();

    let validated = validated.lock().unwrap().clone().unwrap();
    let started = started.lock().unwrap().clone().unwrap();
    assert_eq!(validated, started);
    assert!(!started.exists());
    assert_eq!(hosts[0].port, Some(60022));
}

#[test]
fn test_end_to_end_cleanup_of_absent_vm() {
    let (hypervisor, runner) = scripted_hypervisor();
    runner
        .on(&["limactl", "stop", "gone"], CommandOutput::failed(1, "not found"))
        .on(&["limactl", "delete", "gone"], CommandOutput::failed(1, "not found"))
        .on(
            &["limactl", "list", "--format", "{{ .Status }}", "gone"],
            CommandOutput::ok(""),
        );

    hypervisor.cleanup(&[RecordingHost::new("gone", CreationSpec::Unset)]);

    assert_eq!(runner.count(&["limactl", "stop", "gone"]), 1);
    assert_eq!(runner.count(&["limactl", "delete", "gone"]), 1);
}
