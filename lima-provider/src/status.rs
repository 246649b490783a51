use std::fmt;

/// State of a Lima VM as printed by `limactl list --format '{{ .Status }}'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmStatus {
    /// limactl printed nothing: no VM with that name
    Absent,
    Running,
    Stopped,
    /// Any other token (`Broken`, `Starting`, ...), kept verbatim
    Other(String),
}

impl VmStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" => VmStatus::Absent,
            "Running" => VmStatus::Running,
            "Stopped" => VmStatus::Stopped,
            other => VmStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VmStatus::Absent => "",
            VmStatus::Running => "Running",
            VmStatus::Stopped => "Stopped",
            VmStatus::Other(s) => s,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, VmStatus::Absent)
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmStatus::Absent => write!(f, "absent"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
