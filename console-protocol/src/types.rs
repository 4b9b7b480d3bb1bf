use serde::{Deserialize, Serialize};

/// Character-grid size of a terminal.
///
/// Field order is the wire order: `{"cols":80,"rows":24}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Geometry {
    pub const fn new(rows: u16, cols: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// A server that can host an application console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCandidate {
    pub display_name: String,
    pub server_id: String,
}

impl ServerCandidate {
    pub fn new(display_name: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            server_id: server_id.into(),
        }
    }
}

/// One-time credential for a single WebSocket attach.
///
/// Deliberately not `Clone`: connecting takes it by value.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionCredential {
    pub request_id: String,
    pub token: String,
}

/// Description of what a credential will attach to, as returned by the
/// broker next to the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetInfo {
    Server(HostInfo),
    Application {
        application: String,
        server: HostInfo,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub hostname: String,
}

impl TargetInfo {
    /// Short label used for the terminal title.
    pub fn label(&self) -> String {
        match self {
            TargetInfo::Server(host) => host.hostname.clone(),
            TargetInfo::Application {
                application,
                server,
            } => format!("{application} @ {}", server.hostname),
        }
    }
}
