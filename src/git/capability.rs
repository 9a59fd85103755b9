use std::fmt;

pub const CLIENT_AGENT: &str = "git/2.28.0";

/// The narrow set of capabilities `FetchTransport` advertises and
/// understands: only what a read-only `fetch` client speaks, not the full
/// push/pull surface a general-purpose git client would need.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GitCapability {
    MultiAckDetailed,
    NoDone,
    SideBand64k,
    ThinPack,
    OfsDelta,
    Agent(String),
    Other(String),
}

impl GitCapability {
    pub fn from_str(s: &str) -> Self {
        match s {
            "multi_ack_detailed" => Self::MultiAckDetailed,
            "no-done" => Self::NoDone,
            "side-band-64k" => Self::SideBand64k,
            "thin-pack" => Self::ThinPack,
            "ofs-delta" => Self::OfsDelta,
            _ => {
                if let Some(agent) = s.strip_prefix("agent=") {
                    Self::Agent(agent.to_string())
                } else {
                    Self::Other(s.to_string())
                }
            }
        }
    }
}

impl fmt::Display for GitCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiAckDetailed => write!(f, "multi_ack_detailed"),
            Self::NoDone => write!(f, "no-done"),
            Self::SideBand64k => write!(f, "side-band-64k"),
            Self::ThinPack => write!(f, "thin-pack"),
            Self::OfsDelta => write!(f, "ofs-delta"),
            Self::Agent(v) => write!(f, "agent={v}"),
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

/// The fixed capability set `FetchTransport` advertises on every request.
pub struct Capabilities;

impl Capabilities {
    pub fn default_set() -> Vec<GitCapability> {
        vec![
            GitCapability::MultiAckDetailed,
            GitCapability::NoDone,
            GitCapability::SideBand64k,
            GitCapability::ThinPack,
            GitCapability::OfsDelta,
            GitCapability::Agent(CLIENT_AGENT.to_string()),
        ]
    }

    pub fn as_lines() -> Vec<String> {
        Self::default_set().iter().map(|c| c.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_capabilities() {
        for s in ["multi_ack_detailed", "no-done", "side-band-64k", "thin-pack", "ofs-delta"] {
            assert_eq!(GitCapability::from_str(s).to_string(), s);
        }
    }

    #[test]
    fn parses_agent_capability() {
        let cap = GitCapability::from_str("agent=git/2.28.0");
        assert_eq!(cap, GitCapability::Agent("git/2.28.0".to_string()));
    }

    #[test]
    fn default_set_contains_agent_line() {
        let lines = Capabilities::as_lines();
        assert!(lines.contains(&format!("agent={CLIENT_AGENT}")));
    }
}
