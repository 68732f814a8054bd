use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Transport used by one endpoint.
///
/// Anything other than `"tcp"` or `"udp"` is kept as `Other` so the
/// endpoint can be skipped at dispatch time instead of failing the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Other(String),
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Other(s) => s,
        }
    }
}

impl From<&str> for Protocol {
    fn from(s: &str) -> Self {
        match s {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            other => Protocol::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Protocol::from(s.as_str()))
    }
}

impl Serialize for Protocol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One local or remote network target: (port, protocol, description).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    #[serde(deserialize_with = "port_string")]
    pub port: String,
    pub protocol: Protocol,
    #[serde(default)]
    pub description: String,
}

impl EndpointSpec {
    pub fn new(port: impl Into<String>, protocol: Protocol, description: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            protocol,
            description: description.into(),
        }
    }
}

/// Ports show up both as `"8080"` and `8080` in hand-written configs.
fn port_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(s) => s,
        Port::Number(n) => n.to_string(),
    })
}

/// The shared remote host combined with every remote endpoint's port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub endpoints: Vec<EndpointSpec>,
}

/// The `config.json` document.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessConfig {
    #[serde(default)]
    pub remote_host: String,
    #[serde(default)]
    pub remote_connection_details: Vec<EndpointSpec>,
    #[serde(default)]
    pub local_connection_details: Vec<EndpointSpec>,
}

impl ReadinessConfig {
    pub fn remote_target(&self) -> RemoteTarget {
        RemoteTarget {
            host: self.remote_host.clone(),
            endpoints: self.remote_connection_details.clone(),
        }
    }
}

/// Aggregate listener and traffic counters for one run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounters {
    pub tcp_listeners: u64,
    pub udp_listeners: u64,
    pub tcp_requests_received: u64,
    pub udp_requests_received: u64,
    pub tcp_responses_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let json = r#"{
            "remoteHost": "10.0.0.5",
            "remoteConnectionDetails": [
                {"port": "22", "protocol": "tcp", "description": "ssh"}
            ],
            "localConnectionDetails": [
                {"port": "514", "protocol": "udp", "description": "syslog"},
                {"port": 9001, "protocol": "tcp", "description": "agent"}
            ]
        }"#;
        let cfg: ReadinessConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.remote_host, "10.0.0.5");
        assert_eq!(cfg.remote_connection_details.len(), 1);
        assert_eq!(cfg.local_connection_details[0].protocol, Protocol::Udp);
        assert_eq!(cfg.local_connection_details[1].port, "9001");
    }

    #[test]
    fn unknown_protocol_is_kept() {
        let spec: EndpointSpec =
            serde_json::from_str(r#"{"port": "1", "protocol": "TCP", "description": ""}"#).unwrap();
        assert_eq!(spec.protocol, Protocol::Other("TCP".into()));
        assert_eq!(spec.protocol.to_string(), "TCP");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let cfg: ReadinessConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ReadinessConfig::default());
    }

    #[test]
    fn remote_target_pairs_host_with_endpoints() {
        let cfg = ReadinessConfig {
            remote_host: "db.internal".into(),
            remote_connection_details: vec![EndpointSpec::new("5432", Protocol::Tcp, "postgres")],
            local_connection_details: vec![],
        };
        let target = cfg.remote_target();
        assert_eq!(target.host, "db.internal");
        assert_eq!(target.endpoints[0].port, "5432");
    }
}
