// file: src/api/server.rs
// version: 1.0.0
// guid: d4f7a0b3-6c9e-4258-b1d4-e7f0a3b6c9d2

//! Server records and provider-side server resolution

use super::client::RobotClient;
use crate::Result;
use serde::Deserialize;
use tracing::info;

/// Provider response envelope for a server lookup
#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ServerRecord,
}

/// Raw server record as reported by the provider; required fields are
/// validated at deserialization time.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerRecord {
    pub server_number: u32,
    pub server_ip: String,
    pub server_ipv6_net: String,
    pub server_name: String,
    pub status: String,
    pub dc: String,
}

/// Provider response envelope for an IP lookup
#[derive(Debug, Deserialize)]
struct IpEnvelope {
    ip: IpRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpRecord {
    pub server_number: u32,
    #[serde(default)]
    pub gateway: Option<String>,
}

/// Identity and network facts for one physical machine.
///
/// Provider-only fields are unset when the server was constructed directly
/// from a bare IP; provider-mutating operations are disallowed on such
/// servers. The in-memory value is scoped to one provisioning run.
#[derive(Debug, Clone)]
pub struct Server {
    pub number: Option<u32>,
    pub ip: String,
    pub ipv6_net: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub dc: Option<String>,
}

impl Server {
    /// Construct from a provider lookup response
    pub fn from_record(record: ServerRecord) -> Self {
        Self {
            number: Some(record.server_number),
            ip: record.server_ip,
            ipv6_net: Some(record.server_ipv6_net),
            name: Some(record.server_name),
            status: Some(record.status),
            dc: Some(record.dc),
        }
    }

    /// Construct directly from a bare IP (direct mode, no provider)
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            number: None,
            ip: ip.into(),
            ipv6_net: None,
            name: None,
            status: None,
            dc: None,
        }
    }

    /// True when this server has no provider identity
    pub fn is_direct(&self) -> bool {
        self.number.is_none()
    }

    fn number_or_err(&self) -> Result<u32> {
        self.number.ok_or_else(|| {
            crate::error::ProvisionError::validation("operation requires a provider-managed server")
        })
    }
}

/// Resolves server identity and network attributes from the provider
pub struct ServerDirectory<'a> {
    client: &'a RobotClient,
}

impl<'a> ServerDirectory<'a> {
    pub fn new(client: &'a RobotClient) -> Self {
        Self { client }
    }

    /// Resolve a server by its provider-assigned number
    pub async fn by_number(&self, number: u32) -> Result<Server> {
        let value = self.client.get(&format!("/server/{}", number)).await?;
        let envelope: ServerEnvelope = serde_json::from_value(value)?;
        Ok(Server::from_record(envelope.server))
    }

    /// Resolve a server by IP: fetch the IP-to-server mapping, then resolve
    /// by number.
    pub async fn by_ip(&self, ip: &str) -> Result<Server> {
        let record = self.ip_record(ip).await?;
        self.by_number(record.server_number).await
    }

    /// Fetch the IP record; the gateway is needed for installer config
    /// rendering.
    pub async fn ip_record(&self, ip: &str) -> Result<IpRecord> {
        let value = self.client.get(&format!("/ip/{}", ip)).await?;
        let envelope: IpEnvelope = serde_json::from_value(value)?;
        Ok(envelope.ip)
    }

    /// Re-fetch the server record and update the value in place
    pub async fn refresh(&self, server: &mut Server) -> Result<()> {
        let number = server.number_or_err()?;
        *server = self.by_number(number).await?;
        Ok(())
    }

    /// Write a new name, then refresh from a fresh fetch. The POST response
    /// is not trusted for final state.
    pub async fn rename(&self, server: &mut Server, name: &str) -> Result<()> {
        let number = server.number_or_err()?;
        info!("Writing hostname {} to the provider", name);
        let form = vec![("server_name".to_string(), name.to_string())];
        self.client.post(&format!("/server/{}", number), &form).await?;
        self.refresh(server).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json() -> serde_json::Value {
        serde_json::json!({
            "server": {
                "server_number": 321,
                "server_ip": "203.0.113.5",
                "server_ipv6_net": "2001:db8:0:1::",
                "server_name": "metal-1",
                "status": "ready",
                "dc": "FSN1-DC8"
            }
        })
    }

    #[test]
    fn test_server_from_record() {
        let envelope: ServerEnvelope = serde_json::from_value(record_json()).unwrap();
        let server = Server::from_record(envelope.server);
        assert_eq!(server.number, Some(321));
        assert_eq!(server.ip, "203.0.113.5");
        assert_eq!(server.ipv6_net.as_deref(), Some("2001:db8:0:1::"));
        assert!(!server.is_direct());
    }

    #[test]
    fn test_missing_required_field_is_parse_error() {
        let mut value = record_json();
        value["server"].as_object_mut().unwrap().remove("server_ip");
        let result: std::result::Result<ServerEnvelope, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn test_direct_server_has_no_provider_fields() {
        let server = Server::from_ip("203.0.113.5");
        assert!(server.is_direct());
        assert!(server.number.is_none());
        assert!(server.ipv6_net.is_none());
        assert!(server.name.is_none());
    }

    #[test]
    fn test_direct_server_rejects_provider_operations() {
        let server = Server::from_ip("203.0.113.5");
        assert!(server.number_or_err().is_err());
    }

    #[test]
    fn test_ip_record_parses_gateway() {
        let value = serde_json::json!({
            "ip": { "server_number": 321, "gateway": "203.0.113.1" }
        });
        let envelope: IpEnvelope = serde_json::from_value(value).unwrap();
        assert_eq!(envelope.ip.gateway.as_deref(), Some("203.0.113.1"));
    }
}
