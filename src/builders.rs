//! Builders for ergonomic construction of larger protocol types.

use std::collections::HashMap;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCapabilities, AgentCard, AgentCardSignature, AgentInterface, AgentProvider, AgentSkill,
    SecurityRequirement, SecurityScheme,
};
use crate::utils::constants::TRANSPORT_JSONRPC;

/// Builder for [`AgentCard`].
///
/// # Example
///
/// ```
/// use a2a_sdk::builders::AgentCardBuilder;
///
/// let card = AgentCardBuilder::new("Echo Agent", "Echoes messages back", "1.0.0")
///     .url("http://localhost:7420")
///     .streaming(true)
///     .skill("echo", "Echo", "Repeats the input", vec!["demo".to_string()])
///     .build()
///     .unwrap();
/// assert_eq!(card.preferred_transport.as_deref(), Some("JSONRPC"));
/// ```
#[derive(Debug, Clone)]
pub struct AgentCardBuilder {
    name: String,
    description: String,
    version: String,
    url: Option<String>,
    preferred_transport: String,
    additional_interfaces: Vec<AgentInterface>,
    provider: Option<AgentProvider>,
    documentation_url: Option<String>,
    icon_url: Option<String>,
    capabilities: AgentCapabilities,
    security_schemes: HashMap<String, SecurityScheme>,
    security: Vec<SecurityRequirement>,
    default_input_modes: Vec<String>,
    default_output_modes: Vec<String>,
    skills: Vec<AgentSkill>,
    supports_authenticated_extended_card: Option<bool>,
    signatures: Option<Vec<AgentCardSignature>>,
}

impl AgentCardBuilder {
    /// Builder seeded with the required descriptive fields.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        AgentCardBuilder {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            url: None,
            preferred_transport: TRANSPORT_JSONRPC.to_string(),
            additional_interfaces: Vec::new(),
            provider: None,
            documentation_url: None,
            icon_url: None,
            capabilities: AgentCapabilities::default(),
            security_schemes: HashMap::new(),
            security: Vec::new(),
            default_input_modes: vec!["text/plain".to_string()],
            default_output_modes: vec!["text/plain".to_string()],
            skills: Vec::new(),
            supports_authenticated_extended_card: None,
            signatures: None,
        }
    }

    /// Primary endpoint URL (required).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Preferred transport label; defaults to JSON-RPC.
    pub fn preferred_transport(mut self, transport: impl Into<String>) -> Self {
        self.preferred_transport = transport.into();
        self
    }

    /// Adds an additional (transport, url) interface.
    pub fn additional_interface(
        mut self,
        transport: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.additional_interfaces.push(AgentInterface {
            transport: transport.into(),
            url: url.into(),
        });
        self
    }

    /// Provider organization.
    pub fn provider(mut self, organization: impl Into<String>, url: impl Into<String>) -> Self {
        self.provider = Some(AgentProvider {
            organization: organization.into(),
            url: url.into(),
        });
        self
    }

    /// Documentation URL.
    pub fn documentation_url(mut self, url: impl Into<String>) -> Self {
        self.documentation_url = Some(url.into());
        self
    }

    /// Streaming capability.
    pub fn streaming(mut self, enabled: bool) -> Self {
        self.capabilities.streaming = Some(enabled);
        self
    }

    /// Push notification capability.
    pub fn push_notifications(mut self, enabled: bool) -> Self {
        self.capabilities.push_notifications = Some(enabled);
        self
    }

    /// Whether an authenticated extended card is available.
    pub fn supports_authenticated_extended_card(mut self, enabled: bool) -> Self {
        self.supports_authenticated_extended_card = Some(enabled);
        self
    }

    /// Adds a named security scheme.
    pub fn security_scheme(mut self, name: impl Into<String>, scheme: SecurityScheme) -> Self {
        self.security_schemes.insert(name.into(), scheme);
        self
    }

    /// Adds a security requirement entry.
    pub fn security_requirement(mut self, requirement: SecurityRequirement) -> Self {
        self.security.push(requirement);
        self
    }

    /// Replaces the default input modes.
    pub fn default_input_modes(mut self, modes: Vec<String>) -> Self {
        self.default_input_modes = modes;
        self
    }

    /// Replaces the default output modes.
    pub fn default_output_modes(mut self, modes: Vec<String>) -> Self {
        self.default_output_modes = modes;
        self
    }

    /// Adds a skill.
    pub fn skill(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        self.skills.push(AgentSkill {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags,
            examples: None,
            input_modes: None,
            output_modes: None,
        });
        self
    }

    /// Builds the card.
    ///
    /// # Errors
    ///
    /// `InvalidParams` when no URL was set.
    pub fn build(self) -> A2AResult<AgentCard> {
        let url = self
            .url
            .ok_or_else(|| A2AError::invalid_params("AgentCard requires a url"))?;

        Ok(AgentCard {
            name: self.name,
            description: self.description,
            version: self.version,
            protocol_version: Some("0.3.0".to_string()),
            url,
            preferred_transport: Some(self.preferred_transport),
            additional_interfaces: if self.additional_interfaces.is_empty() {
                None
            } else {
                Some(self.additional_interfaces)
            },
            provider: self.provider,
            documentation_url: self.documentation_url,
            icon_url: self.icon_url,
            capabilities: self.capabilities,
            security_schemes: if self.security_schemes.is_empty() {
                None
            } else {
                Some(self.security_schemes)
            },
            security: if self.security.is_empty() {
                None
            } else {
                Some(self.security)
            },
            default_input_modes: self.default_input_modes,
            default_output_modes: self.default_output_modes,
            skills: self.skills,
            supports_authenticated_extended_card: self.supports_authenticated_extended_card,
            signatures: self.signatures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_minimal_card() {
        let card = AgentCardBuilder::new("Test", "An agent", "0.1.0")
            .url("http://localhost:1234")
            .build()
            .unwrap();
        assert_eq!(card.name, "Test");
        assert_eq!(card.url, "http://localhost:1234");
        assert_eq!(card.preferred_transport.as_deref(), Some("JSONRPC"));
    }

    #[test]
    fn missing_url_is_rejected() {
        assert!(AgentCardBuilder::new("Test", "An agent", "0.1.0").build().is_err());
    }

    #[test]
    fn capabilities_and_interfaces() {
        let card = AgentCardBuilder::new("Test", "An agent", "0.1.0")
            .url("http://localhost:1234")
            .streaming(true)
            .push_notifications(true)
            .additional_interface("HTTP+JSON", "http://localhost:1234/v1")
            .build()
            .unwrap();
        assert_eq!(card.capabilities.streaming, Some(true));
        assert_eq!(card.capabilities.push_notifications, Some(true));
        assert_eq!(card.additional_interfaces.unwrap().len(), 1);
    }
}
