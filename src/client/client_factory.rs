//! Client construction: configuration, the transport producer registry, and
//! card/preference transport negotiation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{A2AError, A2AResult};
use crate::types::{AgentCapabilities, AgentCard, AgentInterface, PushNotificationConfig};
use crate::utils::constants::{TRANSPORT_HTTP_JSON, TRANSPORT_JSONRPC};

use super::base_client::{BaseClient, Consumer};
use super::jsonrpc::JsonRpcTransport;
use super::rest::RestTransport;
use super::transport::{ClientCallInterceptor, ClientTransport};

/// Client-side configuration shared by every client a factory creates.
#[derive(Clone)]
pub struct ClientConfig {
    /// Use streaming when the agent supports it.
    pub streaming: bool,

    /// Poll instead of blocking sends; inverted into the default `blocking`
    /// flag.
    pub polling: bool,

    /// Transport labels this client can speak, in preference order. Empty
    /// means JSON-RPC only.
    pub supported_transports: Vec<String>,

    /// Resolve negotiation by client preference order instead of the
    /// card's declaration order.
    pub use_client_preference: bool,

    /// Media types accepted as output.
    pub accepted_output_modes: Vec<String>,

    /// Push notification configs attached to sends by default.
    pub push_notification_configs: Vec<PushNotificationConfig>,

    /// Shared HTTP client for the built-in transports.
    pub http_client: Option<reqwest::Client>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            streaming: true,
            polling: false,
            supported_transports: Vec::new(),
            use_client_preference: false,
            accepted_output_modes: Vec::new(),
            push_notification_configs: Vec::new(),
            http_client: None,
        }
    }
}

/// Builds a transport for a negotiated `(card, url)` pair.
pub type TransportProducer = Arc<
    dyn Fn(
            &AgentCard,
            &str,
            &ClientConfig,
            Vec<Arc<dyn ClientCallInterceptor>>,
        ) -> A2AResult<Arc<dyn ClientTransport>>
        + Send
        + Sync,
>;

/// Registry of transport producers keyed by transport label.
///
/// Owned by the factory; there is no process-wide registration.
#[derive(Default)]
pub struct TransportRegistry {
    producers: HashMap<String, TransportProducer>,
}

impl TransportRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a producer for a transport label.
    pub fn register(&mut self, label: impl Into<String>, producer: TransportProducer) {
        self.producers.insert(label.into(), producer);
    }

    /// The producer for a label, if registered.
    pub fn get(&self, label: &str) -> Option<&TransportProducer> {
        self.producers.get(label)
    }
}

/// Creates [`BaseClient`]s matched to an agent card.
///
/// The factory negotiates a transport between the card's interfaces and the
/// configured preferences, instantiates it through the registry, and wires
/// in the configured consumers and interceptors.
pub struct ClientFactory {
    config: ClientConfig,
    consumers: Vec<Arc<dyn Consumer>>,
    registry: TransportRegistry,
}

impl ClientFactory {
    /// Factory with the built-in JSON-RPC and REST producers registered.
    pub fn new(config: ClientConfig) -> Self {
        let mut factory = ClientFactory {
            config,
            consumers: Vec::new(),
            registry: TransportRegistry::new(),
        };
        factory.register_defaults();
        factory
    }

    /// Factory-level consumers, offered every event of every created
    /// client.
    pub fn with_consumers(mut self, consumers: Vec<Arc<dyn Consumer>>) -> Self {
        self.consumers = consumers;
        self
    }

    fn register_defaults(&mut self) {
        self.registry.register(
            TRANSPORT_JSONRPC,
            Arc::new(|card, url, config, interceptors| {
                let client = config.http_client.clone().unwrap_or_default();
                Ok(Arc::new(JsonRpcTransport::with_client(
                    client,
                    Some(card.clone()),
                    url,
                    interceptors,
                )) as Arc<dyn ClientTransport>)
            }),
        );
        self.registry.register(
            TRANSPORT_HTTP_JSON,
            Arc::new(|card, url, config, interceptors| {
                let client = config.http_client.clone().unwrap_or_default();
                Ok(Arc::new(RestTransport::with_client(
                    client,
                    Some(card.clone()),
                    url,
                    interceptors,
                )) as Arc<dyn ClientTransport>)
            }),
        );
    }

    /// Registers a custom transport producer (e.g. a gRPC binding).
    pub fn register(&mut self, label: impl Into<String>, producer: TransportProducer) {
        self.registry.register(label, producer);
    }

    /// Negotiates a transport for the card and builds a client.
    ///
    /// # Errors
    ///
    /// `InvalidArgs` when the card's transports and the client's supported
    /// set do not intersect, or no producer is registered for the match.
    pub fn create(
        &self,
        card: AgentCard,
        consumers: Vec<Arc<dyn Consumer>>,
        interceptors: Vec<Arc<dyn ClientCallInterceptor>>,
    ) -> A2AResult<BaseClient> {
        let (label, url) = negotiate_transport(&self.config, &card)?;
        debug!(transport = %label, url = %url, "Negotiated client transport");

        let producer = self.registry.get(&label).ok_or_else(|| {
            A2AError::InvalidArgs(format!("no client available for {label}"))
        })?;
        let transport = producer(&card, &url, &self.config, interceptors)?;

        let mut all_consumers = self.consumers.clone();
        all_consumers.extend(consumers);

        Ok(BaseClient::new(
            card,
            self.config.clone(),
            transport,
            all_consumers,
        ))
    }
}

/// Picks the `(transport, url)` pair shared by the card and the client
/// preferences.
///
/// The server candidate set is the preferred transport followed by each
/// additional interface (in declaration order, later URLs replacing earlier
/// ones for the same label). With `use_client_preference` the client's
/// ordered list is walked first; otherwise the server's order decides.
pub fn negotiate_transport(
    config: &ClientConfig,
    card: &AgentCard,
) -> A2AResult<(String, String)> {
    let server_preferred = card
        .preferred_transport
        .clone()
        .unwrap_or_else(|| TRANSPORT_JSONRPC.to_string());

    let mut server_set: Vec<(String, String)> = vec![(server_preferred, card.url.clone())];
    if let Some(ref interfaces) = card.additional_interfaces {
        for interface in interfaces {
            match server_set.iter_mut().find(|(t, _)| *t == interface.transport) {
                Some((_, url)) => *url = interface.url.clone(),
                None => server_set.push((interface.transport.clone(), interface.url.clone())),
            }
        }
    }

    let client_set: Vec<String> = if config.supported_transports.is_empty() {
        vec![TRANSPORT_JSONRPC.to_string()]
    } else {
        config.supported_transports.clone()
    };

    let matched = if config.use_client_preference {
        client_set.iter().find_map(|label| {
            server_set
                .iter()
                .find(|(t, _)| t == label)
                .map(|(t, url)| (t.clone(), url.clone()))
        })
    } else {
        server_set
            .iter()
            .find(|(t, _)| client_set.contains(t))
            .map(|(t, url)| (t.clone(), url.clone()))
    };

    matched.ok_or_else(|| A2AError::InvalidArgs("no compatible transports found".to_string()))
}

/// A bootstrap card for a known URL and transport list, good enough to call
/// the agent's card endpoint and fetch the real card.
pub fn minimal_agent_card(url: impl Into<String>, transports: &[&str]) -> AgentCard {
    let url = url.into();
    AgentCard {
        name: String::new(),
        description: String::new(),
        version: String::new(),
        protocol_version: None,
        url: url.clone(),
        preferred_transport: transports.first().map(|t| t.to_string()),
        additional_interfaces: if transports.len() > 1 {
            Some(
                transports[1..]
                    .iter()
                    .map(|t| AgentInterface {
                        url: url.clone(),
                        transport: t.to_string(),
                    })
                    .collect(),
            )
        } else {
            None
        },
        provider: None,
        documentation_url: None,
        icon_url: None,
        capabilities: AgentCapabilities::default(),
        security_schemes: None,
        security: None,
        default_input_modes: Vec::new(),
        default_output_modes: Vec::new(),
        skills: Vec::new(),
        supports_authenticated_extended_card: Some(true),
        signatures: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::TRANSPORT_GRPC;

    fn card_with(preferred: &str, url: &str, additional: Vec<(&str, &str)>) -> AgentCard {
        let mut card = minimal_agent_card(url, &[preferred]);
        card.additional_interfaces = Some(
            additional
                .into_iter()
                .map(|(t, u)| AgentInterface {
                    transport: t.to_string(),
                    url: u.to_string(),
                })
                .collect(),
        );
        card
    }

    #[test]
    fn falls_back_to_a_shared_transport() {
        // Card prefers gRPC; the client only speaks JSON-RPC and REST.
        let card = card_with(TRANSPORT_GRPC, "grpc://x", vec![(TRANSPORT_JSONRPC, "http://x")]);
        let config = ClientConfig {
            supported_transports: vec![
                TRANSPORT_JSONRPC.to_string(),
                TRANSPORT_HTTP_JSON.to_string(),
            ],
            ..Default::default()
        };

        let (label, url) = negotiate_transport(&config, &card).unwrap();
        assert_eq!(label, TRANSPORT_JSONRPC);
        assert_eq!(url, "http://x");
    }

    #[test]
    fn client_preference_wins_when_enabled() {
        let card = card_with(
            TRANSPORT_JSONRPC,
            "http://jsonrpc",
            vec![(TRANSPORT_HTTP_JSON, "http://rest")],
        );
        let config = ClientConfig {
            supported_transports: vec![
                TRANSPORT_HTTP_JSON.to_string(),
                TRANSPORT_JSONRPC.to_string(),
            ],
            use_client_preference: true,
            ..Default::default()
        };

        let (label, url) = negotiate_transport(&config, &card).unwrap();
        assert_eq!(label, TRANSPORT_HTTP_JSON);
        assert_eq!(url, "http://rest");
    }

    #[test]
    fn server_order_wins_by_default() {
        let card = card_with(
            TRANSPORT_JSONRPC,
            "http://jsonrpc",
            vec![(TRANSPORT_HTTP_JSON, "http://rest")],
        );
        let config = ClientConfig {
            supported_transports: vec![
                TRANSPORT_HTTP_JSON.to_string(),
                TRANSPORT_JSONRPC.to_string(),
            ],
            ..Default::default()
        };

        let (label, url) = negotiate_transport(&config, &card).unwrap();
        assert_eq!(label, TRANSPORT_JSONRPC);
        assert_eq!(url, "http://jsonrpc");
    }

    #[test]
    fn no_overlap_is_an_error() {
        let card = card_with(TRANSPORT_GRPC, "grpc://x", vec![]);
        let config = ClientConfig::default();
        let result = negotiate_transport(&config, &card);
        assert!(matches!(result, Err(A2AError::InvalidArgs(_))));
    }

    #[test]
    fn default_client_set_is_jsonrpc() {
        let card = card_with(TRANSPORT_JSONRPC, "http://x", vec![]);
        let config = ClientConfig::default();
        let (label, _) = negotiate_transport(&config, &card).unwrap();
        assert_eq!(label, TRANSPORT_JSONRPC);
    }

    #[test]
    fn additional_interface_replaces_preferred_url_for_same_label() {
        let card = card_with(
            TRANSPORT_JSONRPC,
            "http://old",
            vec![(TRANSPORT_JSONRPC, "http://new")],
        );
        let config = ClientConfig::default();
        let (_, url) = negotiate_transport(&config, &card).unwrap();
        assert_eq!(url, "http://new");
    }

    #[test]
    fn factory_creates_client_for_registered_transport() {
        let card = card_with(TRANSPORT_JSONRPC, "http://x", vec![]);
        let factory = ClientFactory::new(ClientConfig::default());
        assert!(factory.create(card, vec![], vec![]).is_ok());
    }

    #[test]
    fn factory_rejects_unregistered_transport_label() {
        let mut card = card_with("bespoke", "bespoke://x", vec![]);
        card.preferred_transport = Some("bespoke".to_string());
        let config = ClientConfig {
            supported_transports: vec!["bespoke".to_string()],
            ..Default::default()
        };
        let factory = ClientFactory::new(config);
        let result = factory.create(card, vec![], vec![]);
        assert!(matches!(result, Err(A2AError::InvalidArgs(_))));
    }
}
