//! Client runtime: transports, the send/stream coordinator, and the
//! factory.
//!
//! - [`ClientFactory`] — negotiates a transport against an agent card and
//!   builds a [`BaseClient`]
//! - [`BaseClient`] — unified send/stream API with client-side folding and
//!   the [`Consumer`] chain
//! - [`JsonRpcTransport`] / [`RestTransport`] / [`StdioTransport`] — the
//!   built-in transport bindings
//! - [`AuthInterceptor`] + [`CredentialService`] — credential attachment
//!   from the card's security schemes
//! - [`CardResolver`] — well-known-path card discovery
//!
//! # Quick start
//!
//! ```no_run
//! use a2a_sdk::client::{CardResolver, ClientConfig, ClientFactory};
//! use a2a_sdk::types::Message;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let card = CardResolver::new().resolve("http://localhost:7420").await?;
//! let factory = ClientFactory::new(ClientConfig::default());
//! let client = factory.create(card, vec![], vec![])?;
//!
//! let mut events = client
//!     .send_message(Message::user("m1", "Hello, agent"), None, None)
//!     .await?;
//! while let Some(event) = events.next().await {
//!     let (response, task) = event?;
//!     println!("{response:?} (task: {task:?})");
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod base_client;
mod card_resolver;
mod client_factory;
mod client_task_manager;
mod jsonrpc;
mod rest;
mod sse;
mod stdio;
mod transport;

pub use auth::{AuthInterceptor, CredentialService, InMemoryContextCredentialStore};
pub use base_client::{BaseClient, ClientEvent, ClientEventStream, Consumer};
pub use card_resolver::CardResolver;
pub use client_factory::{
    minimal_agent_card, negotiate_transport, ClientConfig, ClientFactory, TransportProducer,
    TransportRegistry,
};
pub use client_task_manager::ClientTaskManager;
pub use jsonrpc::JsonRpcTransport;
pub use rest::RestTransport;
pub use sse::{SseStream, SseStreamAdapter};
pub use stdio::StdioTransport;
pub use transport::{ClientCallContext, ClientCallInterceptor, ClientTransport, ResponseStream};
