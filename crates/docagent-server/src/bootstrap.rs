// Agent bootstrap
//
// Startup order: create the credential, patch the semantic-attribute
// registry, read configuration, build the Foundry chat client on the
// credential, then wrap the documentation agent definition in a ChatAgent. Missing configuration is
// logged here and only fails at the first remote call.

use docagent_core::{
    documentation_agent, read_config, ChatAgent, CredentialLifetime, FoundryConfig,
    SemanticAttributes, TokenCredential,
};
use docagent_foundry::{default_credential, FoundryAgentClient, FoundryClientOptions};
use std::sync::Arc;

use crate::server::AgentServer;
use crate::settings::ServerSettings;

/// Semantic attribute registry with the LLM defaults filled in
pub fn patched_attributes() -> SemanticAttributes {
    let mut attributes = SemanticAttributes::new();
    let added = attributes.ensure_defaults();
    tracing::debug!(added, "Semantic attribute registry patched");
    attributes
}

/// Build the documentation agent on `credential`
pub fn get_agent(credential: Arc<dyn TokenCredential>, settings: &ServerSettings) -> ChatAgent {
    let attributes = patched_attributes();
    let config = read_config();
    assemble_agent(attributes, config, credential, settings)
}

fn assemble_agent(
    attributes: SemanticAttributes,
    config: FoundryConfig,
    credential: Arc<dyn TokenCredential>,
    settings: &ServerSettings,
) -> ChatAgent {
    let options = FoundryClientOptions {
        poll_interval: settings.poll_interval,
        run_timeout: settings.run_timeout,
        ..FoundryClientOptions::default()
    };
    let client = FoundryAgentClient::new(config, credential, Arc::new(attributes))
        .with_options(options);

    ChatAgent::new(Arc::new(client), documentation_agent(), settings.cleanup)
}

/// Build a ready-to-run server from settings
///
/// With the process lifetime the credential lives as long as the process.
/// With the scoped lifetime the server closes it once serving stops.
pub fn build_server(settings: ServerSettings) -> AgentServer {
    let credential = default_credential();
    tracing::info!(lifetime = %settings.credential_lifetime, "Credential created successfully");

    let agent = get_agent(credential.clone(), &settings);
    tracing::info!(
        agent = %agent.name(),
        model = %agent.model(),
        persistence = %settings.persistence,
        cleanup = ?settings.cleanup,
        "Agent ready"
    );

    let lifetime = settings.credential_lifetime;
    let server = AgentServer::new(agent).with_settings(settings);
    match lifetime {
        CredentialLifetime::Process => server,
        CredentialLifetime::Scoped => server.with_scoped_credential(credential),
    }
}
