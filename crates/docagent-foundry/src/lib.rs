// Azure AI Foundry backends for docagent
//
// - identity: Azure credentials (client secret, managed identity, Azure CLI,
//   the default chain and a token cache)
// - client: ChatClient over the Foundry Agents REST API

pub mod client;
pub mod identity;
mod types;

pub use client::{FoundryAgentClient, FoundryClientOptions, DEFAULT_API_VERSION, FOUNDRY_SCOPE};
pub use identity::{
    default_credential, AzureCliCredential, CachedCredential, ClientSecretCredential,
    DefaultAzureCredential, ManagedIdentityCredential, ManagedIdentitySource,
};
