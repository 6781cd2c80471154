// Agent-serving adapter for the documentation agent
//
// - protocol: Responses-style request/response and stream event types
// - responses: POST /responses and /runs handlers
// - health: liveness, readiness and health checks
// - server: AgentServer, blocking and async entry points
// - bootstrap: registry patch, config, credential, client and agent wiring

pub mod bootstrap;
pub mod health;
pub mod openapi;
pub mod protocol;
pub mod responses;
pub mod server;
pub mod settings;
pub mod telemetry;

pub use bootstrap::{build_server, get_agent};
pub use server::{shutdown_signal, AgentServer};
pub use settings::{ServeMode, ServerSettings};
