// Foundry Agents chat client
//
// Implements ChatClient against the Foundry project's Agents REST API:
// agents are registered under /assistants, conversations live in /threads,
// and a run is created, polled to a terminal state, and its assistant
// messages collected.
//
// Configuration is taken as-is. A missing endpoint or model deployment is
// reported by the first call that needs it, not at construction.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use url::Url;

use docagent_core::semconv::gen_ai;
use docagent_core::{
    AgentDefinition, AgentError, ApprovalMode, ChatClient, FoundryConfig, RemoteAgent, Result,
    Role, RunOutput, RunRequest, RunUsage, SemanticAttributes, TokenCredential, ToolDescriptor,
};

use crate::types::{
    AgentObject, CreateAgentRequest, CreateMessageRequest, CreateRunRequest, ErrorEnvelope,
    FoundryTool, MessageList, RunObject, RunStatus, SubmitToolApprovalsRequest, ThreadObject,
    ToolApproval, ToolResources,
};

/// OAuth2 scope of the Foundry data plane
pub const FOUNDRY_SCOPE: &str = "https://ai.azure.com/.default";

/// Agents API version sent with every request
pub const DEFAULT_API_VERSION: &str = "2025-05-01";

/// Tuning knobs for the client
#[derive(Debug, Clone)]
pub struct FoundryClientOptions {
    pub api_version: String,
    /// Delay between run status polls
    pub poll_interval: Duration,
    /// Upper bound on one run, from creation to terminal state
    pub run_timeout: Duration,
    /// Upper bound on any single HTTP request
    pub request_timeout: Duration,
}

impl Default for FoundryClientOptions {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval: Duration::from_millis(500),
            run_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Chat client for a Foundry project's agents service
#[derive(Clone)]
pub struct FoundryAgentClient {
    http: Client,
    config: FoundryConfig,
    credential: Arc<dyn TokenCredential>,
    attributes: Arc<SemanticAttributes>,
    options: FoundryClientOptions,
}

impl FoundryAgentClient {
    pub fn new(
        config: FoundryConfig,
        credential: Arc<dyn TokenCredential>,
        attributes: Arc<SemanticAttributes>,
    ) -> Self {
        Self {
            http: Client::new(),
            config,
            credential,
            attributes,
            options: FoundryClientOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FoundryClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &FoundryClientOptions {
        &self.options
    }

    pub fn config(&self) -> &FoundryConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<Url> {
        let endpoint = self.config.require_endpoint()?;
        let mut url = Url::parse(&format!("{}{}", endpoint, path)).map_err(|e| {
            AgentError::config(format!("Invalid project endpoint '{}': {}", endpoint, e))
        })?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.options.api_version);
        Ok(url)
    }

    /// Send an authenticated request and decode the JSON response
    async fn send<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.credential.get_token(&[FOUNDRY_SCOPE]).await?;

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .timeout(self.options.request_timeout)
            .bearer_auth(&token.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::transport(format!("{} {}: {}", method, url.path(), e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            tracing::warn!(%method, path = url.path(), status = status.as_u16(), "Agents API error");
            return Err(AgentError::remote(status.as_u16(), message));
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::transport(format!("Invalid response from {}: {}", url.path(), e)))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.send::<(), T>(Method::GET, url, None).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        self.send(Method::POST, url, Some(body)).await
    }

    async fn delete(&self, url: Url) -> Result<()> {
        self.send::<(), serde_json::Value>(Method::DELETE, url, None)
            .await
            .map(|_| ())
    }

    /// Poll a run until it reaches a terminal state, approving tool calls on the way
    async fn wait_for_run(
        &self,
        thread_id: &str,
        mut run: RunObject,
        tools: &[ToolDescriptor],
    ) -> Result<RunObject> {
        let deadline = tokio::time::Instant::now() + self.options.run_timeout;

        loop {
            if run.status.is_terminal() {
                return Ok(run);
            }

            if run.status == RunStatus::RequiresAction {
                self.approve_tool_calls(thread_id, &run, tools).await?;
            }

            let next_poll = tokio::time::Instant::now() + self.options.poll_interval;
            if next_poll >= deadline {
                return Err(self.run_timed_out(thread_id, &run.id).await);
            }
            tokio::time::sleep_until(next_poll).await;

            let url = self.url(&format!("/threads/{}/runs/{}", thread_id, run.id))?;
            run = match tokio::time::timeout_at(deadline, self.get::<RunObject>(url)).await {
                Ok(polled) => polled?,
                Err(_) => return Err(self.run_timed_out(thread_id, &run.id).await),
            };
            tracing::debug!(run_id = %run.id, status = run.status.as_str(), "Polled run");
        }
    }

    async fn run_timed_out(&self, thread_id: &str, run_id: &str) -> AgentError {
        self.cancel_run(thread_id, run_id).await;
        AgentError::Timeout(self.options.run_timeout.as_secs())
    }

    /// Approve pending tool calls whose tool never needs approval
    async fn approve_tool_calls(
        &self,
        thread_id: &str,
        run: &RunObject,
        tools: &[ToolDescriptor],
    ) -> Result<()> {
        let calls = match run
            .required_action
            .as_ref()
            .and_then(|action| action.submit_tool_approval.as_ref())
        {
            Some(approval) => &approval.tool_calls,
            None => {
                let kind = run
                    .required_action
                    .as_ref()
                    .map(|action| action.kind.as_str())
                    .unwrap_or("unknown");
                self.cancel_run(thread_id, &run.id).await;
                return Err(AgentError::RunFailed {
                    run_id: run.id.clone(),
                    status: run.status.as_str().to_string(),
                    message: format!("Unsupported required action: {}", kind),
                });
            }
        };

        for call in calls {
            let label = call.server_label.as_deref().unwrap_or_default();
            if approval_mode_for(tools, label) != ApprovalMode::NeverRequire {
                self.cancel_run(thread_id, &run.id).await;
                return Err(AgentError::ApprovalRequired(format!(
                    "{} on {}",
                    call.name.as_deref().unwrap_or("tool call"),
                    label
                )));
            }
        }

        let body = SubmitToolApprovalsRequest {
            tool_approvals: calls
                .iter()
                .map(|call| ToolApproval {
                    tool_call_id: call.id.clone(),
                    approve: true,
                })
                .collect(),
        };
        tracing::debug!(run_id = %run.id, approvals = calls.len(), "Auto-approving tool calls");

        let _: serde_json::Value = self
            .post(
                self.url(&format!(
                    "/threads/{}/runs/{}/submit_tool_outputs",
                    thread_id, run.id
                ))?,
                &body,
            )
            .await?;
        Ok(())
    }

    /// Post the request's messages, run the agent and collect its reply
    async fn run_on_thread(&self, request: RunRequest<'_>) -> Result<RunOutput> {
        let thread_id = request.thread_id;
        let mut system = Vec::new();

        for message in request.messages {
            match message.role {
                Role::System => system.push(message.text.as_str()),
                Role::User | Role::Assistant => {
                    let body = CreateMessageRequest {
                        role: if message.role == Role::User { "user" } else { "assistant" },
                        content: &message.text,
                    };
                    let _: serde_json::Value = self
                        .post(self.url(&format!("/threads/{}/messages", thread_id))?, &body)
                        .await?;
                }
            }
        }

        let body = CreateRunRequest {
            assistant_id: &request.agent.id,
            additional_instructions: (!system.is_empty()).then(|| system.join("\n")),
            tool_resources: ToolResources::for_tools(request.tools),
        };
        let run: RunObject = self
            .post(self.url(&format!("/threads/{}/runs", thread_id))?, &body)
            .await?;
        tracing::debug!(run_id = %run.id, thread_id, "Created run");

        let run = self.wait_for_run(thread_id, run, request.tools).await?;
        if run.status != RunStatus::Completed {
            return Err(AgentError::RunFailed {
                run_id: run.id,
                status: run.status.as_str().to_string(),
                message: run
                    .last_error
                    .map(|e| match e.code {
                        Some(code) => format!("{}: {}", code, e.message),
                        None => e.message,
                    })
                    .unwrap_or_default(),
            });
        }

        let text = self.run_text(thread_id, &run.id).await?;
        let model = run.model.unwrap_or_else(|| request.agent.model.clone());

        Ok(RunOutput {
            run_id: run.id,
            text,
            model: Some(model),
            usage: run.usage.map(|usage| RunUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
        })
    }

    /// Best-effort cancellation; the caller is already returning an error
    async fn cancel_run(&self, thread_id: &str, run_id: &str) {
        let url = match self.url(&format!("/threads/{}/runs/{}/cancel", thread_id, run_id)) {
            Ok(url) => url,
            Err(_) => return,
        };
        if let Err(e) = self
            .post::<_, serde_json::Value>(url, &serde_json::json!({}))
            .await
        {
            tracing::warn!(run_id, error = %e, "Failed to cancel run");
        }
    }

    /// Assistant text produced by one run, in order
    async fn run_text(&self, thread_id: &str, run_id: &str) -> Result<String> {
        let mut url = self.url(&format!("/threads/{}/messages", thread_id))?;
        url.query_pairs_mut()
            .append_pair("order", "asc")
            .append_pair("run_id", run_id);

        let messages: MessageList = self.get(url).await?;
        Ok(messages
            .data
            .iter()
            .filter(|message| message.role == "assistant")
            .map(|message| message.text())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

/// Approval mode of the tool whose server label matches; unknown tools need approval
fn approval_mode_for(tools: &[ToolDescriptor], server_label: &str) -> ApprovalMode {
    tools
        .iter()
        .find(|tool| match tool {
            ToolDescriptor::HostedMcp(mcp) => mcp.server_label() == server_label,
        })
        .map(ToolDescriptor::approval_mode)
        .unwrap_or(ApprovalMode::AlwaysRequire)
}

#[async_trait]
impl ChatClient for FoundryAgentClient {
    fn model(&self) -> &str {
        self.config.model_deployment.as_deref().unwrap_or_default()
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<RemoteAgent> {
        let model = self.config.require_model()?;
        let body = CreateAgentRequest {
            model,
            name: &definition.name,
            instructions: &definition.instructions,
            tools: definition.tools.iter().map(FoundryTool::from).collect(),
        };

        let agent: AgentObject = self.post(self.url("/assistants")?, &body).await?;
        tracing::info!(
            "gen_ai.operation.name" = gen_ai::operation::CREATE_AGENT,
            "gen_ai.agent.id" = %agent.id,
            "gen_ai.agent.name" = %definition.name,
            "Registered agent"
        );

        Ok(RemoteAgent {
            id: agent.id,
            name: agent.name.unwrap_or_else(|| definition.name.clone()),
            model: agent.model,
        })
    }

    async fn create_thread(&self) -> Result<String> {
        let thread: ThreadObject = self
            .post(self.url("/threads")?, &serde_json::json!({}))
            .await?;
        tracing::debug!(thread_id = %thread.id, "Created thread");
        Ok(thread.id)
    }

    async fn run(&self, request: RunRequest<'_>) -> Result<RunOutput> {
        let span = tracing::info_span!(
            "gen_ai.chat",
            "gen_ai.operation.name" = gen_ai::operation::CHAT,
            "gen_ai.provider.name" = gen_ai::provider::AZURE_AI_AGENTS,
            "gen_ai.request.model" = %request.agent.model,
        );
        for (key, value) in self
            .attributes
            .request_attributes(gen_ai::provider::AZURE_AI_AGENTS, &request.agent.model)
        {
            span.set_attribute(key, value);
        }

        let output = self.run_on_thread(request).instrument(span.clone()).await?;

        if let Some(model) = &output.model {
            for (key, value) in self.attributes.response_attributes(model) {
                span.set_attribute(key, value);
            }
        }
        if let Some(usage) = &output.usage {
            span.set_attribute(gen_ai::USAGE_INPUT_TOKENS, i64::from(usage.prompt_tokens));
            span.set_attribute(gen_ai::USAGE_OUTPUT_TOKENS, i64::from(usage.completion_tokens));
        }
        Ok(output)
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.delete(self.url(&format!("/assistants/{}", agent_id))?)
            .await?;
        tracing::debug!(agent_id, "Deleted agent");
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.delete(self.url(&format!("/threads/{}", thread_id))?)
            .await?;
        tracing::debug!(thread_id, "Deleted thread");
        Ok(())
    }
}

impl std::fmt::Debug for FoundryAgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoundryAgentClient")
            .field("config", &self.config)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
