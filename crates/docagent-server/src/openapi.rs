// OpenAPI documentation for the agent server

use utoipa::OpenApi;

use crate::health::{self, HealthResponse, CheckResponse};
use crate::protocol::{
    ConversationObject, ConversationRef, CreateResponseRequest, InputContent, InputContentPart,
    InputItem, OutputContent, OutputItem, ResponseError, ResponseInput, ResponseObject,
    ResponseStatus, ResponseUsage, StreamEvent,
};
use crate::responses::{self, ErrorResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        responses::create_response,
        health::liveness,
        health::readiness,
        health::health,
    ),
    components(
        schemas(
            CreateResponseRequest, ResponseInput, InputItem, InputContent, InputContentPart,
            ConversationRef,
            ResponseObject, ResponseStatus, OutputItem, OutputContent, ConversationObject,
            ResponseUsage, ResponseError, StreamEvent,
            ErrorResponse, HealthResponse, CheckResponse,
        )
    ),
    tags(
        (name = "responses", description = "Agent runs"),
        (name = "health", description = "Liveness and readiness checks")
    ),
    info(
        title = "Microsoft Documentation Agent",
        version = "0.1.0",
        description = "Hosted agent answering questions about Microsoft products from Microsoft Learn",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;
