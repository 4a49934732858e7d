//! Webhook protocol types and the action handler.
//!
//! The handler is pure orchestration: locate the relevant nodes, gate on the
//! update policy, run the match engine, shape the response. It holds no state
//! of its own beyond the injected engine.

use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationNode, AnnotationTree};
use crate::error::{ConnectorError, RequestShapeError};
use crate::matching::{MatchCriteria, MatchEngine, MatchOutcome, VendorCandidate};
use crate::policy::{should_recompute, TrackedFields};
use crate::store::VendorStore;

pub const SCHEMA_VENDOR_MATCH: &str = "vendor_match";
pub const SCHEMA_VENDOR_VAT_ID: &str = "vendor_vat_id";
pub const SCHEMA_SENDER_NAME: &str = "sender_name";
pub const SCHEMA_SENDER_ADDRESS: &str = "sender_address";

/// Marker identifying this connector as the validation source of an operation.
const VALIDATION_SOURCE: &str = "connector";
const OP_REPLACE: &str = "replace";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    pub action: String,
    #[serde(default)]
    pub updated_datapoint_ids: Vec<String>,
    pub annotation: AnnotationPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationPayload {
    pub content: Vec<AnnotationNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookResponse {
    pub messages: Vec<Message>,
    pub operations: Vec<Operation>,
}

impl WebhookResponse {
    /// The skip response: nothing to say, nothing to change.
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            operations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub op: String,
    pub id: String,
    pub value: OperationValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationValue {
    pub content: OperationContent,
    pub options: Vec<VendorCandidate>,
    pub validation_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationContent {
    pub value: String,
}

/// Orchestrates one webhook invocation end to end.
pub struct VendorMatchHandler<S> {
    engine: MatchEngine<S>,
}

impl<S: VendorStore> VendorMatchHandler<S> {
    pub fn new(engine: MatchEngine<S>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, request: WebhookRequest) -> Result<WebhookResponse, ConnectorError> {
        let tree = AnnotationTree::new(request.annotation.content)?;

        let vendor_match = required(&tree, SCHEMA_VENDOR_MATCH)?;
        let vat_id = required(&tree, SCHEMA_VENDOR_VAT_ID)?;
        let name = required(&tree, SCHEMA_SENDER_NAME)?;
        let address = required(&tree, SCHEMA_SENDER_ADDRESS)?;

        let tracked = TrackedFields {
            tax_id: vat_id.id.clone(),
            name: name.id.clone(),
            address: address.id.clone(),
        };
        // Do not update the list unless we have a reason: recomputing on an
        // unrelated edit would overwrite the user's manual pick.
        if !should_recompute(&request.action, &tracked, &request.updated_datapoint_ids) {
            return Ok(WebhookResponse::empty());
        }

        let criteria = MatchCriteria {
            tax_id: vat_id.value().split_whitespace().collect(),
            name: name.value().to_string(),
            address: address.value().to_string(),
        };

        let outcome = self.engine.match_vendor(&criteria).await?;
        Ok(render(&vendor_match.id, outcome))
    }
}

fn required<'t>(
    tree: &'t AnnotationTree,
    schema_id: &'static str,
) -> Result<&'t AnnotationNode, RequestShapeError> {
    tree.find_by_schema_id(schema_id)
        .ok_or(RequestShapeError::MissingField(schema_id))
}

/// One "replace" operation on the vendor-match node, plus zero or one error
/// message attached to the same node.
fn render(target_id: &str, outcome: MatchOutcome) -> WebhookResponse {
    let messages = outcome
        .error_message
        .map(|content| Message {
            id: target_id.to_string(),
            kind: MessageKind::Error,
            content,
        })
        .into_iter()
        .collect();

    let operations = vec![Operation {
        op: OP_REPLACE.to_string(),
        id: target_id.to_string(),
        value: OperationValue {
            content: OperationContent {
                value: outcome.selected_value,
            },
            options: outcome.options,
            validation_sources: vec![VALIDATION_SOURCE.to_string()],
        },
    }];

    WebhookResponse {
        messages,
        operations,
    }
}
