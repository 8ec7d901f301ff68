//! Remote catalog entries exposed through the shared tool contract.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::{Tool, ToolOutput, ToolProvenance};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::GatewaySession;
use crate::protocol::RemoteToolSpec;
use crate::GatewayError;

/// Longest function name chat-completions providers accept.
pub const MAX_WIRE_NAME_LEN: usize = 64;

/// A catalog entry offered to the model. `name` is the provider-safe wire
/// name; `remote_name` is what the server expects in `tools/call`.
pub struct RemoteTool {
    name: String,
    remote_name: String,
    description: String,
    parameters: Value,
    session: Arc<GatewaySession>,
}

impl RemoteTool {
    pub fn new(spec: RemoteToolSpec, session: Arc<GatewaySession>) -> Self {
        let name = wire_name(&spec.name);
        Self::with_wire_name(spec, name, session)
    }

    fn with_wire_name(spec: RemoteToolSpec, name: String, session: Arc<GatewaySession>) -> Self {
        Self {
            name,
            description: spec.description.unwrap_or_else(|| spec.name.clone()),
            parameters: spec
                .input_schema
                .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
            remote_name: spec.name,
            session,
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

/// Maps a catalog name onto `[A-Za-z0-9_-]{1,64}`: every other character
/// becomes `_` and the result is cut at [`MAX_WIRE_NAME_LEN`].
pub fn wire_name(remote_name: &str) -> String {
    let name: String = remote_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(MAX_WIRE_NAME_LEN)
        .collect();
    if name.is_empty() {
        "tool".to_owned()
    } else {
        name
    }
}

/// [`wire_name`] plus a numeric suffix when an earlier catalog entry already
/// took the same wire name.
fn unique_wire_name(remote_name: &str, taken: &mut HashSet<String>) -> String {
    let base = wire_name(remote_name);
    let mut candidate = base.clone();
    let mut counter = 2;
    while taken.contains(&candidate) {
        let suffix = format!("_{counter}");
        let keep = base.len().min(MAX_WIRE_NAME_LEN - suffix.len());
        candidate = format!("{}{suffix}", &base[..keep]);
        counter += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    fn provenance(&self) -> ToolProvenance {
        ToolProvenance::Remote
    }

    async fn invoke(&self, params: Value) -> ToolOutput {
        debug!(
            event_name = "gateway.tool.invoke",
            tool = %self.name,
            remote_name = %self.remote_name,
            "calling remote tool"
        );

        match self.session.call_tool(&self.remote_name, params).await {
            Ok(result) if result.is_error => {
                let text = result.text();
                ToolOutput::failure(if text.is_empty() {
                    format!("remote tool `{}` reported an error", self.remote_name)
                } else {
                    text
                })
            }
            Ok(result) => match result.structured_content {
                Some(structured) => ToolOutput::Success(structured),
                None => ToolOutput::Success(Value::String(result.text())),
            },
            Err(error) => {
                warn!(
                    event_name = "gateway.tool.failed",
                    tool = %self.name,
                    error = %error,
                    "remote tool invocation failed"
                );
                ToolOutput::failure(error.to_string())
            }
        }
    }
}

/// Lists the server's tools and wraps each one around the shared session.
/// Wire names are unique within the returned set, in catalog order.
pub async fn discover_tools(session: &Arc<GatewaySession>) -> Result<Vec<RemoteTool>, GatewayError> {
    let specs = session.list_tools().await?;
    let mut taken = HashSet::new();
    Ok(specs
        .into_iter()
        .map(|spec| {
            let name = unique_wire_name(&spec.name, &mut taken);
            RemoteTool::with_wire_name(spec, name, Arc::clone(session))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{unique_wire_name, wire_name, MAX_WIRE_NAME_LEN};

    fn is_wire_safe(name: &str) -> bool {
        (1..=MAX_WIRE_NAME_LEN).contains(&name.len())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    #[test]
    fn dotted_and_unicode_names_become_wire_safe() {
        assert_eq!(wire_name("users.search"), "users_search");
        assert_eq!(wire_name("calendar/create event"), "calendar_create_event");
        assert_eq!(wire_name("réserver"), "r_server");
        assert_eq!(wire_name("already_safe-name"), "already_safe-name");
        assert_eq!(wire_name(""), "tool");
    }

    #[test]
    fn long_names_are_capped() {
        let long = "calendar.".repeat(20);
        let name = wire_name(&long);
        assert_eq!(name.len(), MAX_WIRE_NAME_LEN);
        assert!(is_wire_safe(&name));
    }

    #[test]
    fn colliding_wire_names_get_suffixes() {
        let mut taken = HashSet::new();
        let first = unique_wire_name("users.search", &mut taken);
        let second = unique_wire_name("users/search", &mut taken);
        let third = unique_wire_name("users_search", &mut taken);
        assert_eq!(first, "users_search");
        assert_eq!(second, "users_search_2");
        assert_eq!(third, "users_search_3");

        let long = "x".repeat(80);
        let capped = unique_wire_name(&long, &mut taken);
        let capped_again = unique_wire_name(&long, &mut taken);
        assert_eq!(capped.len(), MAX_WIRE_NAME_LEN);
        assert_eq!(capped_again.len(), MAX_WIRE_NAME_LEN);
        assert!(capped_again.ends_with("_2"));
        assert!(is_wire_safe(&capped_again));
    }
}
