use std::collections::BTreeMap;
use std::sync::Arc;

use huddle_core::{Tool, ToolOutput, ToolProvenance, ToolSpec};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::timezone::ConvertTimezoneTool;

/// In-process tools offered on every request.
pub fn local_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(ConvertTimezoneTool)]
}

/// Name-keyed tool set presented to the model. Iteration order is by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.insert(Arc::new(tool));
    }

    fn insert(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        self.tools.insert(tool.name().to_owned(), tool)
    }

    /// Builds the merged set. Local tools win name collisions: a remote tool
    /// whose name is already taken by a local tool is dropped and reported in
    /// the second return value. A repeated remote name keeps its first entry.
    pub fn merge(local: Vec<Arc<dyn Tool>>, remote: Vec<Arc<dyn Tool>>) -> (Self, Vec<String>) {
        let mut registry = Self::default();
        let mut shadowed = Vec::new();
        let mut duplicates = Vec::new();

        for tool in local {
            registry.insert(tool);
        }
        for tool in remote {
            match registry.get(tool.name()).map(|existing| existing.provenance()) {
                Some(ToolProvenance::Local) => shadowed.push(tool.name().to_owned()),
                Some(ToolProvenance::Remote) => duplicates.push(tool.name().to_owned()),
                None => {
                    registry.insert(tool);
                }
            }
        }

        if !shadowed.is_empty() {
            warn!(
                event_name = "agent.tools.shadowed",
                tools = %shadowed.join(","),
                "remote tools hidden by local tools of the same name"
            );
        }
        if !duplicates.is_empty() {
            warn!(
                event_name = "agent.tools.duplicate_remote",
                tools = %duplicates.join(","),
                "remote catalog repeats tool names; keeping the first entry"
            );
        }
        (registry, shadowed)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn provenance_of(&self, name: &str) -> Option<ToolProvenance> {
        self.get(name).map(|tool| tool.provenance())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Runs the named tool. Unknown names come back as a failure value.
    pub async fn dispatch(&self, name: &str, params: Value) -> ToolOutput {
        let Some(tool) = self.get(name) else {
            warn!(event_name = "agent.tool.unknown", tool = %name, "model requested unknown tool");
            return ToolOutput::failure(format!("Unknown tool: {name}"));
        };

        debug!(
            event_name = "agent.tool.dispatch",
            tool = %name,
            provenance = ?tool.provenance(),
            "dispatching tool call"
        );
        let output = tool.invoke(params).await;
        info!(
            event_name = "agent.tool.completed",
            tool = %name,
            failed = output.is_failure(),
            "tool call finished"
        );
        output
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use huddle_core::{Tool, ToolOutput, ToolProvenance};
    use serde_json::{json, Value};

    use super::{local_tools, ToolRegistry};

    struct FakeRemote(&'static str);

    #[async_trait]
    impl Tool for FakeRemote {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "remote"
        }

        fn parameters(&self) -> Value {
            json!({ "type": "object" })
        }

        fn provenance(&self) -> ToolProvenance {
            ToolProvenance::Remote
        }

        async fn invoke(&self, _params: Value) -> ToolOutput {
            ToolOutput::Success(json!("remote result"))
        }
    }

    fn remote(names: &[&'static str]) -> Vec<Arc<dyn Tool>> {
        names.iter().map(|name| Arc::new(FakeRemote(name)) as Arc<dyn Tool>).collect()
    }

    #[test]
    fn merged_names_are_unique_and_sorted() {
        let (registry, shadowed) =
            ToolRegistry::merge(local_tools(), remote(&["users_search", "calendar_create_event"]));
        assert!(shadowed.is_empty());
        assert_eq!(registry.names(), vec!["calendar_create_event", "convert_timezone", "users_search"]);
        assert_eq!(registry.specs().len(), 3);
    }

    #[test]
    fn local_tool_wins_collision_every_time() {
        for _ in 0..5 {
            let (registry, shadowed) =
                ToolRegistry::merge(local_tools(), remote(&["convert_timezone", "users_search"]));
            assert_eq!(shadowed, vec!["convert_timezone".to_owned()]);
            assert_eq!(registry.len(), 2);
            assert_eq!(registry.provenance_of("convert_timezone"), Some(ToolProvenance::Local));
        }
    }

    #[test]
    fn repeated_remote_name_is_not_reported_as_shadowed() {
        let (registry, shadowed) =
            ToolRegistry::merge(local_tools(), remote(&["users_search", "users_search"]));
        assert!(shadowed.is_empty());
        assert_eq!(registry.names(), vec!["convert_timezone", "users_search"]);
        assert_eq!(registry.provenance_of("users_search"), Some(ToolProvenance::Remote));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failure_value() {
        let (registry, _) = ToolRegistry::merge(local_tools(), Vec::new());
        let output = registry.dispatch("calendar.create_event", json!({})).await;
        assert_eq!(output, ToolOutput::failure("Unknown tool: calendar.create_event"));
    }

    #[tokio::test]
    async fn dispatch_reaches_remote_tool() {
        let mut registry = ToolRegistry::default();
        registry.register(FakeRemote("users.search"));
        let output = registry.dispatch("users.search", json!({ "query": "John" })).await;
        assert_eq!(output, ToolOutput::Success(json!("remote result")));
    }
}
