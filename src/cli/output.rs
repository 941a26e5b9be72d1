//! Output formatting utilities for the CLI.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::ports::ScheduledAgentStatus;
use crate::services::instrumentation::AgentMetrics;

/// Output that renders both for people and as JSON.
pub trait CommandOutput: Serialize {
    /// Text for a terminal.
    fn to_human(&self) -> String;
    /// Value printed with `--json`.
    fn to_json(&self) -> serde_json::Value;
}

/// Print `result` as JSON or as human-readable text.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum length, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// What a node did during `cats run`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub node_id: String,
    /// `default` or `clustered`.
    pub scheduler: String,
    /// Agents the scheduler accepted.
    pub scheduled: usize,
    /// Agents that could not be bound.
    pub failed_to_bind: usize,
    /// Scheduling table at exit.
    pub agents: Vec<ScheduledAgentStatus>,
    /// Execution counters per agent type.
    pub metrics: BTreeMap<String, AgentMetrics>,
    /// Entry count per namespace in the composite cache.
    pub namespaces: BTreeMap<String, usize>,
}

impl CommandOutput for RunSummary {
    fn to_human(&self) -> String {
        let mut agents = Table::new();
        agents
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Agent type",
                "State",
                "Runs",
                "OK",
                "Failed",
                "Last",
                "Last ms",
            ]);
        for status in &self.agents {
            let metrics = self.metrics.get(&status.agent_type).cloned().unwrap_or_default();
            agents.add_row(vec![
                Cell::new(truncate(&status.agent_type, 48)),
                Cell::new(status.state.as_str()),
                Cell::new(status.executions),
                Cell::new(metrics.successes),
                Cell::new(metrics.failures),
                Cell::new(status.last_outcome.map_or("-", |outcome| outcome.as_str())),
                Cell::new(metrics.last_duration_ms.map_or_else(|| "-".to_string(), |ms| ms.to_string())),
            ]);
        }

        let mut cache = Table::new();
        cache.load_preset(UTF8_FULL).set_header(vec!["Namespace", "Entries"]);
        for (namespace, count) in &self.namespaces {
            cache.add_row(vec![Cell::new(namespace), Cell::new(count)]);
        }

        format!(
            "Node {} ({} scheduler): {} agents scheduled, {} failed to bind\n{agents}\n{cache}",
            self.node_id, self.scheduler, self.scheduled, self.failed_to_bind
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentState, ExecutionStatus};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("aws/us-east-1/Instances", 10), "aws/us-...");
    }

    #[test]
    fn test_run_summary_renders_rows() {
        let summary = RunSummary {
            node_id: "node-a".into(),
            scheduler: "default".into(),
            scheduled: 1,
            failed_to_bind: 0,
            agents: vec![ScheduledAgentStatus {
                agent_type: "aws/us-east-1/Instances".into(),
                provider: "aws".into(),
                state: AgentState::OwnedIdle,
                next_run: None,
                last_run: None,
                last_outcome: Some(ExecutionStatus::Success),
                consecutive_failures: 0,
                executions: 2,
            }],
            metrics: BTreeMap::new(),
            namespaces: BTreeMap::from([("instances".to_string(), 3)]),
        };

        let human = summary.to_human();
        assert!(human.contains("aws/us-east-1/Instances"));
        assert!(human.contains("instances"));
        assert_eq!(summary.to_json()["namespaces"]["instances"], 3);
    }
}
