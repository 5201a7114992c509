use std::collections::BTreeSet;

use super::Outcome;
use crate::models::{McpServer, McpState};

/// Server names are unique; later duplicates are dropped.
pub(super) fn set_servers(mcp: &mut McpState, servers: &[McpServer]) {
    let mut seen = BTreeSet::new();
    mcp.servers = servers
        .iter()
        .filter(|s| seen.insert(s.name.clone()))
        .cloned()
        .collect();
}

pub(super) fn toggle(mcp: &mut McpState, name: &str) -> Outcome {
    let server = mcp
        .server_mut(name)
        .ok_or_else(|| format!("Unknown MCP server: {name}"))?;
    server.enabled = !server.enabled;
    Ok(())
}
