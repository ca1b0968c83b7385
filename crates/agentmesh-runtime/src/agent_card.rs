//! Builds the `GET /.well-known/agent.json` AgentCard (§6) from the
//! runtime's loaded AgentConfig plus its advertised base URL.

use agentmesh_core::config::AgentConfig;

use crate::wire::{AgentCard, Capabilities, Skill};

pub const AGENT_CARD_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn build(config: &AgentConfig, base_url: &str) -> AgentCard {
    let skills = config
        .http_tools
        .iter()
        .map(|t| &t.name)
        .chain(config.sse_tools.iter().map(|t| &t.name))
        .map(|name| Skill {
            id: name.clone(),
            name: name.clone(),
            description: format!("Tool '{name}' exposed by this agent's configured MCP endpoints."),
        })
        .collect();

    AgentCard {
        name: config.name.clone(),
        description: format!("agentmesh runtime for '{}'", config.name),
        version: AGENT_CARD_VERSION.to_string(),
        url: base_url.to_string(),
        capabilities: Capabilities { streaming: config.stream },
        default_input_modes: vec!["text".to_string()],
        default_output_modes: vec!["text".to_string()],
        skills,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_core::config::HttpToolSection;

    #[test]
    fn builds_a_skill_per_configured_tool() {
        let config = AgentConfig {
            name: "billing-bot".into(),
            model: None,
            http_tools: vec![HttpToolSection {
                name: "charge_card".into(),
                url: "http://tools.default:9000".into(),
                header_allowlist: vec![],
                tool_allowlist: vec![],
            }],
            sse_tools: vec![],
            remote_agents: vec![],
            memory: None,
            workflow: None,
            stream: true,
            context_config: None,
            resumability_config: None,
        };

        let card = build(&config, "http://billing-bot.default:8080");
        assert_eq!(card.name, "billing-bot");
        assert!(card.capabilities.streaming);
        assert_eq!(card.skills.len(), 1);
        assert_eq!(card.skills[0].id, "charge_card");
    }
}
