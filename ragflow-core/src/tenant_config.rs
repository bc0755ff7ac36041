//! Tenant Config Resolver (C10): produces one [`EffectiveConfig`] per request
//! by merging deployment defaults down to a custom agent's overrides.
//!
//! Grounded on the teacher's `config` crate layered-merge precedence (env >
//! dotenv > XDG toml), generalized here from process-global startup config to
//! a per-request four-level merge. Placeholder rendering is a plain
//! `str::replace` chain, matching the teacher's lack of a templating
//! dependency elsewhere in the pack.

use std::collections::HashMap;

use crate::agent::AgentConfig;
use crate::compact::CompactionConfig;
use crate::error::CoreError;
use crate::pipeline::FallbackStrategy;
use crate::rerank::RerankConfig;
use crate::retriever::SearchParams;

/// Global defaults loaded once at startup from the deployment's config file.
#[derive(Debug, Clone)]
pub struct GlobalDefaults {
    pub system_prompt: String,
    pub max_iterations: u32,
    pub temperature: f32,
    pub reflection_enabled: bool,
    pub allowed_tools: Vec<String>,
    pub search_params: SearchParams,
    pub rerank_config: RerankConfig,
    pub compaction_config: CompactionConfig,
    pub fallback: FallbackStrategy,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant grounded in the provided knowledge base.".to_string(),
            max_iterations: 6,
            temperature: 0.3,
            reflection_enabled: false,
            allowed_tools: Vec::new(),
            search_params: SearchParams::default(),
            rerank_config: RerankConfig { top_k: 10, threshold: 0.0 },
            compaction_config: CompactionConfig::default(),
            fallback: FallbackStrategy::Fixed("I couldn't find anything relevant to answer that.".to_string()),
        }
    }
}

/// Tenant-level overrides. `None`/empty fields fall through to the level
/// below — "nullable fields only override when non-zero / non-empty".
#[derive(Debug, Clone, Default)]
pub struct ConversationConfig {
    pub system_prompt: Option<String>,
    pub max_iterations: Option<u32>,
    pub temperature: Option<f32>,
    pub reflection_enabled: Option<bool>,
    pub allowed_tools: Vec<String>,
    pub vector_threshold: Option<f32>,
    pub keyword_threshold: Option<f32>,
    pub match_count: Option<usize>,
    pub rerank_top_k: Option<usize>,
    pub rerank_threshold: Option<f32>,
}

/// Per-session parameters set at chat-turn request time.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub knowledge_base_ids: Vec<String>,
    pub temperature: Option<f32>,
    pub web_search_enabled: bool,
}

/// Custom-agent config: the highest-priority level, covering the fields spec
/// §4.10 names explicitly.
#[derive(Debug, Clone, Default)]
pub struct CustomAgentConfig {
    pub system_prompt: Option<String>,
    pub allowed_tools: Vec<String>,
    pub reflection_enabled: Option<bool>,
    pub max_iterations: Option<u32>,
    pub temperature: Option<f32>,
    pub model_id: Option<String>,
}

/// Merged result of the four-level resolution, ready to drive the agent
/// loop or chat pipeline for one request.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub agent: AgentConfig,
    pub search_params: SearchParams,
    pub rerank_config: RerankConfig,
    pub compaction_config: CompactionConfig,
    pub fallback: FallbackStrategy,
    pub knowledge_base_ids: Vec<String>,
    pub model_id: Option<String>,
    pub web_search_enabled: bool,
}

/// Merges `global ⊕ tenant ⊕ session ⊕ custom_agent` (later wins) into one
/// [`EffectiveConfig`], then validates the resulting bounds (SPEC_FULL §7).
pub fn resolve(
    global: &GlobalDefaults,
    tenant: &ConversationConfig,
    session: &SessionOverrides,
    custom_agent: &CustomAgentConfig,
) -> Result<EffectiveConfig, CoreError> {
    let system_prompt = custom_agent
        .system_prompt
        .clone()
        .or_else(|| tenant.system_prompt.clone())
        .unwrap_or_else(|| global.system_prompt.clone());

    let max_iterations = custom_agent
        .max_iterations
        .or(tenant.max_iterations)
        .unwrap_or(global.max_iterations);

    let temperature = custom_agent
        .temperature
        .or(session.temperature)
        .or(tenant.temperature)
        .unwrap_or(global.temperature);

    let reflection_enabled = custom_agent
        .reflection_enabled
        .or(tenant.reflection_enabled)
        .unwrap_or(global.reflection_enabled);

    let allowed_tools = if !custom_agent.allowed_tools.is_empty() {
        custom_agent.allowed_tools.clone()
    } else if !tenant.allowed_tools.is_empty() {
        tenant.allowed_tools.clone()
    } else {
        global.allowed_tools.clone()
    };

    let mut search_params = global.search_params.clone();
    if let Some(t) = tenant.vector_threshold {
        search_params.vector_threshold = t;
    }
    if let Some(t) = tenant.keyword_threshold {
        search_params.keyword_threshold = t;
    }
    if let Some(c) = tenant.match_count {
        search_params.match_count = c;
    }
    search_params.knowledge_ids = session.knowledge_base_ids.clone();

    let mut rerank_config = global.rerank_config.clone();
    if let Some(k) = tenant.rerank_top_k {
        rerank_config.top_k = k;
    }
    if let Some(t) = tenant.rerank_threshold {
        rerank_config.threshold = t;
    }

    let agent = AgentConfig {
        allowed_tools,
        max_iterations,
        temperature,
        reflection_enabled,
        system_prompt,
    };
    agent.validate()?;

    Ok(EffectiveConfig {
        agent,
        search_params,
        rerank_config,
        compaction_config: global.compaction_config.clone(),
        fallback: global.fallback.clone(),
        knowledge_base_ids: session.knowledge_base_ids.clone(),
        model_id: custom_agent.model_id.clone(),
        web_search_enabled: session.web_search_enabled,
    })
}

/// Values substituted into the five prompt placeholders spec §4.10 names.
#[derive(Debug, Clone, Default)]
pub struct PromptPlaceholders {
    pub knowledge_bases: String,
    pub web_search_status: String,
    pub current_time: String,
    pub query: String,
    pub contexts: String,
    pub conversation: String,
}

/// Renders `template` by replacing each `{{name}}` placeholder. Unknown
/// placeholders are left untouched rather than erroring, matching the
/// teacher's forgiving `str::replace` style elsewhere in the pack.
pub fn render_prompt(template: &str, values: &PromptPlaceholders) -> String {
    let table: HashMap<&str, &str> = HashMap::from([
        ("{{knowledge_bases}}", values.knowledge_bases.as_str()),
        ("{{web_search_status}}", values.web_search_status.as_str()),
        ("{{current_time}}", values.current_time.as_str()),
        ("{{query}}", values.query.as_str()),
        ("{{contexts}}", values.contexts.as_str()),
        ("{{conversation}}", values.conversation.as_str()),
    ]);
    let mut out = template.to_string();
    for (placeholder, value) in table {
        out = out.replace(placeholder, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_defaults_win_when_nothing_overrides() {
        let global = GlobalDefaults::default();
        let cfg = resolve(&global, &ConversationConfig::default(), &SessionOverrides::default(), &CustomAgentConfig::default()).unwrap();
        assert_eq!(cfg.agent.system_prompt, global.system_prompt);
        assert_eq!(cfg.agent.max_iterations, global.max_iterations);
    }

    #[test]
    fn tenant_level_overrides_global_temperature() {
        let global = GlobalDefaults::default();
        let tenant = ConversationConfig { temperature: Some(1.5), ..Default::default() };
        let cfg = resolve(&global, &tenant, &SessionOverrides::default(), &CustomAgentConfig::default()).unwrap();
        assert_eq!(cfg.agent.temperature, 1.5);
    }

    #[test]
    fn session_level_overrides_tenant_temperature() {
        let global = GlobalDefaults::default();
        let tenant = ConversationConfig { temperature: Some(1.5), ..Default::default() };
        let session = SessionOverrides { temperature: Some(0.9), ..Default::default() };
        let cfg = resolve(&global, &tenant, &session, &CustomAgentConfig::default()).unwrap();
        assert_eq!(cfg.agent.temperature, 0.9);
    }

    #[test]
    fn custom_agent_config_wins_over_every_other_level() {
        let global = GlobalDefaults::default();
        let tenant = ConversationConfig { temperature: Some(1.5), max_iterations: Some(10), ..Default::default() };
        let session = SessionOverrides { temperature: Some(0.9), ..Default::default() };
        let custom_agent = CustomAgentConfig { temperature: Some(0.1), max_iterations: Some(3), ..Default::default() };
        let cfg = resolve(&global, &tenant, &session, &custom_agent).unwrap();
        assert_eq!(cfg.agent.temperature, 0.1);
        assert_eq!(cfg.agent.max_iterations, 3);
    }

    #[test]
    fn invalid_merged_bounds_are_rejected() {
        let global = GlobalDefaults::default();
        let custom_agent = CustomAgentConfig { max_iterations: Some(99), ..Default::default() };
        let result = resolve(&global, &ConversationConfig::default(), &SessionOverrides::default(), &custom_agent);
        assert!(result.is_err());
    }

    #[test]
    fn knowledge_base_ids_come_from_session_overrides() {
        let global = GlobalDefaults::default();
        let session = SessionOverrides { knowledge_base_ids: vec!["kb1".to_string()], ..Default::default() };
        let cfg = resolve(&global, &ConversationConfig::default(), &session, &CustomAgentConfig::default()).unwrap();
        assert_eq!(cfg.knowledge_base_ids, vec!["kb1".to_string()]);
        assert_eq!(cfg.search_params.knowledge_ids, vec!["kb1".to_string()]);
    }

    #[test]
    fn render_prompt_substitutes_all_known_placeholders() {
        let values = PromptPlaceholders {
            knowledge_bases: "kb-a, kb-b".to_string(),
            web_search_status: "enabled".to_string(),
            current_time: "2026-07-26T00:00:00Z".to_string(),
            query: "what is this?".to_string(),
            contexts: "doc excerpt".to_string(),
            conversation: "user: hi".to_string(),
        };
        let template = "KBs: {{knowledge_bases}}. Web: {{web_search_status}}. Now: {{current_time}}. Q: {{query}}. Ctx: {{contexts}}. Hist: {{conversation}}.";
        let rendered = render_prompt(template, &values);
        assert!(!rendered.contains("{{"));
        assert!(rendered.contains("kb-a, kb-b"));
        assert!(rendered.contains("what is this?"));
    }

    #[test]
    fn render_prompt_leaves_unknown_placeholders_untouched() {
        let rendered = render_prompt("hello {{unknown}}", &PromptPlaceholders::default());
        assert!(rendered.contains("{{unknown}}"));
    }
}
