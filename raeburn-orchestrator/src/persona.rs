//! Agent personas and prompt assembly.
//!
//! Persona content is owned by embedders; this module only provides the
//! role lookup and the prompt layout the pipeline relies on.

use std::collections::HashMap;
use std::sync::RwLock;

pub const DEFAULT_ROLE: &str = "generalist";

/// One resolvable persona. Both prompt fields are optional; an empty
/// persona yields a bare `User:` prompt.
#[derive(Debug, Clone, Default)]
pub struct AgentPersona {
    pub name: String,
    pub system_prompt: Option<String>,
    pub prompt_style: Option<String>,
}

impl AgentPersona {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Role-to-persona lookup with open registration, so tests and embedders
/// can inject personas. Unknown roles resolve to `generalist`.
pub struct PersonaRegistry {
    personas: RwLock<HashMap<String, AgentPersona>>,
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        let mut personas = HashMap::new();
        personas.insert(
            DEFAULT_ROLE.to_string(),
            AgentPersona::named(DEFAULT_ROLE),
        );
        Self {
            personas: RwLock::new(personas),
        }
    }
}

impl PersonaRegistry {
    pub fn register(&self, role: impl Into<String>, persona: AgentPersona) {
        self.personas
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(role.into(), persona);
    }

    pub fn resolve(&self, role: &str) -> AgentPersona {
        let personas = self.personas.read().unwrap_or_else(|e| e.into_inner());
        personas
            .get(role)
            .or_else(|| personas.get(DEFAULT_ROLE))
            .cloned()
            .unwrap_or_else(|| AgentPersona::named(DEFAULT_ROLE))
    }
}

/// Assemble the routed prompt: system prompt first when present, then the
/// user line, then the context block and style suffix.
pub fn build_prompt(persona: &AgentPersona, user_input: &str, context: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(system) = &persona.system_prompt {
        if !system.is_empty() {
            parts.push(system.clone());
        }
    }
    parts.push(format!("User: {user_input}"));

    let mut extras: Vec<String> = Vec::new();
    let context_block = context.join("\n");
    if !context_block.is_empty() {
        extras.push(format!("Context:\n{context_block}"));
    }
    if let Some(style) = &persona.prompt_style {
        if !style.is_empty() {
            extras.push(format!("Style: {style}"));
        }
    }
    if !extras.is_empty() {
        parts.push(extras.join("\n"));
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_resolves_to_generalist() {
        let registry = PersonaRegistry::default();
        assert_eq!(registry.resolve("astronaut").name, DEFAULT_ROLE);
    }

    #[test]
    fn registered_persona_wins() {
        let registry = PersonaRegistry::default();
        registry.register(
            "reviewer",
            AgentPersona {
                name: "reviewer".to_string(),
                system_prompt: Some("You review code.".to_string()),
                prompt_style: None,
            },
        );
        assert_eq!(registry.resolve("reviewer").name, "reviewer");
    }

    #[test]
    fn prompt_layout_orders_sections() {
        let persona = AgentPersona {
            name: "p".to_string(),
            system_prompt: Some("SYS".to_string()),
            prompt_style: Some("terse".to_string()),
        };
        let prompt = build_prompt(&persona, "hi", &["- fact".to_string()]);
        assert_eq!(prompt, "SYS\n\nUser: hi\n\nContext:\n- fact\nStyle: terse");
    }

    #[test]
    fn bare_persona_yields_user_line_only() {
        let prompt = build_prompt(&AgentPersona::named("x"), "hi", &[]);
        assert_eq!(prompt, "User: hi");
    }
}
