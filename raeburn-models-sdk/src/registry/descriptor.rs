use serde::Serialize;
use serde_json::{Map, Value};

/// Closed set of recognized upstream kinds. Adapter construction dispatches
/// on this tag; anything unrecognized degrades to the echo provider rather
/// than failing registry load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    LocalEcho,
    OpenAiCompatible,
    OpenRouter,
    HuggingFace,
    Ollama,
}

impl ProviderKind {
    pub fn parse(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" | "openai_compatible" => Self::OpenAiCompatible,
            "openrouter" => Self::OpenRouter,
            "huggingface" | "hf" => Self::HuggingFace,
            "ollama" => Self::Ollama,
            "local" | "local-echo" | "local_echo" => Self::LocalEcho,
            other => {
                tracing::warn!(provider = other, "unknown provider tag, treating as local echo");
                Self::LocalEcho
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalEcho => "local-echo",
            Self::OpenAiCompatible => "openai-compatible",
            Self::OpenRouter => "openrouter",
            Self::HuggingFace => "huggingface",
            Self::Ollama => "ollama",
        }
    }

    /// Suffix used in the credential-missing fallback content, e.g.
    /// `"<prompt> - openai"`.
    pub fn fallback_tag(&self) -> &'static str {
        match self {
            Self::LocalEcho => "local",
            Self::OpenAiCompatible => "openai",
            Self::OpenRouter => "openrouter",
            Self::HuggingFace => "huggingface",
            Self::Ollama => "ollama",
        }
    }
}

/// Task-affinity bias tags consulted by the router's score multiplier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterBias {
    pub prefer_for: Vec<String>,
    pub avoid_for: Vec<String>,
}

/// Declared model capabilities; gates applied by `ModelRegistry::choose`.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub streaming: bool,
    pub json_mode: bool,
    pub roles_supported: Vec<String>,
    pub multimodal: bool,
    pub max_context: Option<u64>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            streaming: false,
            json_mode: false,
            roles_supported: vec!["user".to_string()],
            multimodal: false,
            max_context: None,
        }
    }
}

/// Immutable per-model record loaded from the registry file.
///
/// Recognized keys are lifted into typed fields; everything else is kept
/// verbatim in `extras` so provider-specific settings (endpoint, model id,
/// api key) survive the round trip.
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub provider: ProviderKind,
    pub cost_usd_per_1k: f64,
    pub speed_tps_estimate: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub forbidden_tasks: Vec<String>,
    pub router_bias: RouterBias,
    pub auto_disable_threshold_failures: Option<u32>,
    pub last_passed_health: Option<String>,
    pub allowed_hosts: Vec<String>,
    pub capabilities: Capabilities,
    pub extras: Map<String, Value>,
}

const RECOGNIZED_KEYS: &[&str] = &[
    "name",
    "id",
    "provider",
    "type",
    "cost",
    "speed",
    "strengths",
    "weaknesses",
    "forbidden_tasks",
    "router_bias",
    "auto_disable_threshold_failures",
    "last_passed_health",
    "allowed_hosts",
    "capabilities",
];

fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl ModelDescriptor {
    /// Parse one entry of the registry's `models` array. Returns `None`
    /// when the entry has no usable name.
    pub fn from_value(data: &Value) -> Option<Self> {
        let obj = data.as_object()?;
        let name = obj
            .get("name")
            .or_else(|| obj.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|n| !n.is_empty())?;

        let provider = ProviderKind::parse(
            obj.get("provider")
                .or_else(|| obj.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("local"),
        );

        // `cost` is either a bare number or `{"usd_per_1k": ...}`.
        let cost_usd_per_1k = match obj.get("cost") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::Object(c)) => c
                .get("usd_per_1k")
                .or_else(|| c.get("usd_per_k"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            _ => 0.0,
        };

        let speed_tps_estimate = match obj.get("speed") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::Object(s)) => s
                .get("tps_estimate")
                .or_else(|| s.get("tps"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            _ => 0.0,
        };

        let bias_obj = obj.get("router_bias").and_then(Value::as_object);
        let router_bias = RouterBias {
            prefer_for: string_list(bias_obj.and_then(|b| b.get("prefer_for"))),
            avoid_for: string_list(bias_obj.and_then(|b| b.get("avoid_for"))),
        };

        let caps_obj = obj.get("capabilities").and_then(Value::as_object);
        let cap_bool = |key: &str, fallback: bool| {
            caps_obj
                .and_then(|c| c.get(key))
                .and_then(Value::as_bool)
                .unwrap_or(fallback)
        };
        // Chat-completion providers default to streaming/json/full roles
        // unless the file says otherwise.
        let chatty = matches!(
            provider,
            ProviderKind::OpenAiCompatible | ProviderKind::OpenRouter
        );
        let mut roles = string_list(caps_obj.and_then(|c| c.get("roles_supported")));
        if roles.is_empty() {
            roles = if chatty {
                vec![
                    "system".to_string(),
                    "user".to_string(),
                    "assistant".to_string(),
                ]
            } else {
                vec!["user".to_string()]
            };
        }
        let capabilities = Capabilities {
            streaming: cap_bool("streaming", chatty),
            json_mode: cap_bool("json_mode", chatty),
            roles_supported: roles,
            multimodal: caps_obj
                .and_then(|c| c.get("multimodal").or_else(|| c.get("multi_modality")))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            max_context: caps_obj
                .and_then(|c| c.get("max_context"))
                .and_then(Value::as_u64),
        };

        let mut extras: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| !RECOGNIZED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if provider == ProviderKind::OpenRouter && !extras.contains_key("endpoint") {
            extras.insert(
                "endpoint".to_string(),
                Value::String("https://openrouter.ai/api/v1/chat/completions".to_string()),
            );
        }

        Some(Self {
            name,
            provider,
            cost_usd_per_1k,
            speed_tps_estimate,
            strengths: string_list(obj.get("strengths")),
            weaknesses: string_list(obj.get("weaknesses")),
            forbidden_tasks: string_list(obj.get("forbidden_tasks")),
            router_bias,
            auto_disable_threshold_failures: obj
                .get("auto_disable_threshold_failures")
                .and_then(Value::as_u64)
                .map(|v| v as u32),
            last_passed_health: obj
                .get("last_passed_health")
                .and_then(Value::as_str)
                .map(str::to_string),
            allowed_hosts: string_list(obj.get("allowed_hosts")),
            capabilities,
            extras,
        })
    }

    /// The synthetic fallback descriptor installed when the registry is empty.
    pub fn local_echo() -> Self {
        Self {
            name: "local-echo".to_string(),
            provider: ProviderKind::LocalEcho,
            cost_usd_per_1k: 0.0,
            speed_tps_estimate: 0.0,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            forbidden_tasks: Vec::new(),
            router_bias: RouterBias::default(),
            auto_disable_threshold_failures: None,
            last_passed_health: None,
            allowed_hosts: Vec::new(),
            capabilities: Capabilities::default(),
            extras: Map::new(),
        }
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(Value::as_str)
    }

    /// Configured endpoint, from the registry entry or the installed-models
    /// overlay merge.
    pub fn endpoint(&self) -> Option<&str> {
        self.extra_str("endpoint")
    }

    /// Whether `endpoint` passes the `allowed_hosts` gate. An empty allow
    /// list, a missing endpoint, or an unparseable host all pass.
    pub fn host_allowed(&self, endpoint: Option<&str>) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        let Some(endpoint) = endpoint else {
            return true;
        };
        match hostname_of(endpoint) {
            Some(host) => self.allowed_hosts.iter().any(|h| h == &host),
            None => true,
        }
    }
}

/// Hostname component of a URL, lowercased. No scheme means no host.
fn hostname_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit('@').next()?;
    let host = authority.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_descriptor() {
        let value = json!({
            "name": "gpt-x",
            "provider": "openai-compatible",
            "cost": {"usd_per_1k": 0.5},
            "speed": {"tps_estimate": 80.0},
            "strengths": ["code"],
            "weaknesses": ["poetry"],
            "forbidden_tasks": ["medical"],
            "router_bias": {"prefer_for": ["code"], "avoid_for": ["chat"]},
            "auto_disable_threshold_failures": 3,
            "allowed_hosts": ["api.example.com"],
            "capabilities": {"streaming": true, "json_mode": false, "roles_supported": ["user"], "max_context": 8192},
            "endpoint": "https://api.example.com/v1",
            "api_key": "k"
        });
        let d = ModelDescriptor::from_value(&value).unwrap();
        assert_eq!(d.name, "gpt-x");
        assert_eq!(d.provider, ProviderKind::OpenAiCompatible);
        assert!((d.cost_usd_per_1k - 0.5).abs() < 1e-9);
        assert!((d.speed_tps_estimate - 80.0).abs() < 1e-9);
        assert_eq!(d.forbidden_tasks, vec!["medical"]);
        assert_eq!(d.router_bias.prefer_for, vec!["code"]);
        assert_eq!(d.auto_disable_threshold_failures, Some(3));
        assert!(!d.capabilities.json_mode);
        assert_eq!(d.capabilities.max_context, Some(8192));
        assert_eq!(d.endpoint(), Some("https://api.example.com/v1"));
        assert_eq!(d.extra_str("api_key"), Some("k"));
    }

    #[test]
    fn cost_accepts_bare_number() {
        let d = ModelDescriptor::from_value(&json!({"name": "a", "cost": 1.5})).unwrap();
        assert!((d.cost_usd_per_1k - 1.5).abs() < 1e-9);
    }

    #[test]
    fn nameless_entry_is_rejected() {
        assert!(ModelDescriptor::from_value(&json!({"provider": "ollama"})).is_none());
    }

    #[test]
    fn chat_providers_default_rich_capabilities() {
        let d = ModelDescriptor::from_value(&json!({"name": "r", "provider": "openrouter"})).unwrap();
        assert!(d.capabilities.streaming);
        assert!(d.capabilities.json_mode);
        assert!(d.capabilities.roles_supported.contains(&"system".to_string()));
        assert!(d.endpoint().unwrap().contains("openrouter.ai"));
    }

    #[test]
    fn unknown_provider_degrades_to_echo() {
        let d = ModelDescriptor::from_value(&json!({"name": "m", "provider": "quantum"})).unwrap();
        assert_eq!(d.provider, ProviderKind::LocalEcho);
    }

    #[test]
    fn host_gate() {
        let d = ModelDescriptor::from_value(&json!({
            "name": "m",
            "allowed_hosts": ["good.example.com"]
        }))
        .unwrap();
        assert!(d.host_allowed(Some("https://good.example.com/v1")));
        assert!(d.host_allowed(Some("https://GOOD.example.com:8443/v1")));
        assert!(!d.host_allowed(Some("https://evil.example.com/v1")));
        assert!(d.host_allowed(None));
        assert!(d.host_allowed(Some("not a url")));
    }

    #[test]
    fn unrecognized_fields_land_in_extras() {
        let d = ModelDescriptor::from_value(&json!({
            "name": "m",
            "vendor_priority": 7,
            "model": "upstream-id"
        }))
        .unwrap();
        assert_eq!(d.extras.get("vendor_priority"), Some(&json!(7)));
        assert_eq!(d.extra_str("model"), Some("upstream-id"));
    }
}
