//! Prompt catalog.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// One prompt argument.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// A prompt advertised in `prompts/list`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<PromptArgument>,
}

/// Message content of a rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PromptContent {
    Text { text: String },
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: PromptContent,
}

/// Result of `prompts/get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptResult {
    pub description: &'static str,
    pub messages: Vec<PromptMessage>,
}

/// Errors raised while rendering a prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),
    #[error("Missing required argument \"{argument}\" for prompt {prompt}")]
    MissingArgument {
        prompt: &'static str,
        argument: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    ExploreClient,
    ExploreHooks,
    ExploreComponents,
    ExploreProviders,
    StateManagement,
    ImplementFeature,
}

impl Prompt {
    const ALL: [Self; 6] = [
        Self::ExploreClient,
        Self::ExploreHooks,
        Self::ExploreComponents,
        Self::ExploreProviders,
        Self::StateManagement,
        Self::ImplementFeature,
    ];

    const fn name(self) -> &'static str {
        match self {
            Self::ExploreClient => "explore-librechat-client",
            Self::ExploreHooks => "explore-hooks",
            Self::ExploreComponents => "explore-components",
            Self::ExploreProviders => "explore-providers",
            Self::StateManagement => "understand-state-management",
            Self::ImplementFeature => "implement-feature",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::ExploreClient => "Explore the LibreChat Client package structure and available modules",
            Self::ExploreHooks => "Discover and understand available React hooks in LibreChat Client",
            Self::ExploreComponents => "Browse and understand React components in LibreChat Client",
            Self::ExploreProviders => "Understand Context providers and global state management",
            Self::StateManagement => "Learn about state management patterns in LibreChat Client",
            Self::ImplementFeature => "Get guidance on implementing a feature using LibreChat Client",
        }
    }

    fn arguments(self) -> Vec<PromptArgument> {
        match self {
            Self::ExploreClient => vec![PromptArgument {
                name: "focus",
                description: "Area to focus on (hooks, components, providers, utils, store, all)",
                required: false,
            }],
            Self::ExploreComponents => vec![PromptArgument {
                name: "category",
                description: "Component category to explore (e.g., 'Chat', 'Nav', 'ui')",
                required: false,
            }],
            Self::ImplementFeature => vec![PromptArgument {
                name: "feature",
                description: "The feature to implement (e.g., 'chat-interface', 'message-list', 'auth-flow')",
                required: true,
            }],
            Self::ExploreHooks | Self::ExploreProviders | Self::StateManagement => Vec::new(),
        }
    }

    fn render(self, args: &Map<String, Value>) -> Result<String, PromptError> {
        let arg = |name: &str| args.get(name).and_then(Value::as_str).filter(|s| !s.trim().is_empty());
        let text = match self {
            Self::ExploreClient => {
                let focus = arg("focus").unwrap_or("all");
                let areas: Vec<&str> = [
                    ("hooks", "- Hooks: use 'list_hooks' and 'get_hook' to read React hooks"),
                    ("components", "- Components: use 'list_components' and 'get_component'"),
                    ("providers", "- Providers: use 'list_providers' and 'get_provider'"),
                    ("utils", "- Utils: use 'list_utils' and 'get_util'"),
                    ("store", "- Store: use 'get_store' to read the state configuration"),
                ]
                .into_iter()
                .filter(|(area, _)| focus == "all" || focus == *area)
                .map(|(_, line)| line)
                .collect();
                format!(
                    "Explore the LibreChat Client package with focus on: {focus}\n\n\
                     INSTRUCTIONS:\n\
                     1. Start with 'get_index' to see the package exports and \
                     'get_directory_structure' for the overall layout.\n\
                     2. Focus areas:\n{}\n\
                     3. Summarise the key exports, common usage patterns and integration approaches.",
                    areas.join("\n")
                )
            }
            Self::ExploreHooks => "List the React hooks in LibreChat Client with 'list_hooks', then read the \
                 most important ones with 'get_hook'. For each hook explain what it does, its \
                 parameters and return value, and when to use it."
                .to_string(),
            Self::ExploreComponents => {
                let scope = arg("category").map_or_else(
                    || "all component directories".to_string(),
                    |category| format!("the '{category}' components"),
                );
                format!(
                    "Browse {scope} in LibreChat Client. Use 'list_components' (with 'subdir' to \
                     narrow down) and 'get_component' to read the source. Describe each component's \
                     props, composition and styling approach."
                )
            }
            Self::ExploreProviders => "List the Context providers with 'list_providers' and read them with \
                 'get_provider'. Explain which global state each provider owns and how consumers \
                 access it."
                .to_string(),
            Self::StateManagement => "Read 'get_store' and the relevant providers and hooks to explain the state \
                 management patterns in LibreChat Client: where state lives, how it is updated, \
                 and how components subscribe to it."
                .to_string(),
            Self::ImplementFeature => {
                let feature = arg("feature").ok_or(PromptError::MissingArgument {
                    prompt: self.name(),
                    argument: "feature",
                })?;
                format!(
                    "Help me implement the \"{feature}\" feature using LibreChat Client.\n\n\
                     INSTRUCTIONS:\n\
                     1. Use 'search_code' and 'get_directory_structure' to find related code.\n\
                     2. Read the relevant hooks, components and providers.\n\
                     3. Provide complete implementation code with error handling and loading states."
                )
            }
        };
        Ok(text)
    }
}

/// Prompts in catalog order.
#[must_use]
pub fn definitions() -> Vec<PromptDefinition> {
    Prompt::ALL
        .into_iter()
        .map(|prompt| PromptDefinition {
            name: prompt.name(),
            description: prompt.description(),
            arguments: prompt.arguments(),
        })
        .collect()
}

/// Renders the prompt `name` with `arguments`.
///
/// # Errors
///
/// Returns an error for unknown prompts or missing required arguments.
pub fn get(name: &str, arguments: &Map<String, Value>) -> Result<PromptResult, PromptError> {
    let prompt = Prompt::ALL
        .into_iter()
        .find(|p| p.name() == name)
        .ok_or_else(|| PromptError::UnknownPrompt(name.to_string()))?;
    let text = prompt.render(arguments)?;
    Ok(PromptResult {
        description: prompt.description(),
        messages: vec![PromptMessage {
            role: "user",
            content: PromptContent::Text { text },
        }],
    })
}
