//! Static resources and resource templates.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::repo::PackageLayout;

/// URI of the module list resource.
pub const MODULES_URI: &str = "resource:get_modules";
/// URI of the package structure resource.
pub const STRUCTURE_URI: &str = "resource:get_package_structure";
/// URI template of the installation guide.
pub const INSTALLATION_GUIDE_URI: &str = "resource-template:get_installation_guide";

/// A resource advertised in `resources/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

/// A template advertised in `resources/templates/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateDefinition {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

/// Content returned by `resources/read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: &'static str,
    pub text: String,
}

/// Module directories under `src/` with a description and typical members.
const MODULES: [(&str, &str, &str, &[&str]); 9] = [
    (
        "hooks",
        "hooks",
        "Custom React hooks for state management, API calls, and UI interactions",
        &["useConversation", "useAuth", "useMessages", "useChat"],
    ),
    (
        "components",
        "components",
        "Reusable React UI components organized by feature",
        &["Chat", "Nav", "ui", "Messages", "Input"],
    ),
    (
        "Providers",
        "Providers",
        "React Context providers for global state and configuration",
        &["AuthContext", "ChatContext", "ThemeProvider"],
    ),
    (
        "utils",
        "utils",
        "Utility functions and helper methods",
        &["cn", "api", "format", "validation"],
    ),
    (
        "common",
        "common",
        "Shared constants, types, and common utilities",
        &["constants", "types", "enums"],
    ),
    (
        "theme",
        "theme",
        "Theme configuration, colors, and styling utilities",
        &["colors", "tokens", "variants"],
    ),
    (
        "locales",
        "locales",
        "Internationalization files and translation strings",
        &["en", "es", "fr", "de"],
    ),
    (
        "svgs",
        "svgs",
        "SVG icons and graphic assets",
        &["icons", "logos", "illustrations"],
    ),
    (
        "store",
        "store.ts",
        "State management store configuration (Zustand/Jotai)",
        &["atoms", "selectors", "actions"],
    ),
];

/// Resources in catalog order.
#[must_use]
pub fn definitions() -> Vec<ResourceDefinition> {
    vec![
        ResourceDefinition {
            uri: MODULES_URI,
            name: "get_modules",
            description: "List of all modules in the LibreChat Client package with descriptions and paths",
            mime_type: "application/json",
        },
        ResourceDefinition {
            uri: STRUCTURE_URI,
            name: "get_package_structure",
            description: "Overview of the LibreChat Client package structure and organization",
            mime_type: "text/plain",
        },
    ]
}

/// Resource templates in catalog order.
#[must_use]
pub fn template_definitions() -> Vec<ResourceTemplateDefinition> {
    vec![ResourceTemplateDefinition {
        uri_template: INSTALLATION_GUIDE_URI,
        name: "get_installation_guide",
        description: "Get information about the LibreChat Client package structure",
        mime_type: "text/plain",
    }]
}

/// Reads the resource at `uri`. Returns `None` for unknown URIs.
#[must_use]
pub fn read(uri: &str, layout: &PackageLayout) -> Option<ResourceContents> {
    let (mime_type, text) = if uri == MODULES_URI {
        ("application/json", modules_json(layout))
    } else if uri == STRUCTURE_URI {
        ("text/plain", package_structure(layout))
    } else if uri.starts_with(INSTALLATION_GUIDE_URI) {
        ("text/plain", installation_guide(layout))
    } else {
        return None;
    };
    Some(ResourceContents {
        uri: uri.to_string(),
        mime_type,
        text,
    })
}

fn modules_json(layout: &PackageLayout) -> String {
    let modules: Map<String, Value> = MODULES
        .iter()
        .map(|(name, relative, description, examples)| {
            let entry = json!({
                "path": layout.src_path(relative),
                "description": description,
                "examples": examples,
            });
            ((*name).to_string(), entry)
        })
        .collect();
    serde_json::to_string_pretty(&modules).unwrap_or_default()
}

fn package_structure(layout: &PackageLayout) -> String {
    let repo = &layout.repository;
    let root = &layout.package_path;
    format!(
        "# LibreChat Client Package Structure

## Repository
- **Repo**: {owner}/{name}
- **Path**: {root}
- **Branch**: {branch}

## Directory Structure

{root}/
├── src/
│   ├── index.ts          # Main entry point - exports all public APIs
│   ├── store.ts          # State management configuration
│   ├── hooks/            # React hooks
│   ├── components/       # UI components (organized by feature)
│   ├── Providers/        # Context providers
│   ├── utils/            # Utility functions
│   ├── common/           # Shared constants and types
│   ├── theme/            # Theming and styling
│   ├── locales/          # i18n translations
│   └── svgs/             # SVG assets
├── package.json          # Package configuration
├── tsconfig.json         # TypeScript configuration
├── rollup.config.js      # Build configuration
└── tailwind.config.js    # Tailwind CSS configuration

## Quick Start Tools

- `list_hooks` - See all available hooks
- `list_components` - Browse component directories
- `list_providers` - View context providers
- `get_package_info` - Get package.json details
- `get_index` - See all package exports
- `get_store` - View state management setup

## Exploring the Package

1. Start with `get_index` to see what's exported
2. Use `list_*` tools to discover available modules
3. Use `get_*` tools to read specific source files
",
        owner = repo.owner,
        name = repo.name,
        branch = repo.branch,
    )
}

fn installation_guide(layout: &PackageLayout) -> String {
    let repo = &layout.repository;
    let root = &layout.package_path;
    format!(
        "# LibreChat Client Package

## Overview

The LibreChat Client package is part of the LibreChat monorepo and provides the \
client-side functionality for the LibreChat application.

## Source Location

The client package is located at:
- Repository: https://github.com/{owner}/{name}
- Path: `{root}`

## Exploring the Package

### List Package Contents
Use `list_files` to see the package structure:
- `list_files` with no arguments lists the root of {root}
- `list_files` with `directory: \"{root}/src\"` lists the src directory

### Read Source Files
Use `get_source_file` to read specific files:
- Example: `get_source_file` with `filePath: \"{root}/package.json\"`
- Example: `get_source_file` with `filePath: \"{root}/src/index.ts\"`

### Browse Directory Tree
Use `get_directory_structure` to see the full directory tree:
- Returns a nested structure of all files and directories
",
        owner = repo.owner,
        name = repo.name,
    )
}
