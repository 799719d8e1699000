//! Deterministic command-reference text (spec §6.2) — the same artifact is
//! consumed as planner-prompt material and printed for human users.
//!
//! Registry entries are grouped by their `category` metadata (falling back
//! to `"{NAMESPACE} COMMANDS"` when unset, see
//! [`crate::registry::WorkflowRegistry::export_command_info`]), sections
//! sorted by category name, entries within a section sorted by usage
//! string. A fixed list of legacy (non-registry) commands is appended after
//! the registry-derived sections, skipping any usage string a registered
//! workflow already lists, so the reference never shows the same command
//! twice.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use crate::registry::WorkflowRegistry;

/// A command kept around from the original CLI surface that never made it
/// into the typed registry (e.g. shell-shaped aliases). Shown only if no
/// registered workflow already advertises the same usage string.
#[derive(Debug, Clone)]
pub struct LegacyCommand {
    pub usage: &'static str,
    pub summary: &'static str,
}

/// Commands documented for users but never backed by a registered handler —
/// kept here so the printed reference stays stable even though nothing in
/// the registry implements them.
pub const LEGACY_COMMANDS: &[LegacyCommand] = &[
    LegacyCommand {
        usage: "history list",
        summary: "shows recent command history",
    },
    LegacyCommand {
        usage: "history clear",
        summary: "clears command history",
    },
];

/// Renders the full command reference: one `CATEGORY COMMANDS` section per
/// registry category (sorted), each line `- <usage>           # <summary>`
/// sorted by usage, followed by a `LEGACY COMMANDS` section for entries in
/// [`LEGACY_COMMANDS`] whose usage isn't already registered.
pub fn build_command_reference(registry: &WorkflowRegistry) -> String {
    let infos = registry.export_command_info();
    let mut by_category: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    let mut seen_usages: BTreeSet<String> = BTreeSet::new();

    for info in &infos {
        seen_usages.insert(info.usage.clone());
        by_category
            .entry(info.category.clone())
            .or_default()
            .push((info.usage.clone(), info.summary.clone()));
    }

    let mut out = String::new();
    for (category, mut entries) in by_category {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        out.push_str(&format!("{category}:\n"));
        for (usage, summary) in entries {
            out.push_str(&format!("- {usage}           # {summary}\n"));
        }
        out.push('\n');
    }

    let legacy: Vec<&LegacyCommand> = LEGACY_COMMANDS
        .iter()
        .filter(|c| !seen_usages.contains(c.usage))
        .collect();
    if !legacy.is_empty() {
        out.push_str("LEGACY COMMANDS:\n");
        for cmd in legacy {
            out.push_str(&format!("- {}           # {}\n", cmd.usage, cmd.summary));
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}

/// Renders the command reference restricted to workflows whose namespace
/// is one of `categories` — the token-efficient per-step prompt input the
/// step planner uses instead of the full catalogue.
pub fn build_scoped_command_reference(registry: &WorkflowRegistry, categories: &[String]) -> String {
    if categories.is_empty() {
        return String::new();
    }
    let category_set: BTreeSet<&str> = categories.iter().map(String::as_str).collect();
    let mut out = String::new();
    for category in &category_set {
        let specs = registry.list(Some(category));
        out.push_str(&format!("{}:\n", category.to_uppercase()));
        if specs.is_empty() {
            out.push_str("  (no commands registered yet — may need generation)\n");
            continue;
        }
        let mut lines: Vec<(String, String)> = specs
            .iter()
            .map(|spec| {
                let mut line = format!("{}\n    {}", spec.usage_string(), spec.summary);
                if !spec.parameters.is_empty() {
                    let params: Vec<String> = spec
                        .parameters
                        .iter()
                        .map(|p| {
                            let req = if p.required { " (required)" } else { "" };
                            if p.description.is_empty() {
                                format!("{}{req}", p.name)
                            } else {
                                format!("{}{req}: {}", p.name, p.description)
                            }
                        })
                        .collect();
                    line.push_str(&format!("\n    Parameters: {}", params.join(", ")));
                }
                (spec.usage_string(), line)
            })
            .collect();
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, line) in lines {
            out.push_str(&format!("  - {line}\n"));
        }
    }
    out.trim_end().to_string()
}

/// Per-category-set command reference cache, keyed on the registry's
/// generation counter so a successful dynamic registration invalidates
/// every entry without tracking which categories it touched.
#[derive(Default)]
pub struct CommandReferenceCache {
    inner: Mutex<HashMap<BTreeSet<String>, (u64, String)>>,
}

impl CommandReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scoped command reference for `categories`, reusing a
    /// cached render if the registry hasn't changed since it was computed.
    pub fn get_or_render(&self, registry: &WorkflowRegistry, categories: &[String]) -> String {
        let key: BTreeSet<String> = categories.iter().cloned().collect();
        let generation = registry.generation();

        {
            let cache = self.inner.lock().expect("command reference cache poisoned");
            if let Some((gen, text)) = cache.get(&key) {
                if *gen == generation {
                    return text.clone();
                }
            }
        }

        let rendered = build_scoped_command_reference(registry, categories);
        let mut cache = self.inner.lock().expect("command reference cache poisoned");
        cache.insert(key, (generation, rendered.clone()));
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParameterSpec, ParameterType, WorkflowSpec};

    fn registry_with_two_categories() -> WorkflowRegistry {
        let registry = WorkflowRegistry::new();
        registry
            .register(
                WorkflowSpec::new("math", "add", "adds two numbers", |_c, _a| {
                    Ok(serde_json::json!("ok"))
                })
                .with_metadata("category", "MATH COMMANDS")
                .with_parameter(ParameterSpec::new("a", ParameterType::Integer).required()),
            )
            .unwrap();
        registry
            .register(
                WorkflowSpec::new("text", "reverse", "reverses text", |_c, _a| {
                    Ok(serde_json::json!("ok"))
                })
                .with_metadata("category", "TEXT COMMANDS"),
            )
            .unwrap();
        registry
    }

    #[test]
    fn sections_are_sorted_by_category_name() {
        let registry = registry_with_two_categories();
        let text = build_command_reference(&registry);
        let math_pos = text.find("MATH COMMANDS").unwrap();
        let text_pos = text.find("TEXT COMMANDS").unwrap();
        assert!(math_pos < text_pos);
    }

    #[test]
    fn legacy_commands_skip_duplicates_with_registry() {
        let registry = WorkflowRegistry::new();
        registry
            .register(
                WorkflowSpec::new("history", "list", "shows recent history", |_c, _a| {
                    Ok(serde_json::json!("ok"))
                })
                .with_metadata("category", "HISTORY COMMANDS"),
            )
            .unwrap();
        let text = build_command_reference(&registry);
        assert_eq!(text.matches("history list").count(), 1);
    }

    #[test]
    fn scoped_reference_only_includes_requested_categories() {
        let registry = registry_with_two_categories();
        let text = build_scoped_command_reference(&registry, &["math".to_string()]);
        assert!(text.contains("math:add"));
        assert!(!text.contains("text:reverse"));
    }

    #[test]
    fn cache_reuses_render_until_registry_generation_changes() {
        let registry = registry_with_two_categories();
        let cache = CommandReferenceCache::new();
        let first = cache.get_or_render(&registry, &["math".to_string()]);
        assert!(first.contains("math:add"));

        registry
            .register(
                WorkflowSpec::new("math", "sub", "subtracts", |_c, _a| Ok(serde_json::json!("ok")))
                    .with_metadata("category", "MATH COMMANDS"),
            )
            .unwrap();
        let second = cache.get_or_render(&registry, &["math".to_string()]);
        assert!(second.contains("math:sub"));
    }
}
