//! Static safety screener for dynamically generated workflow modules.
//!
//! Ported from `validate_workflow_code` in the original agent's Python
//! validator: that function walks a `compile()`-d module's `ast` tree for
//! forbidden imports and calls, plus a handful of regex checks over the raw
//! source for shell-destructive string literals. `syn` is this crate's
//! `ast` — it parses the generated source into a full syntax tree and a
//! [`syn::visit::Visit`] implementation walks it once, collecting every
//! issue rather than stopping at the first.
//!
//! This screener is intentionally conservative: it rejects capability, not
//! intent. A workflow that legitimately needs a forbidden module should be
//! a built-in with a real port (see `dispatcher_core::ports`), not a
//! generated one.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use syn::visit::{self, Visit};
use syn::{Expr, ExprCall, ExprMethodCall, ExprPath, ItemUse, UseTree};

/// Modules a generated workflow may never reference, even indirectly
/// (`use` or fully qualified path). Each entry is matched as a path
/// segment sequence prefix, e.g. `["std", "net"]` flags `std::net::TcpStream`.
const FORBIDDEN_MODULE_PATHS: &[&[&str]] = &[
    &["std", "net", "TcpStream"],
    &["std", "net", "TcpListener"],
    &["std", "net", "UdpSocket"],
    &["libc"],
    &["winreg"],
    &["libloading"],
];

/// Bare function/method names that are an automatic reject wherever they
/// appear as a call, regardless of which module they came from — the
/// generated-code analogue of Python's `eval`/`exec`/`compile`/`__import__`.
const FORBIDDEN_CALL_NAMES: &[&str] = &["transmute", "transmute_copy", "dlopen", "exec", "spawn_sh"];

/// Regex patterns over the raw source text, matching the original
/// validator's shell-destructive-string family.
fn suspicious_patterns() -> Vec<(Regex, &'static str)> {
    vec![
        (Regex::new(r"rm\s+-rf").unwrap(), "recursive forced delete"),
        (Regex::new(r"del\s+/[sS]").unwrap(), "recursive Windows delete"),
        (Regex::new(r"format\s+[A-Za-z]:").unwrap(), "disk format command"),
        (Regex::new(r"dd\s+if=").unwrap(), "raw disk write via dd"),
        (Regex::new(r"/etc/passwd").unwrap(), "reads the system password file"),
        (Regex::new(r"sudo\s+").unwrap(), "privilege escalation via sudo"),
        (Regex::new(r#"mkfs(\.\w+)?\s"#).unwrap(), "filesystem format command"),
    ]
}

/// Outcome of screening one module's source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenResult {
    pub is_safe: bool,
    pub issues: Vec<String>,
}

impl ScreenResult {
    fn ok() -> Self {
        Self { is_safe: true, issues: Vec::new() }
    }
}

/// Screens a generated module's Rust source, returning every issue found
/// rather than short-circuiting on the first. `source` that fails to parse
/// as a syntactically valid file is itself an issue (the original's
/// `compile(code, ..., "exec")` syntax check, folded into the same pass).
pub fn screen_source(source: &str) -> ScreenResult {
    let mut issues = Vec::new();

    for (pattern, reason) in suspicious_patterns() {
        if pattern.is_match(source) {
            issues.push(format!("suspicious string pattern ({reason}): matches /{}/", pattern.as_str()));
        }
    }

    let file = match syn::parse_file(source) {
        Ok(file) => file,
        Err(e) => {
            issues.push(format!("source does not parse as valid Rust: {e}"));
            return ScreenResult { is_safe: false, issues };
        }
    };

    let mut visitor = ForbiddenVisitor::default();
    visitor.visit_file(&file);
    issues.extend(visitor.issues);

    if issues.is_empty() {
        ScreenResult::ok()
    } else {
        ScreenResult { is_safe: false, issues }
    }
}

#[derive(Default)]
struct ForbiddenVisitor {
    issues: Vec<String>,
    seen: HashSet<String>,
}

impl ForbiddenVisitor {
    fn flag(&mut self, message: String) {
        if self.seen.insert(message.clone()) {
            self.issues.push(message);
        }
    }

    fn check_path_segments(&mut self, segments: &[String]) {
        for forbidden in FORBIDDEN_MODULE_PATHS {
            if path_starts_with(segments, forbidden) {
                self.flag(format!("references forbidden module path '{}'", forbidden.join("::")));
            }
        }
    }
}

fn path_starts_with(segments: &[String], prefix: &[&str]) -> bool {
    if segments.len() < prefix.len() {
        return false;
    }
    segments.iter().zip(prefix.iter()).all(|(a, b)| a == b)
}

fn use_tree_paths(prefix: &mut Vec<String>, tree: &UseTree, out: &mut Vec<Vec<String>>) {
    match tree {
        UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            use_tree_paths(prefix, &p.tree, out);
            prefix.pop();
        }
        UseTree::Name(n) => {
            prefix.push(n.ident.to_string());
            out.push(prefix.clone());
            prefix.pop();
        }
        UseTree::Rename(r) => {
            prefix.push(r.ident.to_string());
            out.push(prefix.clone());
            prefix.pop();
        }
        UseTree::Glob(_) => out.push(prefix.clone()),
        UseTree::Group(g) => {
            for item in &g.items {
                use_tree_paths(prefix, item, out);
            }
        }
    }
}

impl<'ast> Visit<'ast> for ForbiddenVisitor {
    fn visit_item_use(&mut self, node: &'ast ItemUse) {
        let mut out = Vec::new();
        use_tree_paths(&mut Vec::new(), &node.tree, &mut out);
        for segments in out {
            self.check_path_segments(&segments);
        }
        visit::visit_item_use(self, node);
    }

    fn visit_expr_path(&mut self, node: &'ast ExprPath) {
        let segments: Vec<String> = node.path.segments.iter().map(|s| s.ident.to_string()).collect();
        self.check_path_segments(&segments);
        if let Some(last) = segments.last() {
            if FORBIDDEN_CALL_NAMES.contains(&last.as_str()) {
                self.flag(format!("references forbidden call '{last}'"));
            }
        }
        visit::visit_expr_path(self, node);
    }

    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        if let Expr::Path(p) = node.func.as_ref() {
            let full = p
                .path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect::<Vec<_>>()
                .join("::");
            if full == "std::process::Command::new" || full.ends_with("Command::new") {
                if let Some(Expr::Lit(lit)) = node.args.first() {
                    if let syn::Lit::Str(s) = &lit.lit {
                        let value = s.value();
                        if matches!(value.as_str(), "sh" | "bash" | "cmd" | "cmd.exe" | "powershell") {
                            self.flag(format!("shells out via Command::new(\"{value}\")"));
                        }
                    }
                }
            }
        }
        visit::visit_expr_call(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        let method = node.method.to_string();
        if FORBIDDEN_CALL_NAMES.contains(&method.as_str()) {
            self.flag(format!("references forbidden call '{method}'"));
        }
        visit::visit_expr_method_call(self, node);
    }
}
