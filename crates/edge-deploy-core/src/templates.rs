//! Embedded script fragments and placeholder substitution.
//!
//! Fragments are compiled into the binary and looked up by asset key, the
//! same way a read-only embedded filesystem would serve them. Placeholders
//! use the `{{NAME}}` form, with `NAME` made of `A-Z`, `0-9` and `_`.

use edge_deploy_common::{BuildTarget, DeployError, ResolvedConfig};

/// Key of the runtime-loader fragment.
pub const RUNTIME_LOADER: &str = "common/runtime.mjs";

/// Key of the Pages Advanced Mode worker logic.
pub const PAGES_WORKER_LOGIC: &str = "pages/worker.js";

/// Key of the Workers worker logic.
pub const WORKERS_WORKER_LOGIC: &str = "workers/worker.js";

const ASSETS: &[(&str, &str)] = &[
    (RUNTIME_LOADER, include_str!("../assets/common/runtime.mjs")),
    (PAGES_WORKER_LOGIC, include_str!("../assets/pages/worker.js")),
    (
        WORKERS_WORKER_LOGIC,
        include_str!("../assets/workers/worker.js"),
    ),
];

/// Read an embedded fragment.
///
/// # Errors
///
/// Returns [`DeployError::TemplateRead`] if no fragment has that key.
pub fn read(key: &str) -> Result<&'static str, DeployError> {
    ASSETS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, content)| *content)
        .ok_or_else(|| DeployError::template_read(key, "no embedded asset with this name"))
}

/// Key of the worker-logic fragment for a target.
pub fn worker_logic_key(target: BuildTarget) -> &'static str {
    match target {
        BuildTarget::PagesAdvancedMode => PAGES_WORKER_LOGIC,
        BuildTarget::Workers => WORKERS_WORKER_LOGIC,
    }
}

/// Placeholder tokens understood by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Path prefix routed to the Wasm handlers.
    ApiRoutePrefix,
    /// Import specifier of the Wasm binary.
    ModulePath,
    /// Binary name without the `.wasm` suffix.
    ModuleName,
}

impl Placeholder {
    /// Every recognized placeholder.
    pub const ALL: [Placeholder; 3] = [Self::ApiRoutePrefix, Self::ModulePath, Self::ModuleName];

    /// Literal token as it appears in fragments.
    pub fn token(self) -> &'static str {
        match self {
            Self::ApiRoutePrefix => "{{API_ROUTE_PREFIX}}",
            Self::ModulePath => "{{MODULE_PATH}}",
            Self::ModuleName => "{{MODULE_NAME}}",
        }
    }

    /// Value substituted for this token.
    pub fn value(self, config: &ResolvedConfig) -> String {
        match self {
            Self::ApiRoutePrefix => config.api_route_prefix().to_string(),
            Self::ModulePath => config.module_path(),
            Self::ModuleName => config.module_name().to_string(),
        }
    }
}

/// Replace every placeholder in `script` with its configured value.
///
/// The script is scanned once; substituted values are never rescanned, so
/// a value that itself looks like a token is written verbatim.
///
/// # Errors
///
/// Returns [`DeployError::UnresolvedPlaceholder`] for the first `{{NAME}}`
/// token in `script` that is not a known placeholder.
pub fn substitute(script: &str, config: &ResolvedConfig) -> Result<String, DeployError> {
    let values = Placeholder::ALL.map(|placeholder| {
        (placeholder.token(), placeholder.value(config))
    });

    let mut out = String::with_capacity(script.len());
    let mut rest = script;
    while let Some(offset) = rest.find("{{") {
        out.push_str(&rest[..offset]);
        rest = &rest[offset..];

        if let Some((token, value)) = values.iter().find(|(token, _)| rest.starts_with(token)) {
            out.push_str(value);
            rest = &rest[token.len()..];
            continue;
        }

        if let Some(token) = find_unresolved(rest).filter(|token| rest.starts_with(token)) {
            return Err(DeployError::UnresolvedPlaceholder {
                token: token.to_string(),
            });
        }

        out.push_str("{{");
        rest = &rest[2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Find the first `{{NAME}}` token in `text`.
pub fn find_unresolved(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find("{{") {
        let start = search_from + offset;
        let name_start = start + 2;
        let name_len = text[name_start..]
            .bytes()
            .take_while(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
            .count();
        let name_end = name_start + name_len;

        if name_len > 0 && text[name_end..].starts_with("}}") {
            return Some(&text[start..name_end + 2]);
        }
        search_from = name_start;
    }
    None
}
