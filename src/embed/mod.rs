//! Embedded resources injected into target processes.
//!
//! - `CLIENT_JS` - the client bundle, minified by `build.rs`
//! - `OPTIONS_PRELUDE` - defines the global options object the bundle reads
//!
//! # Usage
//!
//! ```ignore
//! use embed::{CLIENT_JS, OPTIONS_PRELUDE, OptionsVars};
//!
//! let prelude = OPTIONS_PRELUDE.render(&OptionsVars { options_json: json });
//! let expression = format!("{prelude}{CLIENT_JS}");
//! ```

mod template;

pub use template::{Template, TemplateVars};

/// Minified client bundle.
pub const CLIENT_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/client.min.js"));

/// Global name the client bundle reads its options from.
pub const OPTIONS_GLOBAL: &str = "restyleOptions";

/// Variables for the options prelude.
pub struct OptionsVars {
    /// JSON object literal (JSON is a valid JS expression).
    pub options_json: String,
}

impl TemplateVars for OptionsVars {
    fn apply(&self, content: &str) -> String {
        content
            .replace("__GLOBAL__", OPTIONS_GLOBAL)
            .replace("__OPTIONS__", &self.options_json)
    }
}

/// Prelude assigning the options object before the bundle runs.
pub const OPTIONS_PRELUDE: Template<OptionsVars> =
    Template::new("(globalThis || global).__GLOBAL__ = __OPTIONS__;\n");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_render() {
        let rendered = OPTIONS_PRELUDE.render(&OptionsVars {
            options_json: r#"{"pid":1}"#.to_string(),
        });
        assert_eq!(
            rendered,
            "(globalThis || global).restyleOptions = {\"pid\":1};\n"
        );
    }

    #[test]
    fn test_client_bundle_embedded() {
        assert!(!CLIENT_JS.is_empty());
        assert!(CLIENT_JS.contains("restyleOptions"));
    }
}
