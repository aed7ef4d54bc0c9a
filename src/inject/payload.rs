//! Inspector request payloads.

use crate::embed::{CLIENT_JS, OPTIONS_PRELUDE, OptionsVars};
use serde::Serialize;
use serde_json::{Value, json};

pub const METHOD_ENABLE: &str = "Runtime.enable";
pub const METHOD_EVALUATE: &str = "Runtime.evaluate";

/// Ends the inspector session from inside the target.
pub const DEBUG_END: &str = "process._debugEnd();";

/// Options object the client bundle reads at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions<'a> {
    pub executable_name: &'a str,
    pub pid: u32,
    #[serde(rename = "removeCSP")]
    pub remove_csp: bool,
    pub port: u16,
}

/// `Runtime.evaluate` params for `expression`.
pub fn evaluate(expression: &str) -> Value {
    json!({
        "expression": expression,
        "includeCommandLineAPI": true,
    })
}

/// Options prelude, client bundle and session end, as one expression.
pub fn style_bundle(options: &ClientOptions<'_>) -> String {
    // Serializing a plain struct of strings, numbers and bools cannot fail.
    let options_json = serde_json::to_string(options).unwrap_or_else(|_| "{}".to_string());
    let prelude = OPTIONS_PRELUDE.render(&OptionsVars { options_json });
    format!("{prelude}{CLIENT_JS}\n{DEBUG_END}")
}
