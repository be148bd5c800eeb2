//! Generation options shared by every backend

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Options passed to a generator factory
///
/// Backend-specific settings live in `backend_options`, keyed
/// `"<backend>.<setting>"` (for example `"python.typeHints"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationOptions {
    pub namespace: String,
    /// Static class (C#) or namespace-level holder for free functions
    pub class_name: String,
    pub generate_entry_point: bool,
    pub generate_comments: bool,
    pub method_access_modifier: String,
    pub class_access_modifier: String,
    pub indent_size: usize,
    pub use_tabs: bool,
    /// Fold single-use temporaries into the expression that uses them
    pub inline_temporaries: bool,
    pub generate_doc_comments: bool,
    pub backend_options: BTreeMap<String, String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            namespace: "Generated".to_string(),
            class_name: "Program".to_string(),
            generate_entry_point: false,
            generate_comments: true,
            method_access_modifier: "public".to_string(),
            class_access_modifier: "public".to_string(),
            indent_size: 4,
            use_tabs: false,
            inline_temporaries: true,
            generate_doc_comments: true,
            backend_options: BTreeMap::new(),
        }
    }
}

impl GenerationOptions {
    /// Typed backend option, or `default` when missing or unparsable
    pub fn get<T: FromStr>(&self, key: &str, default: T) -> T {
        self.backend_options
            .get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Boolean backend option; accepts `true/false`, `yes/no`, `on/off`, `1/0`
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.backend_options.get(key) {
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" => false,
                _ => default,
            },
            None => default,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.backend_options.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.backend_options.insert(key.into(), value.to_string());
    }

    /// One level of indentation
    pub fn indent_unit(&self) -> String {
        if self.use_tabs {
            "\t".to_string()
        } else {
            " ".repeat(self.indent_size)
        }
    }

    /// Comma-separated list option, trimmed, empty entries dropped
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get_str(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
