use log::warn;
use minijinja::Environment;
use serde_json::Value;
use std::collections::HashMap;

/// Pure lookup-and-format collaborator: `translate(key, vars)` returns the
/// display string for `key` with the `vars` interpolated.
///
/// Keys are the English template strings themselves; a translation catalog
/// maps them to localized templates with the same variable names.
pub trait Translate {
    fn translate(&self, key: &str, vars: &Value) -> String;
}

/// Default `Translate` implementation.
///
/// Template keys use `{{ var }}` placeholders, which is valid minijinja
/// source, so an uncatalogued key renders as its own template. Render
/// failures fall back to the raw key; a translation bug must never take down
/// a render pass.
pub struct TemplateTranslator {
    env: Environment<'static>,
    catalog: HashMap<String, String>,
}

impl TemplateTranslator {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
            catalog: HashMap::new(),
        }
    }

    pub fn with_catalog(catalog: HashMap<String, String>) -> Self {
        Self {
            env: Environment::new(),
            catalog,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.catalog.insert(key.into(), template.into());
    }
}

impl Default for TemplateTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translate for TemplateTranslator {
    fn translate(&self, key: &str, vars: &Value) -> String {
        let template = self.catalog.get(key).map(String::as_str).unwrap_or(key);
        match self.env.render_str(template, vars) {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!("Failed to render translation template {:?}: {}", key, error);
                template.to_string()
            }
        }
    }
}
