//! Wrappers delivering a serialized dataset to different host environments.

use std::fmt;

use crate::dataset::IndexedDataset;
use crate::error::Result;

/// How a dataset is written out. Every variant but `Json` names the module
/// the dataset is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// The plain dataset JSON.
    Json,
    /// Assigns the dataset to a property of `window`.
    Window(String),
    /// An Angular module with a provider handing the dataset to `tidycalc`.
    Angular(String),
    /// An ES module exporting the dataset as its default.
    Es6(String),
}

impl OutputFormat {
    /// Picks the format from command line style options. Without a module
    /// name the output is plain JSON and the flavour flags are ignored;
    /// `angular` wins over `es6`.
    pub fn choose(module_name: Option<String>, angular: bool, es6: bool) -> Self {
        match module_name {
            None => OutputFormat::Json,
            Some(name) if angular => OutputFormat::Angular(name),
            Some(name) if es6 => OutputFormat::Es6(name),
            Some(name) => OutputFormat::Window(name),
        }
    }

    pub fn module_name(&self) -> Option<&str> {
        match self {
            OutputFormat::Json => None,
            OutputFormat::Window(name) | OutputFormat::Angular(name) | OutputFormat::Es6(name) => {
                Some(name)
            }
        }
    }

    /// File written when no output path is given.
    pub fn default_file_name(&self) -> String {
        match self {
            OutputFormat::Json => "out.json".to_string(),
            OutputFormat::Angular(name) => format!("ng-{}.js", name.to_lowercase()),
            OutputFormat::Window(name) | OutputFormat::Es6(name) => format!("{name}.js"),
        }
    }

    pub fn render(&self, dataset: &IndexedDataset) -> Result<String> {
        let json = dataset.to_json()?;
        Ok(match self {
            OutputFormat::Json => json,
            OutputFormat::Window(name) => {
                format!(";(function(d){{ return d.{name} = {json}; }})(window);")
            }
            OutputFormat::Angular(name) => format!(
                "angular.module('{name}', ['ngTidycalc']).provider('{name}', function(){{ \
                 this.$get = function(tidycalc) {{ return tidycalc({json}); }}; }});"
            ),
            OutputFormat::Es6(_) => format!("export default {json};"),
        })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Window(name) => write!(f, "window module `{name}`"),
            OutputFormat::Angular(name) => write!(f, "angular module `{name}`"),
            OutputFormat::Es6(name) => write!(f, "es6 module `{name}`"),
        }
    }
}
