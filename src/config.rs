use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Root calculator document, authored once by the storefront admin and
/// immutable for the lifetime of a widget session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_button_text")]
    pub button_text: String,
    #[serde(default)]
    pub product_id: u64,
    #[serde(default)]
    pub product_name: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub price_calculation: PriceCalculation,
}

fn default_title() -> String {
    "Configure Your Product".to_string()
}

fn default_button_text() -> String {
    "Add to Cart".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceCalculation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub formula: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub title: String,
    // A step with no fields is legal: it renders empty and stays navigable.
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Select,
    Radio,
    Checkbox,
    Textarea,
    File,
}

impl FieldType {
    /// Field kinds whose rendering and value handling go through the
    /// configured option list.
    pub fn uses_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio | FieldType::Checkbox)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

impl CalculatorConfig {
    /// Load a calculator document from an explicit path, or by name from the
    /// lookup chain (project-local, user config dir, next to the executable).
    pub fn load(name_or_path: &str) -> Result<CalculatorConfig, ConfigError> {
        let direct = Path::new(name_or_path);
        if direct.exists() {
            return Self::load_path(direct);
        }

        let paths = config_paths(name_or_path);
        for path in &paths {
            if path.exists() {
                return Self::load_path(path);
            }
        }

        Err(ConfigError::NotFound {
            name: name_or_path.to_string(),
            searched: paths,
        })
    }

    fn load_path(path: &Path) -> Result<CalculatorConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CalculatorConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that make the document unusable if violated. Field
    /// names double as value keys and formula variables, so they must be
    /// non-empty and unique across every step.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.product_id == 0 {
            return Err(ConfigError::NoProduct);
        }
        if self.steps.is_empty() {
            return Err(ConfigError::NoSteps);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            for field in &step.fields {
                if field.name.trim().is_empty() {
                    return Err(ConfigError::EmptyFieldName {
                        step: step.title.clone(),
                    });
                }
                if !seen.insert(field.name.clone()) {
                    return Err(ConfigError::DuplicateField {
                        name: field.name.clone(),
                    });
                }

                let mut values = HashSet::new();
                for option in &field.options {
                    if !values.insert(option.value.as_str()) {
                        return Err(ConfigError::DuplicateOption {
                            field: field.name.clone(),
                            value: option.value.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.steps
            .iter()
            .flat_map(|step| step.fields.iter())
            .find(|field| field.name == name)
    }

    pub fn last_step_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

fn config_paths(name: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Project-local: ./.calcwiz/<name>.json
    paths.push(PathBuf::from(format!(".calcwiz/{}.json", name)));

    // 2. User config: ~/.config/calcwiz/<name>.json
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("calcwiz").join(format!("{}.json", name)));
    }

    // 3. Alongside the executable, for bundled demo configs
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("calcwiz").join(format!("{}.json", name)));
        }
    }

    paths
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no calculator configuration named '{name}'")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no product configured for this calculator")]
    NoProduct,
    #[error("calculator has no steps defined")]
    NoSteps,
    #[error("a field in step '{step}' has an empty name")]
    EmptyFieldName { step: String },
    #[error("duplicate field name '{name}'")]
    DuplicateField { name: String },
    #[error("duplicate option value '{value}' in field '{field}'")]
    DuplicateOption { field: String, value: String },
}
