use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One collected field value. File fields store the uploaded URL as text,
/// which is also what the cart payload carries; the original filename lives
/// in [`FormState::uploaded`] for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Many(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::Many(values) => values.is_empty(),
        }
    }

    /// Numeric reading used by the price formula. Multi-valued fields coerce
    /// through their first entry, matching the storefront's string coercion;
    /// anything non-numeric reads as None.
    pub fn as_number(&self) -> Option<f64> {
        let text = match self {
            FieldValue::Text(text) => text.as_str(),
            FieldValue::Many(values) => values.first().map(String::as_str)?,
        };
        text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub name: String,
    pub url: String,
}

/// Mutable session state owned by the calculator. Created once per widget
/// instance and discarded when the session ends; there is no draft persistence.
#[derive(Debug, Default)]
pub struct FormState {
    pub current_step: usize,
    values: HashMap<String, FieldValue>,
    uploaded: HashMap<String, UploadedFile>,
    errors: HashMap<String, String>,
    uploading: HashSet<String>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn values(&self) -> &HashMap<String, FieldValue> {
        &self.values
    }

    pub fn set_value(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
        self.errors.remove(name);
    }

    pub fn uploaded(&self, name: &str) -> Option<&UploadedFile> {
        self.uploaded.get(name)
    }

    pub fn record_upload(&mut self, name: &str, file: UploadedFile) {
        self.values
            .insert(name.to_string(), FieldValue::Text(file.url.clone()));
        self.uploaded.insert(name.to_string(), file);
        self.errors.remove(name);
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(String::as_str)
    }

    pub fn set_error(&mut self, name: &str, message: impl Into<String>) {
        self.errors.insert(name.to_string(), message.into());
    }

    pub fn clear_error(&mut self, name: &str) {
        self.errors.remove(name);
    }

    /// Navigation rebuilds the whole step, dropping every displayed error.
    pub fn clear_all_errors(&mut self) {
        self.errors.clear();
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn upload_in_flight(&self, name: &str) -> bool {
        self.uploading.contains(name)
    }

    /// Returns false when an upload for this field is already pending.
    pub fn mark_uploading(&mut self, name: &str) -> bool {
        self.uploading.insert(name.to_string())
    }

    pub fn finish_uploading(&mut self, name: &str) -> bool {
        self.uploading.remove(name)
    }
}
