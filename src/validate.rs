use std::collections::HashMap;

use crate::config::Step;
use crate::state::FieldValue;

pub const REQUIRED_MESSAGE: &str = "This field is required";

#[derive(Debug, Default, PartialEq)]
pub struct StepValidation {
    pub errors: HashMap<String, String>,
}

impl StepValidation {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Presence validation for the step being left. Only `required` is enforced
/// client-side; numeric ranges and file constraints are advisory hints, with
/// the upload gateway as the authority. Runs fully on every advance attempt.
pub fn validate_step(step: &Step, values: &HashMap<String, FieldValue>) -> StepValidation {
    let mut validation = StepValidation::default();

    for field in &step.fields {
        if !field.required {
            continue;
        }
        let missing = match values.get(&field.name) {
            None => true,
            Some(value) => value.is_empty(),
        };
        if missing {
            validation
                .errors
                .insert(field.name.clone(), REQUIRED_MESSAGE.to_string());
        }
    }

    validation
}
