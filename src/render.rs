use std::fmt::Write;

use crate::config::{Field, FieldType, Step};
use crate::state::{FieldValue, FormState};

/// Pure data-to-markup functions for the widget content area. Everything
/// admin- or user-supplied passes through [`escape_html`] before it is
/// embedded, labels and option values included.

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Numeric attribute values print without a trailing `.0` so the markup
/// matches what the authoring UI wrote.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn text_value<'a>(value: Option<&'a FieldValue>) -> &'a str {
    match value {
        Some(FieldValue::Text(text)) => text,
        _ => "",
    }
}

fn is_checked(value: Option<&FieldValue>, option_value: &str) -> bool {
    matches!(value, Some(FieldValue::Many(values)) if values.iter().any(|v| v == option_value))
}

pub fn render_step(step: &Step, form: &FormState) -> String {
    let mut html = format!(
        "<h3 class=\"step-title\">{}</h3><div class=\"calculator-fields\">",
        escape_html(&step.title)
    );
    for field in &step.fields {
        html.push_str(&render_field(field, form));
    }
    html.push_str("</div>");
    html
}

pub fn render_field(field: &Field, form: &FormState) -> String {
    let value = form.value(&field.name);
    let error = form.error(&field.name);
    let name = escape_html(&field.name);
    let required = if field.required {
        "<span class=\"required\">*</span>"
    } else {
        ""
    };
    let error_attr = if error.is_some() {
        " class=\"error\""
    } else {
        ""
    };

    let mut html = format!("<div class=\"field-group\" data-field-name=\"{}\">", name);
    let _ = write!(
        html,
        "<label>{}{}</label>",
        escape_html(&field.label),
        required
    );

    match field.field_type {
        FieldType::Text | FieldType::Number => {
            let input_type = if field.field_type == FieldType::Number {
                "number"
            } else {
                "text"
            };
            let mut attrs = String::new();
            if let Some(min) = field.min {
                let _ = write!(attrs, " min=\"{}\"", format_number(min));
            }
            if let Some(max) = field.max {
                let _ = write!(attrs, " max=\"{}\"", format_number(max));
            }
            if let Some(step) = field.step {
                let _ = write!(attrs, " step=\"{}\"", format_number(step));
            }
            let _ = write!(
                html,
                "<input type=\"{}\" name=\"{}\" value=\"{}\"{}{} />",
                input_type,
                name,
                escape_html(text_value(value)),
                attrs,
                error_attr,
            );
        }
        FieldType::Textarea => {
            let _ = write!(
                html,
                "<textarea name=\"{}\"{}>{}</textarea>",
                name,
                error_attr,
                escape_html(text_value(value))
            );
        }
        FieldType::Select => {
            let current = text_value(value);
            let _ = write!(html, "<select name=\"{}\">", name);
            html.push_str("<option value=\"\">Select an option</option>");
            for option in &field.options {
                let selected = if current == option.value { " selected" } else { "" };
                let _ = write!(
                    html,
                    "<option value=\"{}\"{}>{}</option>",
                    escape_html(&option.value),
                    selected,
                    escape_html(&option.label)
                );
            }
            html.push_str("</select>");
        }
        FieldType::Radio => {
            let current = text_value(value);
            html.push_str("<div class=\"radio-group\">");
            for option in &field.options {
                let checked = if current == option.value { " checked" } else { "" };
                let _ = write!(
                    html,
                    "<label><input type=\"radio\" name=\"{}\" value=\"{}\"{} /> {}</label>",
                    name,
                    escape_html(&option.value),
                    checked,
                    escape_html(&option.label)
                );
            }
            html.push_str("</div>");
        }
        FieldType::Checkbox => {
            html.push_str("<div class=\"checkbox-group\">");
            for option in &field.options {
                let checked = if is_checked(value, &option.value) {
                    " checked"
                } else {
                    ""
                };
                let _ = write!(
                    html,
                    "<label><input type=\"checkbox\" name=\"{}[]\" value=\"{}\"{} /> {}</label>",
                    name,
                    escape_html(&option.value),
                    checked,
                    escape_html(&option.label)
                );
            }
            html.push_str("</div>");
        }
        FieldType::File => {
            let uploaded = form.uploaded(&field.name);
            let file_name = uploaded.map(|f| f.name.as_str()).unwrap_or("No file chosen");
            let has_file = if uploaded.is_some() { " has-file" } else { "" };
            let _ = write!(
                html,
                "<div class=\"file-upload{}\" data-field=\"{}\">",
                has_file, name
            );
            html.push_str("<div class=\"upload-text\">Click to upload or drag and drop</div>");
            html.push_str(
                "<div class=\"file-info\">Accepted: PDF, PNG, JPG, AI, EPS (Max 10MB)</div>",
            );
            let _ = write!(
                html,
                "<div class=\"file-name\">{}</div>",
                escape_html(file_name)
            );
            let _ = write!(
                html,
                "<input type=\"file\" name=\"{}\" accept=\".pdf,.png,.jpg,.jpeg,.ai,.eps\" />",
                name
            );
            html.push_str("</div>");
        }
    }

    let _ = write!(
        html,
        "<div class=\"error-message\">{}</div></div>",
        escape_html(error.unwrap_or(""))
    );
    html
}

/// Progress indicator row: completed for passed steps, active for the
/// current one, neutral otherwise.
pub fn render_progress(steps: &[Step], current: usize) -> String {
    let mut html = String::from("<div class=\"calculator-progress\">");
    for (index, step) in steps.iter().enumerate() {
        let state = if index < current {
            " completed"
        } else if index == current {
            " active"
        } else {
            ""
        };
        let _ = write!(
            html,
            "<div class=\"step-indicator{}\" data-step=\"{}\">\
             <div class=\"step-circle\">{}</div>\
             <div class=\"step-title\">{}</div></div>",
            state,
            index,
            index + 1,
            escape_html(&step.title)
        );
    }
    html.push_str("</div>");
    html
}

pub fn render_submitting() -> String {
    "<div class=\"calculator-loading\"><div class=\"spinner\"></div>\
     <p>Adding to cart...</p></div>"
        .to_string()
}

pub fn render_success(message: &str, cart_url: &str) -> String {
    format!(
        "<div class=\"calculator-success\"><div class=\"success-icon\">\u{2713}</div>\
         <h3>Added to Cart!</h3><p>{}</p>\
         <a href=\"{}\" class=\"view-cart-btn\">View Cart</a></div>",
        escape_html(message),
        escape_html(cart_url)
    )
}

pub fn render_failure(message: &str) -> String {
    format!(
        "<div class=\"calculator-error\"><p>Error: {}</p>\
         <button class=\"btn-primary btn-retry\">Try Again</button></div>",
        escape_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldOption;
    use crate::state::UploadedFile;

    fn field(name: &str, field_type: FieldType) -> Field {
        Field {
            name: name.to_string(),
            field_type,
            label: format!("The {}", name),
            required: false,
            options: Vec::new(),
            min: None,
            max: None,
            step: None,
        }
    }

    fn options(pairs: &[(&str, &str)]) -> Vec<FieldOption> {
        pairs
            .iter()
            .map(|(label, value)| FieldOption {
                label: label.to_string(),
                value: value.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>&"quoted"'</b>"#),
            "&lt;b&gt;&amp;&quot;quoted&quot;&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_labels_are_escaped() {
        let mut f = field("notes", FieldType::Text);
        f.label = "<script>alert(1)</script>".to_string();
        let html = render_field(&f, &FormState::new());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_number_constraints_rendered() {
        let mut f = field("width", FieldType::Number);
        f.min = Some(10.0);
        f.max = Some(500.0);
        f.step = Some(0.5);
        let html = render_field(&f, &FormState::new());
        assert!(html.contains("type=\"number\""));
        assert!(html.contains("min=\"10\""));
        assert!(html.contains("max=\"500\""));
        assert!(html.contains("step=\"0.5\""));
    }

    #[test]
    fn test_text_input_carries_value() {
        let f = field("name", FieldType::Text);
        let mut form = FormState::new();
        form.set_value("name", FieldValue::text("Ada"));
        let html = render_field(&f, &form);
        assert!(html.contains("value=\"Ada\""));
    }

    #[test]
    fn test_select_placeholder_and_selection() {
        let mut f = field("finish", FieldType::Select);
        f.options = options(&[("Matte", "matte"), ("Gloss", "gloss")]);
        let mut form = FormState::new();
        form.set_value("finish", FieldValue::text("gloss"));
        let html = render_field(&f, &form);
        assert!(html.contains("<option value=\"\">Select an option</option>"));
        assert!(html.contains("<option value=\"gloss\" selected>Gloss</option>"));
        assert!(html.contains("<option value=\"matte\">Matte</option>"));
    }

    #[test]
    fn test_radio_checked_state() {
        let mut f = field("color", FieldType::Radio);
        f.options = options(&[("Red", "red"), ("Blue", "blue")]);
        let mut form = FormState::new();
        form.set_value("color", FieldValue::text("blue"));
        let html = render_field(&f, &form);
        assert!(html.contains("value=\"blue\" checked"));
        assert!(!html.contains("value=\"red\" checked"));
    }

    #[test]
    fn test_checkbox_membership() {
        let mut f = field("extras", FieldType::Checkbox);
        f.options = options(&[("Rounded", "rounded"), ("Foil", "foil")]);
        let mut form = FormState::new();
        form.set_value("extras", FieldValue::Many(vec!["foil".into()]));
        let html = render_field(&f, &form);
        assert!(html.contains("name=\"extras[]\""));
        assert!(html.contains("value=\"foil\" checked"));
        assert!(!html.contains("value=\"rounded\" checked"));
    }

    #[test]
    fn test_file_field_states() {
        let f = field("artwork", FieldType::File);
        let empty = render_field(&f, &FormState::new());
        assert!(empty.contains("No file chosen"));
        assert!(empty.contains("accept=\".pdf,.png,.jpg,.jpeg,.ai,.eps\""));
        assert!(!empty.contains("has-file"));

        let mut form = FormState::new();
        form.record_upload(
            "artwork",
            UploadedFile {
                name: "logo.pdf".into(),
                url: "https://cdn.example/logo.pdf".into(),
            },
        );
        let with_file = render_field(&f, &form);
        assert!(with_file.contains("has-file"));
        assert!(with_file.contains("logo.pdf"));
    }

    #[test]
    fn test_error_slot() {
        let f = field("qty", FieldType::Number);
        let empty = render_field(&f, &FormState::new());
        assert!(empty.contains("<div class=\"error-message\"></div>"));

        let mut form = FormState::new();
        form.set_error("qty", "This field is required");
        let with_error = render_field(&f, &form);
        assert!(with_error.contains("<div class=\"error-message\">This field is required</div>"));
        assert!(with_error.contains("class=\"error\""));
    }

    #[test]
    fn test_step_and_progress() {
        let steps = vec![
            Step {
                title: "Size".to_string(),
                fields: vec![field("width", FieldType::Number)],
            },
            Step {
                title: "Artwork".to_string(),
                fields: vec![],
            },
            Step {
                title: "Review".to_string(),
                fields: vec![],
            },
        ];
        let html = render_step(&steps[0], &FormState::new());
        assert!(html.contains("<h3 class=\"step-title\">Size</h3>"));
        assert!(html.contains("data-field-name=\"width\""));

        // Empty steps still render a body
        let empty = render_step(&steps[1], &FormState::new());
        assert!(empty.contains("calculator-fields"));

        let progress = render_progress(&steps, 1);
        assert!(progress.contains("step-indicator completed\" data-step=\"0\""));
        assert!(progress.contains("step-indicator active\" data-step=\"1\""));
        assert!(progress.contains("step-indicator\" data-step=\"2\""));
    }

    #[test]
    fn test_outcome_panels() {
        let success = render_success("Added!", "https://shop.example/cart");
        assert!(success.contains("Added!"));
        assert!(success.contains("href=\"https://shop.example/cart\""));

        let failure = render_failure("Out of stock");
        assert!(failure.contains("Error: Out of stock"));
        assert!(failure.contains("btn-retry"));

        assert!(render_submitting().contains("Adding to cart..."));
    }
}
