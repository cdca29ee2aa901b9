use tracing::{debug, info};

use crate::config::{CalculatorConfig, ConfigError, FieldType, Step};
use crate::formula::Evaluator;
use crate::gateway::{
    CartGateway, CartReceipt, GatewayError, SubmitRequest, UploadGateway, UploadReceipt,
    UploadRequest, ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES,
};
use crate::render;
use crate::state::{FieldValue, FormState, UploadedFile};
use crate::validate::validate_step;

const UPLOAD_TYPE_MESSAGE: &str = "Invalid file type. Please upload PDF, PNG, JPG, AI, or EPS.";
const UPLOAD_SIZE_MESSAGE: &str = "File size exceeds 10MB limit.";
const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";
const SUBMIT_FAILED_MESSAGE: &str = "An error occurred. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Collecting values; the step index lives in the form state.
    Step,
    Submitting,
    Succeeded(CartReceipt),
    Failed(String),
}

/// Outcome of an advance attempt.
#[derive(Debug, PartialEq)]
pub enum Advance {
    /// Validation failed (or the machine was busy); errors are populated.
    Stayed,
    /// Moved to the next step.
    Moved,
    /// Last step validated: the machine is now `Submitting` and the caller
    /// must drive this payload through a cart gateway.
    Submit(SubmitRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Active,
    Pending,
}

/// The wizard orchestrator: owns the form state, drives navigation,
/// validation, price recompute, the upload sub-protocol, and submission.
/// Rendering and formula evaluation stay pure; this is the only component
/// with mutable state, and gateway calls are its only side effects.
pub struct Calculator {
    config: CalculatorConfig,
    form: FormState,
    phase: Phase,
    evaluator: Evaluator,
    // Sticky last-good price: evaluation failures leave it untouched.
    displayed_price: Option<f64>,
    pending_submit: Option<SubmitRequest>,
}

impl Calculator {
    pub fn new(config: CalculatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut calculator = Self {
            config,
            form: FormState::new(),
            phase: Phase::Step,
            evaluator: Evaluator::new(),
            displayed_price: None,
            pending_submit: None,
        };
        // Price shows from the first render, before any input arrives
        calculator.recompute_price();
        Ok(calculator)
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn current_step(&self) -> &Step {
        &self.config.steps[self.form.current_step]
    }

    pub fn at_last_step(&self) -> bool {
        self.form.current_step == self.config.last_step_index()
    }

    pub fn can_go_previous(&self) -> bool {
        self.phase == Phase::Step && self.form.current_step > 0
    }

    /// Front-end-originated field error, e.g. a file the preview could not
    /// read before it ever reached the gateway.
    pub fn set_field_error(&mut self, field: &str, message: impl Into<String>) {
        self.form.set_error(field, message);
    }

    pub fn receipt(&self) -> Option<&CartReceipt> {
        match &self.phase {
            Phase::Succeeded(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// Record an edit: latest value wins, the field's error clears, and the
    /// price recomputes when enabled. Ignored outside the collecting phase.
    pub fn edit(&mut self, name: &str, value: FieldValue) {
        if self.phase != Phase::Step {
            return;
        }
        self.form.set_value(name, value);
        self.recompute_price();
    }

    /// Go back one step. Never validates.
    pub fn previous(&mut self) -> bool {
        if !self.can_go_previous() {
            return false;
        }
        self.form.current_step -= 1;
        self.form.clear_all_errors();
        true
    }

    /// Validate the step being left, then move forward or begin submission.
    pub fn advance(&mut self) -> Advance {
        if self.phase != Phase::Step {
            return Advance::Stayed;
        }

        let validation = validate_step(self.current_step(), self.form.values());
        if !validation.valid() {
            for (name, message) in validation.errors {
                self.form.set_error(&name, message);
            }
            return Advance::Stayed;
        }

        if !self.at_last_step() {
            self.form.current_step += 1;
            self.form.clear_all_errors();
            return Advance::Moved;
        }

        let request = self.build_submit_request();
        self.phase = Phase::Submitting;
        self.pending_submit = Some(request.clone());
        Advance::Submit(request)
    }

    fn build_submit_request(&self) -> SubmitRequest {
        // Quantity rides along from a field literally named "quantity"
        let quantity = self
            .form
            .value("quantity")
            .and_then(FieldValue::as_number)
            .map(|n| n.trunc())
            .filter(|n| *n >= 1.0)
            .map(|n| n as u64)
            .unwrap_or(1);
        SubmitRequest {
            product_id: self.config.product_id,
            quantity,
            values: self.form.values().clone(),
        }
    }

    /// Apply the submission outcome. Ignored unless a submission is in
    /// flight, which also makes duplicate completions harmless.
    pub fn complete_submit(&mut self, outcome: Result<CartReceipt, GatewayError>) {
        if self.phase != Phase::Submitting {
            return;
        }
        match outcome {
            Ok(receipt) => {
                info!(product_id = self.config.product_id, "added to cart");
                self.pending_submit = None;
                self.phase = Phase::Succeeded(receipt);
            }
            Err(err) => {
                let message = match err {
                    GatewayError::Rejected { message } => message,
                    other => {
                        debug!(%other, "cart submission failed");
                        SUBMIT_FAILED_MESSAGE.to_string()
                    }
                };
                self.phase = Phase::Failed(message);
            }
        }
    }

    /// Re-enter `Submitting`, re-issuing the identical payload.
    pub fn retry(&mut self) -> Option<SubmitRequest> {
        if !matches!(self.phase, Phase::Failed(_)) {
            return None;
        }
        let request = self.pending_submit.clone()?;
        self.phase = Phase::Submitting;
        Some(request)
    }

    /// Start a file upload: client-side extension/size fast path, then the
    /// per-field busy flag. Returns the request to put on the wire, or None
    /// when the file was rejected locally or an upload is already pending.
    pub fn begin_upload(
        &mut self,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Option<UploadRequest> {
        let is_file_field = self
            .config
            .field(field)
            .map(|f| f.field_type == FieldType::File)
            .unwrap_or(false);
        if !is_file_field || self.phase != Phase::Step {
            return None;
        }

        if !extension_allowed(file_name) {
            self.form.set_error(field, UPLOAD_TYPE_MESSAGE);
            return None;
        }
        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            self.form.set_error(field, UPLOAD_SIZE_MESSAGE);
            return None;
        }
        if !self.form.mark_uploading(field) {
            return None;
        }

        Some(UploadRequest {
            field: field.to_string(),
            file_name: file_name.to_string(),
            bytes,
        })
    }

    /// Apply an upload outcome, keyed by field name so a slow response can
    /// never land on the wrong field. Completions for fields with no pending
    /// upload are discarded.
    pub fn complete_upload(&mut self, field: &str, outcome: Result<UploadReceipt, GatewayError>) {
        if !self.form.finish_uploading(field) {
            debug!(field, "dropping stale upload completion");
            return;
        }
        match outcome {
            Ok(receipt) => {
                self.form.record_upload(
                    field,
                    UploadedFile {
                        name: receipt.display_name,
                        url: receipt.url,
                    },
                );
            }
            Err(err) => {
                let message = match err {
                    GatewayError::Rejected { message } => message,
                    other => {
                        debug!(field, %other, "upload failed");
                        UPLOAD_FAILED_MESSAGE.to_string()
                    }
                };
                self.form.set_error(field, message);
            }
        }
    }

    /// Drive a full upload through a gateway.
    pub async fn upload_file(
        &mut self,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
        gateway: &dyn UploadGateway,
    ) {
        let Some(request) = self.begin_upload(field, file_name, bytes) else {
            return;
        };
        let outcome = gateway.upload(&request).await;
        self.complete_upload(field, outcome);
    }

    /// Advance, and when that starts a submission, drive it through the
    /// gateway to completion.
    pub async fn advance_via(&mut self, gateway: &dyn CartGateway) -> &Phase {
        if let Advance::Submit(request) = self.advance() {
            let outcome = gateway.submit(&request).await;
            self.complete_submit(outcome);
        }
        &self.phase
    }

    /// Retry a failed submission through the gateway.
    pub async fn retry_via(&mut self, gateway: &dyn CartGateway) -> &Phase {
        if let Some(request) = self.retry() {
            let outcome = gateway.submit(&request).await;
            self.complete_submit(outcome);
        }
        &self.phase
    }

    fn recompute_price(&mut self) {
        if !self.config.price_calculation.enabled {
            return;
        }
        match self
            .evaluator
            .evaluate(&self.config.price_calculation.formula, self.form.values())
        {
            Ok(price) => self.displayed_price = Some(price),
            // Silent by design: keep the last good price, log for diagnostics
            Err(err) => debug!(%err, "price formula evaluation failed"),
        }
    }

    /// Formatted price for display, present only when price calculation is
    /// enabled. Starts at $0.00 until a formula evaluation succeeds.
    pub fn price_text(&self) -> Option<String> {
        if !self.config.price_calculation.enabled {
            return None;
        }
        Some(format!("${:.2}", self.displayed_price.unwrap_or(0.0)))
    }

    pub fn step_statuses(&self) -> Vec<StepStatus> {
        (0..self.config.steps.len())
            .map(|index| {
                if index < self.form.current_step {
                    StepStatus::Completed
                } else if index == self.form.current_step {
                    StepStatus::Active
                } else {
                    StepStatus::Pending
                }
            })
            .collect()
    }

    /// Content-area markup for the current state.
    pub fn render(&self) -> String {
        match &self.phase {
            Phase::Step => render::render_step(self.current_step(), &self.form),
            Phase::Submitting => render::render_submitting(),
            Phase::Succeeded(receipt) => {
                render::render_success(&receipt.message, &receipt.cart_url)
            }
            Phase::Failed(message) => render::render_failure(message),
        }
    }
}

fn extension_allowed(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::UploadReceipt;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn config(json: &str) -> CalculatorConfig {
        serde_json::from_str(json).unwrap()
    }

    fn one_step_config() -> CalculatorConfig {
        config(
            r#"{
                "productId": 42,
                "steps": [
                    { "title": "Details", "fields": [
                        { "name": "qty", "type": "number", "label": "Quantity", "required": true }
                    ]}
                ],
                "priceCalculation": { "enabled": true, "formula": "qty * 2" }
            }"#,
        )
    }

    fn two_step_config() -> CalculatorConfig {
        config(
            r#"{
                "productId": 42,
                "steps": [
                    { "title": "Size", "fields": [
                        { "name": "width", "type": "number", "label": "Width", "required": true }
                    ]},
                    { "title": "Artwork", "fields": [
                        { "name": "artwork", "type": "file", "label": "Artwork" }
                    ]}
                ]
            }"#,
        )
    }

    /// Cart gateway with a scripted outcome per call; records every payload.
    struct ScriptedCart {
        script: Mutex<Vec<Result<CartReceipt, GatewayError>>>,
        requests: Mutex<Vec<SubmitRequest>>,
    }

    impl ScriptedCart {
        fn new(script: Vec<Result<CartReceipt, GatewayError>>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Mutex::new(script),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn ok() -> Result<CartReceipt, GatewayError> {
            Ok(CartReceipt {
                message: "Product added to cart successfully!".into(),
                cart_url: "https://shop.example/cart".into(),
                cart_item_count: Some(1),
            })
        }

        fn requests(&self) -> Vec<SubmitRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CartGateway for ScriptedCart {
        async fn submit(&self, request: &SubmitRequest) -> Result<CartReceipt, GatewayError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script.lock().unwrap().pop().unwrap_or_else(Self::ok)
        }
    }

    /// Upload gateway that counts calls and returns a fixed receipt.
    struct CountingUploads {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingUploads {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UploadGateway for CountingUploads {
        async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GatewayError::Rejected {
                    message: "File too large".into(),
                })
            } else {
                Ok(UploadReceipt {
                    url: format!("https://cdn.example/{}", request.file_name),
                    display_name: request.file_name.clone(),
                })
            }
        }
    }

    #[test]
    fn test_starts_at_first_step() {
        let calc = Calculator::new(two_step_config()).unwrap();
        assert_eq!(calc.form().current_step, 0);
        assert!(!calc.can_go_previous());
        assert_eq!(
            calc.step_statuses(),
            vec![StepStatus::Active, StepStatus::Pending]
        );
    }

    #[test]
    fn test_previous_is_noop_at_first_step() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        assert!(!calc.previous());
        assert_eq!(calc.form().current_step, 0);
    }

    #[test]
    fn test_advance_blocked_by_required_field() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        assert_eq!(calc.advance(), Advance::Stayed);
        assert_eq!(calc.form().error("width"), Some("This field is required"));
        assert_eq!(calc.form().current_step, 0);

        // Editing the field clears its error; advance then succeeds
        calc.edit("width", FieldValue::text("120"));
        assert_eq!(calc.form().error("width"), None);
        assert_eq!(calc.advance(), Advance::Moved);
        assert_eq!(calc.form().current_step, 1);
        assert!(calc.can_go_previous());
        assert_eq!(
            calc.step_statuses(),
            vec![StepStatus::Completed, StepStatus::Active]
        );
    }

    #[test]
    fn test_navigation_drops_displayed_errors() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        calc.edit("width", FieldValue::text("120"));
        calc.advance();
        calc.set_field_error("artwork", "Upload failed. Please try again.");
        assert!(calc.previous());
        assert!(!calc.form().has_errors());
    }

    #[test]
    fn test_price_recompute_on_edit() {
        let mut calc = Calculator::new(one_step_config()).unwrap();
        assert_eq!(calc.price_text().as_deref(), Some("$0.00"));
        calc.edit("qty", FieldValue::text("5"));
        assert_eq!(calc.price_text().as_deref(), Some("$10.00"));
    }

    #[test]
    fn test_price_sticky_on_evaluation_failure() {
        let mut cfg = one_step_config();
        cfg.price_calculation.formula = "10 / qty".to_string();
        let mut calc = Calculator::new(cfg).unwrap();
        calc.edit("qty", FieldValue::text("2"));
        assert_eq!(calc.price_text().as_deref(), Some("$5.00"));
        // Division by zero: previous price stays on display
        calc.edit("qty", FieldValue::text("0"));
        assert_eq!(calc.price_text().as_deref(), Some("$5.00"));
    }

    #[test]
    fn test_price_absent_when_disabled() {
        let calc = Calculator::new(two_step_config()).unwrap();
        assert_eq!(calc.price_text(), None);
    }

    #[test]
    fn test_zero_step_config_rejected() {
        let cfg = config(r#"{ "productId": 1, "steps": [] }"#);
        assert!(matches!(Calculator::new(cfg), Err(ConfigError::NoSteps)));
    }

    #[tokio::test]
    async fn test_submit_success_end_to_end() {
        let mut calc = Calculator::new(one_step_config()).unwrap();
        calc.edit("qty", FieldValue::text("5"));
        assert_eq!(calc.price_text().as_deref(), Some("$10.00"));

        let cart = ScriptedCart::new(vec![ScriptedCart::ok()]);
        let phase = calc.advance_via(&cart).await;
        assert!(matches!(phase, Phase::Succeeded(_)));

        let requests = cart.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].product_id, 42);
        assert_eq!(requests[0].quantity, 1);
        assert_eq!(
            requests[0].values.get("qty"),
            Some(&FieldValue::text("5"))
        );

        let html = calc.render();
        assert!(html.contains("Added to Cart!"));
        assert!(html.contains("https://shop.example/cart"));
        assert_eq!(calc.receipt().unwrap().cart_item_count, Some(1));
    }

    #[tokio::test]
    async fn test_submit_failure_then_retry_replays_payload() {
        let mut calc = Calculator::new(one_step_config()).unwrap();
        calc.edit("qty", FieldValue::text("5"));

        let cart = ScriptedCart::new(vec![
            Err(GatewayError::Rejected {
                message: "Out of stock".into(),
            }),
            ScriptedCart::ok(),
        ]);

        let phase = calc.advance_via(&cart).await;
        assert_eq!(*phase, Phase::Failed("Out of stock".to_string()));
        assert!(calc.render().contains("Error: Out of stock"));

        let phase = calc.retry_via(&cart).await;
        assert!(matches!(phase, Phase::Succeeded(_)));

        let requests = cart.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn test_timeout_reported_as_failure() {
        let mut calc = Calculator::new(one_step_config()).unwrap();
        calc.edit("qty", FieldValue::text("5"));
        let cart = ScriptedCart::new(vec![Err(GatewayError::Timeout)]);
        let phase = calc.advance_via(&cart).await;
        assert_eq!(
            *phase,
            Phase::Failed("An error occurred. Please try again.".to_string())
        );
    }

    #[test]
    fn test_quantity_field_rides_along() {
        let cfg = config(
            r#"{
                "productId": 7,
                "steps": [
                    { "title": "Details", "fields": [
                        { "name": "quantity", "type": "number", "label": "Quantity" }
                    ]}
                ]
            }"#,
        );
        let mut calc = Calculator::new(cfg).unwrap();
        calc.edit("quantity", FieldValue::text("3"));
        assert_eq!(calc.advance(), Advance::Submit(SubmitRequest {
            product_id: 7,
            quantity: 3,
            values: calc.form().values().clone(),
        }));
    }

    #[test]
    fn test_quantity_defaults_to_one() {
        let mut calc = Calculator::new(one_step_config()).unwrap();
        calc.edit("qty", FieldValue::text("5"));
        match calc.advance() {
            Advance::Submit(request) => assert_eq!(request.quantity, 1),
            other => panic!("expected submission, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_extension_locally() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        calc.edit("width", FieldValue::text("120"));
        calc.advance();

        let uploads = CountingUploads::new();
        calc.upload_file("artwork", "virus.exe", vec![0; 10], &uploads)
            .await;
        assert_eq!(uploads.calls(), 0);
        assert_eq!(
            calc.form().error("artwork"),
            Some("Invalid file type. Please upload PDF, PNG, JPG, AI, or EPS.")
        );
        assert_eq!(calc.form().value("artwork"), None);
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_file_locally() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        calc.edit("width", FieldValue::text("120"));
        calc.advance();

        let uploads = CountingUploads::new();
        let bytes = vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize];
        calc.upload_file("artwork", "big.pdf", bytes, &uploads).await;
        assert_eq!(uploads.calls(), 0);
        assert_eq!(
            calc.form().error("artwork"),
            Some("File size exceeds 10MB limit.")
        );
    }

    #[tokio::test]
    async fn test_upload_success_stores_url_and_name() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        calc.edit("width", FieldValue::text("120"));
        calc.advance();

        let uploads = CountingUploads::new();
        calc.upload_file("artwork", "logo.pdf", vec![1, 2, 3], &uploads)
            .await;
        assert_eq!(uploads.calls(), 1);
        assert_eq!(
            calc.form().value("artwork"),
            Some(&FieldValue::text("https://cdn.example/logo.pdf"))
        );
        assert_eq!(calc.form().uploaded("artwork").unwrap().name, "logo.pdf");
        assert!(!calc.form().upload_in_flight("artwork"));
    }

    #[tokio::test]
    async fn test_upload_failure_sets_field_error_only() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        calc.edit("width", FieldValue::text("120"));
        calc.advance();

        let uploads = CountingUploads::failing();
        calc.upload_file("artwork", "logo.pdf", vec![1], &uploads).await;
        assert_eq!(calc.form().error("artwork"), Some("File too large"));
        assert_eq!(calc.form().value("artwork"), None);
    }

    #[test]
    fn test_upload_busy_flag_blocks_reentry() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        calc.edit("width", FieldValue::text("120"));
        calc.advance();

        let first = calc.begin_upload("artwork", "logo.pdf", vec![1]);
        assert!(first.is_some());
        // Second selection while the first is still in flight is ignored
        let second = calc.begin_upload("artwork", "other.pdf", vec![2]);
        assert!(second.is_none());

        calc.complete_upload(
            "artwork",
            Ok(UploadReceipt {
                url: "https://cdn.example/logo.pdf".into(),
                display_name: "logo.pdf".into(),
            }),
        );
        assert_eq!(calc.form().uploaded("artwork").unwrap().name, "logo.pdf");
    }

    #[test]
    fn test_stale_upload_completion_discarded() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        calc.edit("width", FieldValue::text("120"));
        calc.advance();

        // No upload in flight: the completion must not touch the form
        calc.complete_upload(
            "artwork",
            Ok(UploadReceipt {
                url: "https://cdn.example/stray.pdf".into(),
                display_name: "stray.pdf".into(),
            }),
        );
        assert_eq!(calc.form().value("artwork"), None);
        assert!(!calc.form().has_errors());
    }

    #[test]
    fn test_upload_ignored_for_non_file_field() {
        let mut calc = Calculator::new(two_step_config()).unwrap();
        assert!(calc.begin_upload("width", "logo.pdf", vec![1]).is_none());
        assert!(!calc.form().has_errors());
    }

    #[test]
    fn test_edits_ignored_while_submitting() {
        let mut calc = Calculator::new(one_step_config()).unwrap();
        calc.edit("qty", FieldValue::text("5"));
        assert!(matches!(calc.advance(), Advance::Submit(_)));
        assert_eq!(*calc.phase(), Phase::Submitting);

        // Busy: further advances and edits are ignored
        assert_eq!(calc.advance(), Advance::Stayed);
        calc.edit("qty", FieldValue::text("9"));
        assert_eq!(calc.form().value("qty"), Some(&FieldValue::text("5")));
        assert!(calc.render().contains("Adding to cart..."));
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut calc = Calculator::new(one_step_config()).unwrap();
        assert!(calc.retry().is_none());
        calc.edit("qty", FieldValue::text("5"));
        assert!(matches!(calc.advance(), Advance::Submit(_)));
        assert!(calc.retry().is_none());

        calc.complete_submit(Err(GatewayError::Rejected {
            message: "Out of stock".into(),
        }));
        let replay = calc.retry().expect("retry from failed");
        assert_eq!(replay.product_id, 42);
        assert_eq!(*calc.phase(), Phase::Submitting);
    }

    #[test]
    fn test_checkbox_edit_keeps_array_shape() {
        let cfg = config(
            r#"{
                "productId": 9,
                "steps": [
                    { "title": "Extras", "fields": [
                        { "name": "extras", "type": "checkbox", "label": "Extras", "required": true,
                          "options": [
                            { "label": "Foil", "value": "foil" },
                            { "label": "Rounded", "value": "rounded" }
                          ] }
                    ]}
                ]
            }"#,
        );
        let mut calc = Calculator::new(cfg).unwrap();
        calc.edit("extras", FieldValue::Many(vec!["foil".into()]));
        // Removing the last checked option leaves an empty array, which
        // fails required-validation
        calc.edit("extras", FieldValue::Many(vec![]));
        assert_eq!(calc.advance(), Advance::Stayed);
        assert_eq!(calc.form().error("extras"), Some("This field is required"));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert!(extension_allowed("logo.PDF"));
        assert!(extension_allowed("photo.JpG"));
        assert!(!extension_allowed("archive.zip"));
        assert!(!extension_allowed("no_extension"));
    }
}
