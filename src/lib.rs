//! calcwiz
//!
//! Multi-step product calculator widget engine: an admin-configured step
//! wizard that collects typed field values, derives a live price from an
//! arithmetic formula over those values, and submits the result to a cart
//! backend as line-item metadata. Rendering and formula evaluation are pure;
//! the state machine owns all mutation and talks to the network only through
//! the gateway traits.

pub mod calculator;
pub mod config;
pub mod formula;
pub mod gateway;
pub mod output;
pub mod render;
pub mod state;
pub mod tui;
pub mod validate;

pub use calculator::{Advance, Calculator, Phase, StepStatus};
pub use config::{CalculatorConfig, ConfigError, Field, FieldOption, FieldType, Step};
pub use formula::{Evaluator, FormulaError};
pub use gateway::{CartGateway, CartReceipt, GatewayError, SubmitRequest, UploadGateway};
pub use state::{FieldValue, FormState, UploadedFile};
pub use validate::{validate_step, StepValidation};
