use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

use calcwiz::calculator::Calculator;
use calcwiz::config::CalculatorConfig;
use calcwiz::gateway::{
    CartGateway, DryRunGateway, HttpCartGateway, HttpUploadGateway, UploadGateway,
    DEFAULT_TIMEOUT,
};
use calcwiz::{output, tui};

#[derive(Parser, Debug)]
#[command(name = "calcwiz")]
#[command(about = "Preview a product calculator configuration interactively")]
struct Args {
    /// Calculator config: a JSON file path, or a name resolved from
    /// .calcwiz/ and the user config directory
    #[arg(required = true)]
    config: String,

    /// Upload endpoint; omit to run uploads against a local dry-run gateway
    #[arg(long)]
    upload_url: Option<Url>,

    /// Cart endpoint; omit to run submissions against a local dry-run gateway
    #[arg(long)]
    cart_url: Option<Url>,

    /// Request timeout for both endpoints, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Print the parsed configuration and exit
    #[arg(long)]
    debug: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match CalculatorConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            if let calcwiz::ConfigError::NotFound { searched, .. } = &err {
                eprintln!();
                eprintln!("Create a config file at one of:");
                for path in searched {
                    eprintln!("  {}", path.display());
                }
            }
            std::process::exit(1);
        }
    };

    if args.debug {
        eprintln!("=== {} (product {}) ===", config.title, config.product_id);
        for (index, step) in config.steps.iter().enumerate() {
            eprintln!("step {}: {} ({} fields)", index, step.title, step.fields.len());
            for field in &step.fields {
                eprintln!("  {:?} {} required={}", field.field_type, field.name, field.required);
            }
        }
        if config.price_calculation.enabled {
            eprintln!("price formula: {}", config.price_calculation.formula);
        }
        return;
    }

    let calculator = match Calculator::new(config) {
        Ok(calculator) => calculator,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {}", err);
            std::process::exit(1);
        }
    };

    let timeout = Duration::from_secs(args.timeout_secs);
    let dry_run = DryRunGateway::new();

    let http_uploads = match &args.upload_url {
        Some(endpoint) => match HttpUploadGateway::new(endpoint.clone(), timeout) {
            Ok(gateway) => Some(gateway),
            Err(err) => {
                eprintln!("Failed to build upload gateway: {}", err);
                std::process::exit(1);
            }
        },
        None => None,
    };
    let http_cart = match &args.cart_url {
        Some(endpoint) => match HttpCartGateway::new(endpoint.clone(), timeout) {
            Ok(gateway) => Some(gateway),
            Err(err) => {
                eprintln!("Failed to build cart gateway: {}", err);
                std::process::exit(1);
            }
        },
        None => None,
    };

    let uploads: &dyn UploadGateway = http_uploads
        .as_ref()
        .map(|g| g as &dyn UploadGateway)
        .unwrap_or(&dry_run);
    let cart: &dyn CartGateway = http_cart
        .as_ref()
        .map(|g| g as &dyn CartGateway)
        .unwrap_or(&dry_run);

    match tui::run(calculator, uploads, cart, &runtime) {
        Ok(Some((payload, mode))) => {
            if let Err(err) = output::handle_output(&payload, mode) {
                eprintln!("Error: {}", err);
                std::process::exit(1);
            }
        }
        Ok(None) => {
            // User quit without completing the wizard
        }
        Err(err) => {
            eprintln!("Terminal error: {}", err);
            std::process::exit(1);
        }
    }
}
