//! Biocompat CLI - Simulate biometric authentication dispatch
//!
//! Runs requests against scripted back-ends and prints the callback sequence
//! a caller would observe, exactly as it arrives on the delivery thread.

mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use biocompat_core::{
    classify_platform_code, taxonomy::error_code_name, AuthRequest, AuthenticationCallback,
    AuthenticationFailureReason, AuthenticationHelpReason, BiometricApi, BiometricContext,
    BiometricMethod, BiometricType, DispatchMode, Dispatcher, DispatcherConfig, PromptInfo,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use script::ModuleScript;

#[derive(Parser)]
#[command(name = "biocompat")]
#[command(about = "Biometric compatibility dispatch simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file; created with defaults when missing
    #[arg(long, global = true, env = "BIOCOMPAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log every vendor event
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every known biometric method
    Methods {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one authentication request against scripted back-ends
    Simulate {
        /// Back-end script: <method>=<segment>/<segment>/...
        #[arg(short, long = "module", required = true)]
        modules: Vec<ModuleScript>,

        /// Sensor category to request
        #[arg(long, default_value = "any")]
        category: BiometricType,

        /// API family to request
        #[arg(long, default_value = "auto")]
        api: BiometricApi,

        /// Pin one method instead of automatic selection
        #[arg(long)]
        pin: Option<BiometricMethod>,

        /// Run all candidates at once instead of one after another
        #[arg(long)]
        concurrent: bool,

        /// Override the configured restart cap
        #[arg(long)]
        max_restarts: Option<u32>,

        /// Delay between scripted vendor events (milliseconds)
        #[arg(long, default_value_t = 50)]
        step_ms: u64,

        /// Cancel the request after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how platform error codes are classified
    Classify {
        /// Platform error codes
        #[arg(required = true, allow_negative_numbers = true)]
        codes: Vec<i32>,
    },
}

/// Prints every callback with the thread it ran on
struct PrintingCallback;

impl PrintingCallback {
    fn print(&self, event: &str) {
        let current = thread::current();
        println!("[{}] {}", current.name().unwrap_or("unnamed"), event);
    }
}

impl AuthenticationCallback for PrintingCallback {
    fn on_ui_opened(&self) {
        self.print("on_ui_opened");
    }

    fn on_ui_closed(&self) {
        self.print("on_ui_closed");
    }

    fn on_succeeded(&self) {
        self.print("on_succeeded");
    }

    fn on_canceled(&self) {
        self.print("on_canceled");
    }

    fn on_failed(&self, reason: AuthenticationFailureReason) {
        self.print(&format!("on_failed({})", reason));
    }

    fn on_help(&self, reason: AuthenticationHelpReason, message: &str) {
        self.print(&format!("on_help({:?}) {}", reason, message));
    }
}

fn load_config(path: Option<&Path>) -> Result<DispatcherConfig> {
    let Some(path) = path else {
        return Ok(DispatcherConfig::default());
    };

    if path.exists() {
        return DispatcherConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let config = DispatcherConfig::default();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    config.save(path)?;
    info!("Created default config at {:?}", path);
    Ok(config)
}

fn print_methods(json: bool) -> Result<()> {
    if json {
        let rows: Vec<_> = BiometricMethod::all()
            .iter()
            .map(|m| {
                serde_json::json!({
                    "id": m.id(),
                    "name": m.name(),
                    "type": m.biometric_type(),
                    "api": m.api(),
                    "priority": m.priority(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:>4}  {:<22} {:<12} {:<8} {:>8}", "ID", "NAME", "TYPE", "API", "PRIORITY");
    for method in BiometricMethod::all() {
        println!(
            "{:>4}  {:<22} {:<12} {:<8} {:>8}",
            method.id(),
            method.name(),
            method.biometric_type(),
            method.api(),
            method.priority()
        );
    }
    Ok(())
}

fn print_classification(codes: &[i32]) {
    for &code in codes {
        let kind = classify_platform_code(code);
        let reason = kind
            .reason()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "(canceled)".to_string());
        println!("{:>4}  {:<36} {:<22} {:?}", code, error_code_name(code), reason, kind);
    }
}

async fn simulate(
    config: DispatcherConfig,
    modules: Vec<ModuleScript>,
    request: AuthRequest,
    step: Duration,
    cancel_after: Option<Duration>,
    json: bool,
) -> Result<()> {
    let mut builder = BiometricContext::builder().config(config);
    for script in modules {
        builder = builder.module(Arc::new(script.into_module(step)));
    }
    let context = builder.build()?;
    context.init().await;

    info!("Available requests: {}", context.available_auth_requests().len());
    println!("Request: {}", request);

    let prompt = PromptInfo::builder()
        .title("Simulated sign-in")
        .negative_button_text("Cancel")
        .build()?;

    let dispatcher = Dispatcher::new(context.clone());
    let handle = dispatcher.authenticate(request, prompt, Arc::new(PrintingCallback));

    if let Some(delay) = cancel_after {
        let token = handle.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        });
    }

    let outcome = handle.outcome().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Outcome: {}", outcome);
    }

    for method in context.methods() {
        if let Some(remaining) = context.lockouts().remaining(method) {
            println!("Locked out: {} ({}s remaining)", method, remaining.as_secs());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "biocompat=debug,biocompat_core=debug"
    } else {
        "biocompat=info,biocompat_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Methods { json } => print_methods(json)?,

        Commands::Classify { codes } => print_classification(&codes),

        Commands::Simulate {
            modules,
            category,
            api,
            pin,
            concurrent,
            max_restarts,
            step_ms,
            cancel_after_ms,
            json,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if concurrent {
                config.dispatch_mode = DispatchMode::Concurrent;
            }
            if let Some(max) = max_restarts {
                config.max_restarts = max;
            }

            let request = match pin {
                Some(method) => AuthRequest::pinned(method),
                None => AuthRequest::new(api, category),
            };

            simulate(
                config,
                modules,
                request,
                Duration::from_millis(step_ms),
                cancel_after_ms.map(Duration::from_millis),
                json,
            )
            .await?;
        }
    }

    Ok(())
}
