use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use vocalis::{
    create_router, AppState, Config, ToolAction, ToolDeclaration, ToolError, ToolRegistry,
    VoiceSession,
};

#[derive(Debug, Parser)]
#[command(name = "vocalis", about = "Real-time voice session engine")]
struct Cli {
    /// Config file name (without extension), resolved by the config crate
    #[arg(long, default_value = "config/vocalis")]
    config: String,
}

/// Demo appointment-booking action. The engine only sees the async contract;
/// a real deployment injects its own integrations here.
struct BookAppointment;

#[async_trait]
impl ToolAction for BookAppointment {
    fn required_args(&self) -> &[&str] {
        &["service", "time"]
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let service = args["service"].as_str().unwrap_or("appointment");
        let time = args["time"].as_str().unwrap_or("the requested time");
        let name = args["name"].as_str().unwrap_or("the caller");
        info!("booking {service} at {time} for {name}");
        Ok(serde_json::json!({
            "confirmed": true,
            "summary": format!("{service} booked for {name} at {time}"),
        }))
    }
}

fn booking_declaration() -> ToolDeclaration {
    ToolDeclaration {
        name: "book_appointment".to_string(),
        description: "Book an appointment for the caller".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "service": { "type": "string", "description": "Which service to book" },
                "time": { "type": "string", "description": "Requested date and time" },
                "name": { "type": "string", "description": "Caller name" },
            },
            "required": ["service", "time"],
        }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;
    if cfg.live.api_key.is_empty() {
        cfg.live.api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    }
    if cfg.live.api_key.is_empty() {
        warn!("no API key configured; set GEMINI_API_KEY or live.api_key");
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("model: {}", cfg.live.model);

    let mut registry = ToolRegistry::new();
    registry.register(booking_declaration(), Arc::new(BookAppointment));

    let engine = Arc::new(VoiceSession::new(
        cfg.live.clone(),
        cfg.audio.clone(),
        cfg.tools.failure_policy,
        registry,
    ));

    let state = AppState::new(engine);
    let router = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP control surface listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
