use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose debug output drowns the analyzer's own logs
const QUIET_TARGETS: [&str; 3] = ["hyper=warn", "reqwest=warn", "h2=warn"];

/// Where log events are shipped in addition to stdout
#[derive(Debug, Clone, PartialEq)]
pub enum LogSink {
    Console,
    Loki { url: String },
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub sink: LogSink,
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, String> {
        let loki_enabled = std::env::var("LOKI_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let sink = match (loki_enabled, std::env::var("LOKI_URL").ok()) {
            (false, _) => LogSink::Console,
            (true, Some(url)) if !url.trim().is_empty() => LogSink::Loki { url },
            (true, _) => return Err("LOKI_ENABLED is true but LOKI_URL is not set".to_string()),
        };

        Ok(Self {
            sink,
            service_name: std::env::var("SERVICE_NAME").unwrap_or_else(|_| "riskfolio".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Filter directive: the configured level plus quieted HTTP client internals.
    /// Explicit per-crate directives in RUST_LOG win over the defaults.
    pub fn filter_directive(&self) -> String {
        let mut directives = vec![self.log_level.clone()];
        for quiet in QUIET_TARGETS {
            let target = quiet.split('=').next().unwrap_or(quiet);
            if !self.log_level.contains(&format!("{}=", target)) {
                directives.push(quiet.to_string());
            }
        }
        directives.join(",")
    }
}

pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    match &config.sink {
        #[cfg(feature = "loki")]
        LogSink::Loki { url } => init_with_loki(&config, url),
        #[cfg(not(feature = "loki"))]
        LogSink::Loki { .. } => {
            init_console_only(&config);
            tracing::warn!("LOKI_ENABLED is set but the binary was built without the loki feature");
            Ok(())
        }
        LogSink::Console => {
            init_console_only(&config);
            Ok(())
        }
    }
}

fn init_console_only(config: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(EnvFilter::new(config.filter_directive()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "📊 Console logging initialized for {} ({}, level: {})",
        config.service_name,
        config.environment,
        config.log_level
    );
}

#[cfg(feature = "loki")]
fn init_with_loki(config: &LoggingConfig, loki_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = url::Url::parse(loki_url)?;

    let (loki_layer, task) = tracing_loki::builder()
        .label("service", &config.service_name)?
        .label("environment", &config.environment)?
        .build_url(url)?;

    // Ships log batches to Loki for the life of the process
    tokio::spawn(task);

    tracing_subscriber::registry()
        .with(EnvFilter::new(config.filter_directive()))
        .with(tracing_subscriber::fmt::layer())
        .with(loki_layer)
        .init();

    tracing::info!("✅ Loki logging initialized at {}", loki_url);

    Ok(())
}
