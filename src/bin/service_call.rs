use clap::Parser;
use std::collections::HashMap;
use token_relay::config::service_config::ServiceConfig;
use token_relay::utils::monitor::SystemMonitor;
use token_relay::utils::{export, logger, validation::Validate};
use token_relay::ApiClient;

#[derive(Parser)]
#[command(name = "service-call")]
#[command(about = "Call a named endpoint from a TOML service catalog")]
struct Args {
    /// Path to service configuration file
    #[arg(short, long, default_value = "service.toml")]
    config: String,

    /// Endpoint name to call (see --list)
    endpoint: Option<String>,

    /// Endpoint parameters as key=value (repeatable)
    #[arg(short, long)]
    param: Vec<String>,

    /// Output format: json or csv
    #[arg(long, default_value = "json")]
    output: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show the request plan without calling
    #[arg(long)]
    dry_run: bool,

    /// List endpoints in the catalog and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting service-call");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    // 載入服務配置
    let config = match ServiceConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    if args.list {
        println!("📋 Endpoints in '{}':", config.service.name);
        for endpoint in &config.endpoints {
            println!(
                "   {} {} {}  {}",
                endpoint.name,
                endpoint.method.as_deref().unwrap_or("GET"),
                endpoint.path,
                endpoint.description.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    }

    let Some(endpoint_name) = &args.endpoint else {
        eprintln!("❌ No endpoint name given");
        eprintln!("💡 Use --list to see the available endpoints");
        std::process::exit(1);
    };

    let Some(endpoint) = config.get_endpoint(endpoint_name) else {
        eprintln!("❌ Endpoint '{}' not found in the catalog", endpoint_name);
        eprintln!("💡 Use --list to see the available endpoints");
        std::process::exit(1);
    };

    // 解析 key=value 參數；值優先當 JSON 解析，失敗則視為字串
    let mut params: HashMap<String, serde_json::Value> = HashMap::new();
    for pair in &args.param {
        let Some((key, value)) = pair.split_once('=') else {
            eprintln!("❌ Invalid parameter '{}', expected key=value", pair);
            std::process::exit(1);
        };
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }

    if args.dry_run {
        println!("🔍 Dry run - request plan:");
        println!("   Service:  {} ({})", config.service.name, config.service.base_url);
        println!(
            "   Endpoint: {} {} {}",
            endpoint.name,
            endpoint.method.as_deref().unwrap_or("GET"),
            endpoint.path
        );
        println!("   Params:   {:?}", params);
        if let Some(auth) = &config.auth {
            println!("   Auth:     {}", auth.r#type);
        }
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    let monitor = SystemMonitor::new(monitor_enabled);
    if monitor.is_enabled() {
        monitor.log_stats("Call started");
    }

    // 建立授權來源與 client
    let token_source = match config.token_source() {
        Ok(source) => source,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    let mut client = ApiClient::from_config(&config, token_source);
    if let Some(headers) = &config.service.headers {
        for (name, value) in headers {
            client = client.with_default_header(name.clone(), value.clone());
        }
    }

    tracing::info!(
        "📡 Calling '{}' on service '{}'",
        endpoint.name,
        config.service.name
    );

    let result = client.call(endpoint, &params).await;

    if monitor.is_enabled() {
        monitor.log_stats("Call completed");
    }

    match result {
        Ok(response) => {
            if response.status.is_none() {
                tracing::warn!("⏱️ Request timed out - returning empty result");
            }
            tracing::info!("✅ Received {} records", response.records.len());

            let output = match args.output.as_str() {
                "csv" => export::records_to_csv(&response.records)?,
                _ => export::records_to_json(&response.records)?,
            };
            println!("{}", output);
        }
        Err(e) => {
            tracing::error!(
                "❌ Call failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                token_relay::utils::error::ErrorSeverity::Low => 0,
                token_relay::utils::error::ErrorSeverity::Medium => 2,
                token_relay::utils::error::ErrorSeverity::High => 1,
                token_relay::utils::error::ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
