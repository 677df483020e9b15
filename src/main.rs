use clap::Parser;
use token_relay::utils::monitor::SystemMonitor;
use token_relay::utils::{export, logger, validation::Validate};
use token_relay::{ApiClient, CliConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("🚀 Starting token-relay CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor = SystemMonitor::new(config.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
        monitor.log_stats("Request started");
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
    let client = ApiClient::from_config(&config, token_source);

    tracing::info!("📡 {} {}{}", config.method, config.base_url, config.path);

    let result = run_request(&client, &config).await;

    if monitor.is_enabled() {
        monitor.log_stats("Request completed");
    }

    match result {
        Ok(output) => {
            tracing::info!("✅ Request completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            tracing::error!(
                "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
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

async fn run_request(client: &ApiClient, config: &CliConfig) -> token_relay::Result<String> {
    let body = match &config.body {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::json!({}),
    };

    let response = match config.method.to_uppercase().as_str() {
        "GET" => client.get(&config.path).await?,
        "POST" => client.post(&config.path, &body).await?,
        "PATCH" => client.patch(&config.path, &body).await?,
        "DELETE" => client.delete(&config.path).await?,
        // validate() 已擋掉其他動詞
        other => {
            return Err(token_relay::RelayError::ProcessingError {
                message: format!("Unsupported method: {}", other),
            })
        }
    };

    if response.status.is_none() {
        tracing::warn!("⏱️ Request timed out - returning empty result");
    } else {
        tracing::info!("📥 Received {} records", response.records.len());
    }

    match config.output.as_str() {
        "csv" => export::records_to_csv(&response.records),
        _ => export::records_to_json(&response.records),
    }
}
