use clap::Parser;
use table_transfer::config::secrets::{Env, EnvSecretResolver, ExecutionMode};
use table_transfer::utils::error::{ErrorSeverity, TransferError};
use table_transfer::utils::logger;
use table_transfer::{CliConfig, TransferContext, TransferEngine};

fn exit_code(e: &TransferError) -> i32 {
    match e.severity() {
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: TransferError) -> ! {
    tracing::error!(kind = ?e.kind(), "❌ transfer failed: {}", e);
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e);
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(&e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.log_json {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting table-transfer");
    tracing::debug!("CLI config: {:?}", config);

    let job = config.to_job().unwrap_or_else(|e| fail(e));

    let env = Env::process();
    if ExecutionMode::detect(&env) == ExecutionMode::Cloud {
        fail(TransferError::unsupported(
            "cloud execution needs a remote vault client, none is linked into this binary",
        ));
    }

    let context = TransferContext::new(EnvSecretResolver::new(env));
    let mut engine = TransferEngine::new_with_monitoring(&context, config.monitor);

    match engine.run(&job).await {
        Ok(report) => {
            tracing::info!("✅ transfer completed");
            println!("✅ Transferred {} records", report.records_loaded);
            println!("📁 Destination: {}", report.destination);
            if let Some(rows) = report.rows_written {
                println!("🧮 Rows written: {}", rows);
            }
            Ok(())
        }
        Err(e) => fail(e),
    }
}
