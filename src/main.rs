// CNPJ X-Ray - CLI batch runner
//
//   cnpj-xray "45.954.282/0001-02" "19.131.243/0001-97" 99999999000191

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cnpj_xray::{
    CnpjaClient, Envelope, Orchestrator, RegistryConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS,
};

const SEPARATOR_WIDTH: usize = 40;

/// Command-line arguments for cnpj-xray
#[derive(Parser, Debug)]
#[command(name = "cnpj-xray")]
#[command(about = "Classifica o risco cadastral de CNPJs consultando a API CNPJá")]
#[command(version)]
struct Args {
    /// CNPJs to analyze, formatted or digits only
    #[arg(required = true, value_name = "CNPJ")]
    cnpjs: Vec<String>,

    /// Registry base URL; the CNPJ is appended as a path segment
    #[arg(long, default_value = DEFAULT_API_URL, env = "CNPJ_XRAY_API_URL")]
    api_url: String,

    /// Registry request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "CNPJ_XRAY_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Include the validated registry record in each result (dados_brutos)
    #[arg(long)]
    raw: bool,
}

impl Args {
    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new(&self.api_url, Duration::from_secs(self.timeout_secs)).with_raw(self.raw)
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cnpj_xray=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.registry_config();

    println!("[main]: Iniciando o Orquestrador para os {} CNPJs fornecidos.", args.cnpjs.len());
    println!("[main]: CNPJs recebidos: {:?}", args.cnpjs);

    let include_raw = config.include_raw;
    let client = CnpjaClient::new(config).context("Failed to build registry HTTP client")?;
    let orchestrator = Orchestrator::new(client).with_raw(include_raw);

    let separator = "-".repeat(SEPARATOR_WIDTH);

    let summary = orchestrator.analyze_batch(&args.cnpjs, |envelope| {
        println!("\n\n{}\n\n", separator);
        if let Err(e) = print_envelope(envelope) {
            eprintln!("[main]: Falha ao imprimir resultado de {}: {}", envelope.identifier(), e);
        }
        println!("\n\n{}\n\n", separator);
    });

    println!("[main]: {} Análises concluídas.", summary.total);
    println!("\tSucessos: {}", summary.succeeded);
    println!("\tFalhas: {}.", summary.failed);

    Ok(())
}

/// Success → data on stdout; failure → full envelope on stderr
fn print_envelope(envelope: &Envelope) -> Result<()> {
    match envelope {
        Envelope::Success { identifier, data, .. } => {
            println!("[main]: Análise bem-sucedida para o CNPJ {}.", identifier);
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        Envelope::Error { identifier, message, .. } => {
            eprintln!("[main]: Análise falhou para o CNPJ {}. Motivo: {}", identifier, message);
            eprintln!("{}", serde_json::to_string_pretty(envelope)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_at_least_one_cnpj() {
        assert!(Args::try_parse_from(["cnpj-xray"]).is_err());
    }

    #[test]
    fn test_args_to_registry_config() {
        let args = Args::try_parse_from([
            "cnpj-xray",
            "--api-url",
            "http://localhost:9000/office",
            "--timeout-secs",
            "3",
            "--raw",
            "45.954.282/0001-02",
            "19131243000197",
        ])
        .unwrap();

        assert_eq!(args.cnpjs, vec!["45.954.282/0001-02", "19131243000197"]);

        let config = args.registry_config();
        assert_eq!(config.base_url, "http://localhost:9000/office");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(config.include_raw);
    }
}
