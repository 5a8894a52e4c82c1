use std::future::Future;
use std::path::PathBuf;

use color_eyre::eyre::{WrapErr, bail};
use mef_efile::{
    config::Config,
    mef::{Acknowledgment, MefClient, Transport},
    model::ReturnDocument,
    pipeline::{Pipeline, PreparedReturn},
    telemetry,
};

const USAGE: &str = "usage: mef-efile <return.json> [--submit]";

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let mut path = None;
    let mut submit = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--submit" => submit = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            other => bail!("unexpected argument {other}\n{USAGE}"),
        }
    }
    let Some(path) = path else {
        bail!(USAGE);
    };

    let config = Config::load()?;
    tracing::info!(
        tax_year = config.efile.tax_year,
        environment = ?config.transmitter.environment,
        "Loaded configuration"
    );

    let json = std::fs::read_to_string(&path)
        .wrap_err_with(|| format!("cannot read {}", path.display()))?;
    let doc: ReturnDocument = serde_json::from_str(&json).wrap_err("invalid return JSON")?;

    let pipeline = Pipeline::from_config(&config)?;
    if !pipeline.signs() {
        tracing::warn!("No signing key configured, return will be unsigned");
    }
    let prepared = pipeline.prepare(&doc)?;

    if !submit {
        println!("{}", prepared.xml());
        return Ok(());
    }

    let client = MefClient::from_config(&config)?;
    let outcome = transmit(&client, &prepared).await;
    client.shutdown().await;

    let ack = outcome?;
    println!("{} {:?}", ack.submission_id(), ack.status());
    if let Some(dcn) = ack.dcn() {
        println!("DCN {dcn}");
    }
    for error in ack.errors() {
        println!("  {} [{}] {}", error.rule_number, error.severity, error.message);
    }
    Ok(())
}

async fn transmit<T: Transport>(
    client: &MefClient<T>,
    prepared: &PreparedReturn,
) -> color_eyre::Result<Acknowledgment> {
    client.login().await?;
    let receipt = client.submit_return(&prepared.payload()).await?;
    tracing::info!(submission_id = receipt.submission_id(), "Waiting for acknowledgment");

    Ok(client
        .poll_acknowledgment(receipt.submission_id(), interrupted(tokio::signal::ctrl_c()))
        .await?)
}

/// Resolves when `signal` fires; never when its handler cannot be installed
async fn interrupted<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C, polling runs to its deadline");
        std::future::pending::<()>().await;
    }
}
