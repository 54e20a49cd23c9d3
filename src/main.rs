use anyhow::Context;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vision_query::metrics::METRICS;
use vision_query::{ImageQueryProcessor, ModelAnswers, ProcessError, Settings};

/// Set to `1`/`true` for JSON log lines
const LOG_JSON_ENV: &str = "VISION_QUERY_LOG_JSON";

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; the key may already be in the environment
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(error) => {
            if tracing::enabled!(tracing::Level::ERROR) {
                tracing::error!(error = %format!("{error:#}"), "vision-query failed to start");
            } else {
                eprintln!("Error: {error:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Startup failures come back as `Err`; query failures are logged by the
/// processor and only turn into a failing exit code here.
async fn run() -> anyhow::Result<ExitCode> {
    let settings = Settings::load().context("failed to load settings")?;
    let processor =
        ImageQueryProcessor::new(&settings).context("failed to create vision client")?;

    let result = processor
        .process(&settings.image_path, &settings.query)
        .await;

    if settings.print_metrics {
        eprint!("{}", METRICS.export_prometheus());
    }

    let answered = report(result, &mut io::stdout().lock()).context("failed to write answers")?;
    Ok(if answered { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Print `model` / `answer` line pairs; `false` when there is nothing to print
fn report(result: Result<ModelAnswers, ProcessError>, out: &mut impl Write) -> io::Result<bool> {
    let Ok(answers) = result else {
        return Ok(false);
    };

    for (model, answer) in &answers {
        writeln!(out, "{model}")?;
        writeln!(out, "{answer}")?;
    }

    Ok(true)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_JSON_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_prints_pairs_in_order() {
        let mut answers = ModelAnswers::new();
        answers.insert("llama_11b".to_string(), "Melanoma".to_string());
        answers.insert("llama_90b".to_string(), "Likely melanoma".to_string());

        let mut out = Vec::new();
        assert!(report(Ok(answers), &mut out).unwrap());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "llama_11b\nMelanoma\nllama_90b\nLikely melanoma\n"
        );
    }

    #[test]
    fn test_report_failure_prints_nothing() {
        let err = ProcessError::Api {
            model: "llama_11b".to_string(),
            status: 500,
            body: "internal".to_string(),
        };

        let mut out = Vec::new();
        assert!(!report(Err(err), &mut out).unwrap());
        assert!(out.is_empty());
    }
}
