//! Subcommand implementations

use anyhow::{bail, Context, Result};
use feedcheck_analyzer::Analyzer;
use feedcheck_core::{AnalyzerConfig, Error};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

pub async fn analyze(config: &AnalyzerConfig, text: &str, tags: &[String]) -> Result<()> {
    let analyzer = Analyzer::from_config(config)?;

    match analyzer.analyze(text, tags).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => bail!(describe(&e)),
    }
}

pub async fn batch(config: &AnalyzerConfig, file: &Path, concurrency: usize) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let lines = feedback_lines(&contents);
    info!(lines = lines.len(), "Analyzing batch");

    let analyzer = Analyzer::from_config(config)?;
    for record in analyze_lines(&analyzer, &lines, concurrency).await {
        println!("{record}");
    }

    let snapshot = analyzer.metrics().snapshot();
    info!(
        computations = snapshot.computations,
        cache_hits = snapshot.cache_hits,
        coalesced = snapshot.coalesced_joins,
        degraded = snapshot.degraded_results,
        rate_limited = snapshot.rate_limited,
        "Batch complete"
    );
    Ok(())
}

pub async fn health(config: &AnalyzerConfig) -> Result<()> {
    let analyzer = Analyzer::from_config(config)?;
    if analyzer.upstream_healthy().await {
        println!("healthy");
        Ok(())
    } else {
        println!("unhealthy");
        bail!("upstream at {} is unreachable", config.upstream.base_url)
    }
}

pub fn show_config(config: &AnalyzerConfig) -> Result<()> {
    print!("{}", serde_yaml::to_string(&config.redacted())?);
    Ok(())
}

/// Non-blank lines with their 1-based line numbers
fn feedback_lines(contents: &str) -> Vec<(usize, &str)> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line))
        .collect()
}

/// One JSON record per line, in input order
async fn analyze_lines(
    analyzer: &Analyzer,
    lines: &[(usize, &str)],
    concurrency: usize,
) -> Vec<Value> {
    stream::iter(lines.iter().copied())
        .map(|(line, text)| async move {
            match analyzer.analyze(text, &[]).await {
                Ok(result) => json!({ "line": line, "result": result }),
                Err(e) => json!({ "line": line, "error": describe(&e) }),
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

fn describe(e: &Error) -> String {
    match e.retry_after() {
        Some(wait) => format!("{e} (retry in {:.1}s)", wait.as_secs_f64()),
        None => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedcheck_classifiers::testing::{Behavior, ScriptedClient};
    use std::sync::Arc;

    fn analyzer(rate_capacity: u32) -> Analyzer {
        let mut config = AnalyzerConfig::default();
        config.upstream.models = vec!["scripted/model".to_string()];
        config.rate_gate.capacity = rate_capacity;
        let client = Arc::new(ScriptedClient::new().with_model(
            "scripted/model",
            vec![Behavior::judge("positive", 0.9, "Product Quality", 0.8)],
        ));
        Analyzer::with_client(&config, client).unwrap()
    }

    #[test]
    fn test_feedback_lines_skip_blanks() {
        let contents = "first\n\n   \nsecond\r\nthird";
        let lines = feedback_lines(contents);
        assert_eq!(lines, vec![(1, "first"), (4, "second"), (5, "third")]);
    }

    #[test]
    fn test_feedback_lines_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Love it").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "Hate it").unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(feedback_lines(&contents), vec![(1, "Love it"), (3, "Hate it")]);
    }

    #[tokio::test]
    async fn test_batch_records_keep_order_and_report_errors() {
        let analyzer = analyzer(2);
        let long = "x".repeat(5001);
        let lines = vec![
            (1, "Great product"),
            (2, "great   product"),
            (3, long.as_str()),
            (4, "Something else"),
            (5, "A third distinct text"),
        ];

        let records = analyze_lines(&analyzer, &lines, 4).await;
        assert_eq!(records.len(), 5);
        for (record, (line, _)) in records.iter().zip(&lines) {
            assert_eq!(record["line"], *line);
        }

        assert_eq!(records[0]["result"]["model_used"], "scripted/model");
        assert_eq!(records[1]["result"], records[0]["result"]);
        assert!(records[2]["error"].as_str().unwrap().contains("5001"));
        assert!(records[3]["result"].is_object());
        assert!(records[4]["error"].as_str().unwrap().contains("retry in"));
    }

    #[test]
    fn test_show_config_redacts_key() {
        let mut config = AnalyzerConfig::default();
        config.upstream.api_key = Some("sk-secret".to_string());
        let yaml = serde_yaml::to_string(&config.redacted()).unwrap();
        assert!(!yaml.contains("sk-secret"));
        assert!(show_config(&config).is_ok());
    }
}
