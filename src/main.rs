//! auditrag - Main CLI Entry Point

use anyhow::{Context, Result};
use auditrag::{
    capabilities::{OllamaCompletion, OllamaEmbedder},
    cli::{Args, Commands, Config, Verbosity},
    corpus::{read_records, InMemoryCorpus},
    rag::{PipelineOutcome, RagPipeline, SourceOverrides},
    telemetry::{init_logging, TelemetryCollector},
};
use clap::Parser;
use colored::Colorize;
use serde_json::json;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(message) = args.validate() {
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(2);
    }

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let verbosity = args.verbosity();
    let level = verbosity.log_level().unwrap_or(config.logging.level.as_str());
    init_logging(level, config.logging.json);

    match &args.command {
        Some(Commands::Config) => show_config(&config)?,
        Some(Commands::Batch { corpus, input, output }) => {
            run_batch(&config, corpus, input, output, &args.overrides()?).await?;
        }
        None => {
            if let (Some(query), Some(corpus)) = (&args.query, &args.corpus) {
                run_query(&args, &config, corpus, query, verbosity).await?;
            }
        }
    }

    Ok(())
}

/// Load the corpus and wire every capability the configuration enables
async fn build_pipeline(config: &Config, corpus_path: &Path, telemetry: TelemetryCollector) -> Result<RagPipeline> {
    let records = read_records(corpus_path)
        .with_context(|| format!("Failed to read corpus {}", corpus_path.display()))?;

    let corpus = if config.ollama.enabled && !config.ollama.embed_model.is_empty() {
        let embedder = OllamaEmbedder::with_config(&config.ollama_url(), &config.ollama.embed_model)?;
        InMemoryCorpus::with_embedder(records, Arc::new(embedder))
            .await
            .context("Failed to embed corpus")?
    } else {
        InMemoryCorpus::from_records(records)
    };

    let mut builder = RagPipeline::builder()
        .corpus(Arc::new(corpus))
        .settings(config.pipeline_settings())
        .telemetry(telemetry);

    if config.ollama.enabled {
        let model = OllamaCompletion::with_config(&config.ollama_url(), &config.ollama.model)?;
        builder = builder.completion_model(Arc::new(model));
    }

    builder.build().context("Failed to build pipeline")
}

async fn run_query(args: &Args, config: &Config, corpus: &Path, query: &str, verbosity: Verbosity) -> Result<()> {
    let telemetry = TelemetryCollector::new();
    let pipeline = build_pipeline(config, corpus, telemetry.clone()).await?;
    let outcome = pipeline.run_with_overrides(query, &args.overrides()?).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if verbosity == Verbosity::Quiet {
        println!("{}", outcome.answer);
        return Ok(());
    }

    println!("{} {}", "Category:".bold(), outcome.category);
    println!("{} {}", "Persona: ".bold(), outcome.persona);
    println!();
    println!("{}", outcome.answer);

    if verbosity.show_details() {
        print_details(&outcome);
        let stats = telemetry.get_stats();
        println!();
        println!("{}", "Telemetry".cyan().bold());
        println!(
            "  rounds {}  source calls {} ({} failed)  judged {}  accepted {}  elapsed {:.2}s",
            stats.rounds,
            stats.source_calls,
            stats.source_failures,
            stats.documents_judged,
            stats.documents_accepted,
            telemetry.elapsed().as_secs_f64()
        );
    }

    if verbosity.show_validation() {
        println!();
        println!("{}", "Validation".cyan().bold());
        for record in &outcome.validation_results {
            let verdict = if record.verdict.is_accepted() {
                "accepted".green()
            } else {
                "rejected".red()
            };
            println!(
                "  [round {}] {} ({}, {}) {} score={}",
                record.round,
                record.document_id,
                record.provenance,
                record.judge,
                verdict,
                record.score.map_or_else(|| "-".to_string(), |s| format!("{:.2}", s))
            );
            for line in &record.rationale {
                println!("      {}", line.dimmed());
            }
        }
    }

    Ok(())
}

fn print_details(outcome: &PipelineOutcome) {
    println!();
    println!("{}", "Reasoning".cyan().bold());
    for step in &outcome.answer_reasoning {
        println!("  {}", step);
    }

    if !outcome.corrections.is_empty() {
        println!();
        println!("{}", "Corrections".cyan().bold());
        for correction in &outcome.corrections {
            println!("  {:?}", correction);
        }
    }

    println!();
    println!(
        "{} {} validated, {} retries, state {}",
        "Search".cyan().bold(),
        outcome.validated_documents.len(),
        outcome.retry_count,
        outcome.loop_state
    );
    for round in &outcome.search_stats {
        let date = round.date_filter.map_or_else(|| "any date".to_string(), |d| d.to_string());
        println!(
            "  round {}: {} candidates, {} fresh, {} judged, {} accepted ({})",
            round.round, round.candidates, round.fresh, round.judged, round.accepted, date
        );
        for source in &round.sources {
            match &source.error {
                Some(error) => println!("    {} {}", source.source, error.yellow()),
                None => println!("    {} {}/{}", source.source, source.retrieved, source.requested),
            }
        }
    }
}

async fn run_batch(config: &Config, corpus: &Path, input: &Path, output: &Path, overrides: &SourceOverrides) -> Result<()> {
    let telemetry = TelemetryCollector::new();
    let pipeline = build_pipeline(config, corpus, telemetry.clone()).await?;

    let queries = std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let file = std::fs::File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    let mut answered = 0;
    let mut failed = 0;
    for query in queries.lines().map(str::trim).filter(|q| !q.is_empty()) {
        let line = match pipeline.run_with_overrides(query, overrides).await {
            Ok(outcome) => {
                answered += 1;
                json!({
                    "query": outcome.query,
                    "category": outcome.category,
                    "persona": outcome.persona,
                    "answer": outcome.answer,
                    "contexts": outcome.contexts,
                })
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}: {}", "Warning".yellow(), query, e);
                json!({ "query": query, "error": e.to_string() })
            }
        };
        writeln!(writer, "{}", serde_json::to_string(&line)?)?;
    }
    writer.flush()?;

    eprintln!(
        "{} {} answered, {} failed -> {}",
        "Done:".green().bold(),
        answered,
        failed,
        output.display()
    );
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    if let Some(path) = Config::default_path() {
        println!("# default location: {}", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
