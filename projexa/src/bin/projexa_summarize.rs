// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

// projexa-summarize: one-shot summary of a single file, no HTTP.
//
// Usage:
//   projexa-summarize src/lib.rs
//   cat main.py | projexa-summarize
//   projexa-summarize --config projexa.yaml --temperature 0.1 app.js

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures_util::StreamExt;
use serde_json::{Map, Value};

use projexa::backend::{ChatRequest, GenerationBackend, OllamaBackend};
use projexa::config;
use projexa::emitter::{emit_with_outcome, StreamSettings};
use projexa::prompt::build_messages;
use projexa::request::{validate, AnalyzeRequest};

#[derive(Parser)]
#[command(
    name = "projexa-summarize",
    about = "Summarize one code file through the configured model backend."
)]
struct Cli {
    /// File to summarize. Reads stdin when omitted.
    #[arg(value_name = "FILE")]
    path: Option<PathBuf>,

    /// Path to a projexa.yaml config file.
    #[arg(long, env = "PROJEXA_CONFIG")]
    config: Option<PathBuf>,

    /// Sampling temperature override.
    #[arg(long)]
    temperature: Option<f64>,

    /// Maximum tokens to generate (clamped to the configured cap).
    #[arg(long)]
    num_predict: Option<i64>,
}

fn read_input(path: Option<&PathBuf>) -> std::io::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn cli_options(cli: &Cli) -> Option<Map<String, Value>> {
    let mut options = Map::new();
    if let Some(t) = cli.temperature {
        options.insert("temperature".into(), Value::from(t));
    }
    if let Some(n) = cli.num_predict {
        options.insert("num_predict".into(), Value::from(n));
    }
    (!options.is_empty()).then_some(options)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = match config::load_from_path(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let text = match read_input(cli.path.as_ref()) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("failed to read input: {e}");
            std::process::exit(1);
        }
    };

    let request = AnalyzeRequest {
        data: Value::String(text),
        options: cli_options(&cli),
    };
    let validated = match validate(request, &config.limits, &config.generation) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    let backend: Arc<dyn GenerationBackend> = match OllamaBackend::from_config(&config.backend) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            tracing::error!("failed to build backend client: {e}");
            std::process::exit(1);
        }
    };

    let chat = ChatRequest {
        model: config.backend.model.clone(),
        messages: build_messages(&validated.text),
        options: validated.options,
    };
    let settings = StreamSettings::from_config(&config, uuid::Uuid::new_v4().to_string());
    let (body, outcome) = emit_with_outcome(settings, backend, chat);
    let mut body = Box::pin(body);

    let mut stdout = std::io::stdout().lock();
    while let Some(chunk) = body.next().await {
        if let Err(e) = stdout.write_all(&chunk).and_then(|()| stdout.flush()) {
            tracing::error!("failed to write output: {e}");
            std::process::exit(1);
        }
    }
    if let Err(e) = writeln!(stdout).and_then(|()| stdout.flush()) {
        tracing::error!("failed to write output: {e}");
        std::process::exit(1);
    }

    match outcome.await {
        Ok(outcome) if !outcome.is_failure() => {}
        Ok(outcome) => {
            tracing::warn!(outcome = outcome.as_str(), "summary did not complete");
            std::process::exit(2);
        }
        Err(_) => {
            tracing::error!("stream ended without reporting an outcome");
            std::process::exit(2);
        }
    }
}
