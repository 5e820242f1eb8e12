// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::time::Instant;
use streamgraph::config::{load_and_validate_config, NodeRegistry};
use streamgraph::engine::Graph;
use streamgraph::packet::{Packet, Payload, Timestamp};
use tracing_subscriber::EnvFilter;

fn describe(payload: Option<&Payload>) -> String {
    match payload {
        None => "<empty>".to_string(),
        Some(Payload::Text(text)) => text.clone(),
        Some(Payload::Int(value)) => value.to_string(),
        Some(Payload::Float(value)) => value.to_string(),
        Some(Payload::Bool(value)) => value.to_string(),
        Some(Payload::Json(value)) => value.to_string(),
        Some(other) => format!("{:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <graph.yaml|graph.toml> [line ...]", args[0]);
        eprintln!("Example: {} configs/text-pipeline.yaml \"hello world\" \"second line\"", args[0]);
        std::process::exit(1);
    }

    let config_file = &args[1];
    let lines = &args[2..];

    let config = load_and_validate_config(config_file)
        .with_context(|| format!("Failed to load {}", config_file))?;
    let input_stream = match config.input_streams.as_slice() {
        [] => None,
        [single] => Some(single.clone()),
        many => bail!("Expected at most one graph input stream, found {}", many.len()),
    };
    if input_stream.is_none() && !lines.is_empty() {
        bail!("{} has no graph input stream to feed", config_file);
    }
    let output_streams = config.output_streams.clone();

    let mut graph = Graph::new(NodeRegistry::with_builtin_nodes());
    graph.initialize(config)?;

    let mut printers = Vec::new();
    for stream in &output_streams {
        let mut poller = graph.add_output_stream_poller(stream)?;
        printers.push(tokio::spawn(async move {
            let mut count = 0usize;
            while let Some(packet) = poller.next_async().await {
                println!(
                    "{} @ {}: {}",
                    poller.stream_name(),
                    packet.timestamp(),
                    describe(packet.payload())
                );
                count += 1;
            }
            count
        }));
    }

    let start = Instant::now();
    graph.start_run(HashMap::new())?;
    if let Some(stream) = &input_stream {
        // adds block while a bounded input queue is full
        tokio::task::block_in_place(|| -> Result<()> {
            for (index, line) in lines.iter().enumerate() {
                let packet = Packet::new(line.as_str()).at(Timestamp::new(index as i64));
                graph.add_packet_to_input_stream(stream, packet)?;
            }
            graph.close_all_input_streams()?;
            Ok(())
        })?;
    }

    let mut printed = 0;
    for printer in printers {
        printed += printer.await?;
    }
    let status = tokio::task::block_in_place(|| graph.close());

    match status {
        Ok(()) => {
            println!("Printed {} packets in {:?}", printed, start.elapsed());
            Ok(())
        }
        Err(error) => bail!("Graph run failed: {}", error),
    }
}
