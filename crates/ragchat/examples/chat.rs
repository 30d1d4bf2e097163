//! Interactive chat demo against a local Ollama server.
//!
//! Run with: cargo run -p ragchat --example chat -- [document.txt]
//!
//! With a document argument, answers are grounded in its content; without
//! one the session runs in plain-chat mode. Set RAGCHAT_CONFIG to point at
//! a TOML config file.

use std::io::Write;

use ragchat::{Document, RagConfig, RagEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragchat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("RAGCHAT_CONFIG") {
        Ok(path) => RagConfig::from_file(path)?,
        Err(_) => RagConfig::default(),
    };

    let engine = RagEngine::new(config)?;
    let mut session = engine.session();

    if let Some(path) = std::env::args().nth(1) {
        let text = std::fs::read_to_string(&path)?;
        session.ingest(Document::new(path.as_str(), text)).await?;
        println!("Ingested {path}; answers will be grounded in it.");
    } else {
        println!("No document given; running in plain-chat mode.");
    }
    println!("Type a question, 'regen' to redo the last answer, or 'exit'.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            "regen" => {
                if let Some(turn) = session.regenerate().await.last() {
                    println!("{}\n", turn.assistant_message);
                }
            }
            message => {
                if let Some(turn) = session.turn(message).await.last() {
                    println!("{}\n", turn.assistant_message);
                }
            }
        }
    }

    Ok(())
}
