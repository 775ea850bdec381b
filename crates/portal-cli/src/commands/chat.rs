//! Chat command handler

use anyhow::{Context, Result};

use portal_core::{Config, Conversation, OpenRouterChat};

use crate::editor::{is_interactive, read_message};
use crate::output::{Output, OutputFormat};

/// Ask the tutor one question, or hold a conversation on stdin
pub async fn run(config: &Config, message: Option<String>, output: &Output) -> Result<()> {
    let service =
        OpenRouterChat::new(config.chat.clone()).context("Failed to set up chat client")?;
    let mut conversation = Conversation::new();

    if let Some(message) = message {
        if let Some(reply) = conversation.send(&service, &message).await {
            print_reply(&reply.text, output);
        }
        return Ok(());
    }

    if output.format == OutputFormat::Human {
        if let Some(greeting) = conversation.messages().first() {
            println!("{}", greeting.text);
            println!();
        }
    }

    let prompt = if is_interactive() { "you>" } else { "" };
    while let Some(line) = read_message(prompt)? {
        if line == "exit" || line == "quit" {
            break;
        }
        if let Some(reply) = conversation.send(&service, &line).await {
            print_reply(&reply.text, output);
        }
    }

    Ok(())
}

fn print_reply(text: &str, output: &Output) {
    match output.format {
        OutputFormat::Human => {
            println!("tutor> {}", text);
            println!();
        }
        OutputFormat::Json => println!("{}", serde_json::json!({"reply": text})),
        OutputFormat::Quiet => println!("{}", text),
    }
}
