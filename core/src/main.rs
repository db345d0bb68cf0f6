/// Hearth demo - the in-memory backend wired end to end
use std::sync::Arc;
use std::time::Duration;

use colored::*;
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

use hearth_core::backend::{Identity, MemoryBackend};
use hearth_core::submit::LocalImage;
use hearth_core::sync::ListSyncSource;
use hearth_core::{ChatConfig, ChatSession, Message};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let config = ChatConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let backend = Arc::new(MemoryBackend::new());
    backend.sign_in(Identity {
        id: "demo-user".to_string(),
        display_name: Some("Demo".to_string()),
        photo_url: None,
    });

    println!("{}", "🔥 Hearth demo chat".bold());
    println!("   watching '{}'\n", config.messages_path);

    // A second listener prints every snapshot, standing in for a UI
    let source = ListSyncSource::new(backend.clone(), config.clone());
    let mut snapshots = source
        .open()
        .await
        .map_err(|e| anyhow::anyhow!("Subscribe error: {}", e))?;
    let printer = tokio::spawn(async move {
        while let Some(list) = snapshots.next().await {
            print_snapshot(&list);
        }
    });

    let session = ChatSession::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        config.clone(),
    );
    session
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Session error: {}", e))?;

    session
        .send_text("Hello from Hearth!")
        .await
        .map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
    let image = LocalImage::new("sunrise.png", &b"not really a png"[..]);
    session
        .send_image(image)
        .await
        .map_err(|e| anyhow::anyhow!("Send error: {}", e))?;

    // Let the printer catch the final snapshot
    tokio::time::sleep(Duration::from_millis(100)).await;

    session.stop().await;
    printer.abort();
    let _ = printer.await;

    println!(
        "\n{} {} message(s) held, {} registration release(s)",
        "done:".green().bold(),
        session.messages().await.len(),
        backend.unsubscribe_calls()
    );
    Ok(())
}

fn print_snapshot(list: &[Message]) {
    println!(
        "{}",
        format!("── snapshot: {} message(s) ──", list.len()).dimmed()
    );
    for message in list {
        let name = message.name.clone().unwrap_or_else(|| "?".to_string());
        match (&message.text, &message.image_url) {
            (Some(text), _) => println!("  {} {}", format!("{}:", name).cyan().bold(), text),
            (None, Some(url)) => {
                println!("  {} {}", format!("{}:", name).cyan().bold(), url.underline())
            }
            (None, None) => println!(
                "  {} {}",
                format!("{}:", name).cyan().bold(),
                "(empty)".dimmed()
            ),
        }
    }
}
