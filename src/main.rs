use anyhow::Result;
use chatwarden::cli::{Cli, Commands};
use chatwarden::gateway::UnblockOutcome;
use chatwarden::{utils, Gateway, Settings, Surface, System, Verdict};
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let cli = Cli::parse();

    // classification never reaches the upstream, so it runs without an API key
    if let Commands::Classify { text } = &cli.command {
        let classifier = chatwarden::build_classifier(&settings).await?;
        return print_verdict(&classifier.classify(text).await);
    }

    let system = System::start(settings).await?;
    let gateway = system.gateway();

    let result = match cli.command {
        Commands::Ask {
            text,
            user,
            surface,
            context,
        } => {
            let reply = gateway.submit(&user, &text, surface, &context).await;
            println!("\n{}", reply);
            Ok(())
        }
        Commands::Interactive { user, surface } => handle_interactive(gateway, user, surface).await,
        Commands::Batch {
            file,
            user,
            concurrency,
        } => handle_batch(gateway, file, user, concurrency).await,
        Commands::Classify { text } => print_verdict(&gateway.classify(&text).await),
    };

    system.shutdown().await?;

    result
}

fn print_verdict(verdict: &Verdict) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(verdict)?);
    Ok(())
}

async fn handle_interactive(gateway: &Gateway, user: String, surface: Surface) -> Result<()> {
    utils::print_header("Interactive Mode");
    utils::print_session(&user, surface);
    utils::print_info("Type /help for commands (Ctrl+C to exit)\n");

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        utils::print_prompt("You: ");
        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            return Ok(());
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            handle_command(gateway, &user, input).await;
            println!();
            continue;
        }

        let reply = gateway.submit(&user, input, surface, "interactive").await;
        utils::print_reply("Assistant", &reply);
        println!();
    }
}

async fn handle_command(gateway: &Gateway, user: &str, input: &str) {
    let mut parts = input.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();

    match command {
        "/reset" => {
            gateway.reset(user).await;
            utils::print_admin(Ok("Conversation reset".to_string()));
        }
        "/stats" => match gateway.stats(user).await {
            Ok(stats) => println!(
                "{}",
                serde_json::to_string_pretty(&stats).unwrap_or_else(|e| e.to_string())
            ),
            Err(e) => utils::print_admin(Err(e)),
        },
        "/ban" if !target.is_empty() => {
            let reason = if rest.is_empty() { "manual ban" } else { rest };
            utils::print_admin(
                gateway
                    .block(user, target, reason)
                    .await
                    .map(|status| format!("{} banned for {:?}", target, status.remaining)),
            );
        }
        "/unban" if !target.is_empty() => utils::print_admin(
            gateway.unblock(user, target).await.map(|outcome| match outcome {
                UnblockOutcome::Unbanned => format!("{} unbanned", target),
                UnblockOutcome::NotBanned => format!("{} was not banned, nothing changed", target),
            }),
        ),
        "/banned" if !target.is_empty() => match gateway.is_blocked(user, target).await {
            Ok(status) => utils::print_ban_status(target, status.as_ref()),
            Err(e) => utils::print_admin(Err(e)),
        },
        "/purge" if !target.is_empty() => utils::print_admin(gateway.purge(user, target).await.map(|report| {
            format!(
                "Purged {} (history cleared: {}, cache entries removed: {})",
                target, report.history_cleared, report.cache_entries_removed
            )
        })),
        "/ban-duration" => match target.parse::<u64>() {
            Ok(secs) => utils::print_admin(
                gateway
                    .set_ban_duration(user, Duration::from_secs(secs))
                    .await
                    .map(|duration| format!("Ban duration set to {:?}", duration)),
            ),
            Err(_) => utils::print_error("Usage: /ban-duration <seconds>"),
        },
        _ => {
            println!("Commands:");
            println!("  /reset                 - Clear your conversation");
            println!("  /stats                 - Gateway counters (owner)");
            println!("  /ban <id> [reason]     - Ban an identity (owner)");
            println!("  /unban <id>            - Lift a ban and wipe state (owner)");
            println!("  /banned <id>           - Show ban status (owner)");
            println!("  /purge <id>            - Erase an identity's data (owner)");
            println!("  /ban-duration <secs>   - Change the ban length (owner)");
            println!("  /help                  - Show this help");
        }
    }
}

async fn handle_batch(gateway: &Gateway, file: String, user: String, concurrency: usize) -> Result<()> {
    utils::print_info(&format!(
        "Processing prompts from {} with concurrency {}",
        file, concurrency
    ));

    let file = File::open(file).await?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut prompts = vec![];
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            prompts.push(line);
        }
    }

    let mut results: Vec<(usize, String)> = stream::iter(prompts.iter().enumerate())
        .map(|(i, prompt)| {
            let user = user.as_str();
            async move { (i, gateway.submit(user, prompt, Surface::Search, "batch").await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    results.sort_by_key(|(i, _)| *i);

    for (i, reply) in results {
        println!();
        utils::print_reply(&format!("Response {}", i + 1), &reply);
    }

    Ok(())
}
