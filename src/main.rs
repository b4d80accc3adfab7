mod bybit;
mod config;
mod discord;
mod rsi;
mod scheduler;
mod types;

use bybit::BybitClient;
use config::Config;
use discord::DiscordNotifier;
use scheduler::AlertScheduler;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    println!("Starting RSI Alert Bot...");

    // Read and validate everything before touching the network
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {e:#}");
            return;
        }
    };
    println!(
        "Watching {} on the {} interval (RSI period {}, thresholds {}/{})",
        config.symbol, config.interval, config.period, config.lower, config.upper
    );

    let source = BybitClient::new(&config);

    // Resolve the channel before the loop starts; an unreachable channel
    // means every alert would be lost, so this is fatal
    let notifier = match DiscordNotifier::connect(&config.discord_token, config.discord_channel_id).await
    {
        Ok(notifier) => notifier,
        Err(e) => {
            eprintln!("❌ Discord startup check failed: {e:#}");
            eprintln!("   Check DISCORD_BOT_TOKEN and DISCORD_CHANNEL_ID.");
            return;
        }
    };

    let mut scheduler = AlertScheduler::new(&config);
    tokio::select! {
        _ = scheduler.run(&source, &notifier) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutdown requested, stopping the alert loop");
        }
    }
}
