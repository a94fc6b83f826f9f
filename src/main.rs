use std::env;

use multitool_agent::{
    build_time_weather_agent, model_from_config, AppConfig, ConversationLoop, Result, Runner,
};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multitool_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match env::args().nth(1).or_else(|| env::var("MULTITOOL_CONFIG").ok()) {
        Some(path) => AppConfig::from_env_or_file(path)?,
        None => AppConfig::from_env(),
    };
    if !config.weather.is_configured() {
        warn!(
            "OPENWEATHERMAP_API_KEY environment variable not set. The weather tool will not function correctly."
        );
    }

    println!("Starting Multi-Tool Agent");
    println!("This agent can provide information about time and weather for various cities.");
    println!("---------------------------------------------------------------------");

    let model = model_from_config(&config.model)?;
    info!(provider = %config.model.provider, model = %config.model.model, "model ready");
    let agent = build_time_weather_agent(&config, model)?;
    let runner = Runner::new(agent).with_app_name(config.session.app_name.clone());
    let session = runner.create_session(config.session.user_id.clone()).await;

    println!("Agent initialized. Type 'quit' to exit.");
    println!(
        "Note: For weather, ensure OPENWEATHERMAP_API_KEY environment variable is set."
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut console = ConversationLoop::new(&runner, &session, stdin, tokio::io::stdout());
    console.run().await
}
