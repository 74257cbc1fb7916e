use anyhow::Result;
use log::info;
use showrunner::config::Config;
use showrunner::job::JobAssembler;
use showrunner::llm;
use showrunner::queue::RedisStore;
use showrunner::tts_client;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM and Redis settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    let llm = llm::create_llm(&config.llm)?;
    let tts = tts_client::create_tts_client(&config.tts)?;

    // The queue store is the one collaborator allowed to abort startup.
    let store = RedisStore::connect(&config.redis).await?;
    info!(
        "Connected to redis at {}:{}",
        config.redis.host, config.redis.port
    );

    let mut assembler = JobAssembler::new(config, llm, tts, Box::new(store));
    assembler.run_loop().await
}
