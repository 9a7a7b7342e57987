use depot_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    depot_api::setup::init_tracing();

    let config = Config::from_env()?;

    let (_state, router) = depot_api::setup::initialize_app(config.clone()).await?;

    depot_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
