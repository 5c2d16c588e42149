use std::{env, error::Error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use w2v_debias::Pipeline;

// expects a single argument, the path to the json config, e.g.
// cargo run --release -- config.json

fn main() -> Result<(), Box<dyn Error>> {

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = env::args().collect();
    Pipeline::run(&args)?;
    Ok(())
}
