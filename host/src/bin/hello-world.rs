//! The smallest possible embedding: create an instance, run one line of
//! script, exit non-zero if any of that fails.

use anyhow::{Context, Result};
use lunet_lib::embed::Instance;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // create the interpreter instance
    let mut vm = Instance::new().context("creating the interpreter instance")?;

    // run sample code
    vm.load("hello", r#"print("Hello world!");"#)
        .context("running the hello chunk")?;

    // dropping the instance releases everything
    Ok(())
}
