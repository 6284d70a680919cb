const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn exec() -> anyhow::Result<()> {
    println!("trackwrite version {CLI_VERSION}");
    Ok(())
}
