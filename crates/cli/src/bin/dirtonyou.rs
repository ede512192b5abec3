//! DirtOnYou CLI binary entrypoint.

fn main() -> anyhow::Result<()> {
    dirtonyou_cli::app::run()?;
    Ok(())
}
