fn main() -> anyhow::Result<()> {
    provergate::run()?;
    Ok(())
}
