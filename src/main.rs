fn main() -> anyhow::Result<()> {
    pce_cli::run()
}
