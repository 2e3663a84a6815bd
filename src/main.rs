fn main() -> anyhow::Result<()> {
    callwatch_lib::run()
}
