fn main() -> anyhow::Result<()> {
    wsvm_rust::run()
}
