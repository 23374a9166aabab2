mod cli;

fn main() -> anyhow::Result<()> {
    let verbose = std::env::args().any(|a| a == "-v" || a == "--verbose");
    handplay::logging::init(verbose);
    cli::run()
}
