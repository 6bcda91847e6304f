mod api;
mod cli;
mod offline;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    api::init_tracing();
    let args: Vec<String> = std::env::args().collect();
    cli::handle_commands(&args)
}
