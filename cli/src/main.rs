use std::io::Write;

use clap::Parser;
use taxtree_cli::{run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let tracing_handle = match taxtree_tracing::TracingBuilder::default()
        .level(cli.log_level)
        .enable_progressbar()
        .build()
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("unable to set up tracing: {}", e);
            std::process::exit(1);
        }
    };

    let mut stdout = tracing_handle.get_stdout_writer();
    if let Err(e) = run(cli, &mut stdout).await {
        writeln!(tracing_handle.get_stderr_writer(), "error: {}", e).ok();
        std::process::exit(1);
    }
}
