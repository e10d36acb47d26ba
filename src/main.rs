//! CLI entry point: `supervisor <output-directory> <control-command> [control-args...]`.

use anyhow::Context;
use std::ffi::OsString;
use supervisor::spawn::resolve_executable;
use supervisor::supervisor::Supervisor;

fn usage(program: &str) {
    println!("usage: {} <output-directory> <control-command> [control-args...]", program);
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = backtrace::Backtrace::new();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let program = args
        .get(0)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "supervisor".to_string());

    if args.len() < 3 {
        usage(&program);
        std::process::exit(1);
    }

    init_logging();
    install_panic_hook();

    let status_root = std::fs::canonicalize(&args[1])
        .with_context(|| format!("cannot resolve output directory {:?}", args[1]))?;

    let mut control_argv: Vec<String> = args[2..]
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    resolve_executable(&mut control_argv)
        .with_context(|| format!("cannot resolve control command {:?}", args[2]))?;

    Supervisor::run(status_root, control_argv)
        .context("supervisor terminated with an error")?;

    Ok(())
}
