//! The `run` command - launches a stored VM.

use super::Context;
use clap::Args;
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;
use virtmachines::{
    ConsoleLine, Error, LaunchMode, Launcher, OutputStream, VmHandle, VmStatus, compile,
};

#[derive(Args)]
pub struct RunArgs {
    /// VM name
    name: String,

    /// Attach the QEMU monitor to this terminal for this run only
    #[arg(long, short)]
    interactive: bool,

    /// Print the command instead of running it
    #[arg(long)]
    dry_run: bool,
}

pub async fn run(ctx: &Context, args: RunArgs) -> anyhow::Result<()> {
    let mut config = ctx.store.load(&args.name)?;
    if args.interactive {
        config.interactive_monitor = true;
    }

    let command = compile(&config)?;
    if args.dry_run {
        println!("{command}");
        return Ok(());
    }
    eprintln!("Running: {command}");

    let vm = ctx
        .settings
        .launcher()
        .launch(&command, LaunchMode::for_config(&config))
        .await?;
    let grace = ctx.settings.stop_grace();

    match vm.mode() {
        LaunchMode::Interactive => run_monitor(&vm, grace).await,
        LaunchMode::Detached => wait_or_stop(&vm, grace).await,
    }
}

async fn wait_or_stop(vm: &VmHandle, grace: Duration) -> anyhow::Result<()> {
    eprintln!(
        "VM '{}' is running (pid {}). Press Ctrl+C to shut it down.",
        vm.label(),
        vm.id().map_or_else(|| "?".to_string(), |id| id.to_string())
    );

    tokio::select! {
        status = vm.wait() => report(status?),
        _ = tokio::signal::ctrl_c() => shutdown(vm, grace).await,
    }
}

async fn run_monitor(vm: &VmHandle, grace: Duration) -> anyhow::Result<()> {
    let mut output = vm.take_output()?;
    let mut input = spawn_stdin_reader();
    let mut input_open = true;

    eprintln!("Connected to the QEMU monitor. Type 'quit' to power off.");

    loop {
        tokio::select! {
            line = output.next_line() => match line {
                Some(ConsoleLine { stream: OutputStream::Stdout, text }) => println!("{text}"),
                Some(ConsoleLine { stream: OutputStream::Stderr, text }) => eprintln!("{text}"),
                None => break,
            },
            line = input.recv(), if input_open => match line {
                Some(line) => {
                    if let Err(e) = vm.send_line(&line).await {
                        tracing::debug!("could not forward input: {}", e);
                    }
                }
                None => input_open = false,
            },
            _ = tokio::signal::ctrl_c() => return shutdown(vm, grace).await,
        }
    }

    report(vm.wait().await?)
}

/// Reads terminal lines on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn shutdown(vm: &VmHandle, grace: Duration) -> anyhow::Result<()> {
    eprintln!("Shutting down '{}'...", vm.label());
    match vm.stop_with_timeout(grace).await {
        Ok(()) | Err(Error::NotRunning) => {}
        Err(Error::Timeout(message)) => {
            eprintln!("{message}; killing it");
            match vm.kill().await {
                Ok(()) | Err(Error::NotRunning) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(e) => return Err(e.into()),
    }
    report(vm.wait().await?)
}

fn report(status: VmStatus) -> anyhow::Result<()> {
    match status {
        VmStatus::Stopped { exit_code: Some(0) } => {
            eprintln!("VM exited.");
            Ok(())
        }
        VmStatus::Stopped {
            exit_code: Some(code),
        } => anyhow::bail!("VM exited with code {code}"),
        VmStatus::Stopped { exit_code: None } => {
            eprintln!("VM was terminated by a signal.");
            Ok(())
        }
        other => anyhow::bail!("VM ended in unexpected state: {other:?}"),
    }
}
