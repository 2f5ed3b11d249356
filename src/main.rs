// ABOUTME: Entry point for the dockproc CLI application.
// ABOUTME: Parses arguments, runs the container, and mirrors its exit code.

mod cli;

use bollard::models::ContainerCreateBody;
use clap::Parser;
use cli::{Cli, Commands, CommonArgs};
use dockproc::config::{RunConfig, parse_env_entry};
use dockproc::container::{Container, CreateConfig, Execution};
use dockproc::error::{Error, Operation, Result};
use dockproc::hijack::StreamType;
use dockproc::mount::Mount;
use dockproc::process::Process;
use dockproc::runtime::{ClientError, EnvMachine, Machine, MachineConfig};
use dockproc::types::ImageRef;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            image,
            name,
            mounts,
            keep,
            common,
        } => {
            let mut config = load_config(&common)?;
            if let Some(name) = name {
                config.name = Some(name);
            }
            for spec in &mounts {
                config.mounts.push(Mount::parse(spec)?);
            }
            if keep {
                config.remove = false;
            }
            let image = resolve_image(image, &config)?;
            run_process(image, config, &common).await
        }
        Commands::Exec {
            image,
            inline,
            script,
            interpreter,
            common,
        } => {
            let config = load_config(&common)?;
            let image = resolve_image(image, &config)?;
            let execution = resolve_execution(&config, inline, script, interpreter)?;

            run_exec(image, config, &common, execution).await
        }
    }
}

/// Config file from `--config` or discovery, with machine and retry flags applied.
fn load_config(common: &CommonArgs) -> Result<RunConfig> {
    let mut config = match &common.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::discover_or_default(&env::current_dir()?)?,
    };

    if common.host.is_some() || common.cert_path.is_some() || common.api_version.is_some() {
        let mut machine = config.machine.take().unwrap_or_else(|| {
            let from_env = EnvMachine::new();
            MachineConfig {
                host: from_env.host().to_string(),
                cert_path: from_env.cert_path().map(Into::into),
                ..Default::default()
            }
        });
        if let Some(host) = &common.host {
            machine.host = host.clone();
        }
        if let Some(path) = &common.cert_path {
            machine.cert_path = Some(path.clone());
        }
        if let Some(version) = &common.api_version {
            machine.version = version.clone();
        }
        config.machine = Some(machine);
    }

    if let Some(retry) = common.retry {
        config.retry = retry;
    }

    Ok(config)
}

fn resolve_image(flag: Option<String>, config: &RunConfig) -> Result<ImageRef> {
    match flag {
        Some(image) => ImageRef::parse(&image)
            .map_err(|e| Error::InvalidConfig(format!("image {image:?}: {e}"))),
        None => config
            .image
            .clone()
            .ok_or_else(|| Error::InvalidConfig("no image given".into())),
    }
}

/// The configured execution with command-line overrides. Inspection is always
/// on so the exit code can be mirrored.
fn resolve_execution(
    config: &RunConfig,
    inline: Option<String>,
    script: Option<PathBuf>,
    interpreter: Option<String>,
) -> Result<Execution> {
    let mut spec = config.exec.clone().unwrap_or_default();
    if inline.is_some() || script.is_some() {
        spec.inline = inline;
        spec.script = script;
    }
    if interpreter.is_some() {
        spec.interpreter = interpreter;
    }
    spec.inspect = true;

    Execution::try_from(spec)
}

fn env_entries(config: &RunConfig, common: &CommonArgs) -> Result<Vec<String>> {
    let mut env = dockproc::config::resolve_env_entries(&config.env)?;
    for entry in &common.env {
        env.push(parse_env_entry(entry)?);
    }
    Ok(env)
}

async fn run_process(image: ImageRef, config: RunConfig, common: &CommonArgs) -> Result<i32> {
    let mut args = config.process_args()?;
    args.env = env_entries(&config, common)?;

    let mut process = Process::new(image.as_str(), args);
    if !config.remove {
        process = process.keep();
    }

    let result = process.run().await;

    std::io::stdout().write_all(process.stdout())?;
    std::io::stderr().write_all(process.stderr())?;
    result?;

    Ok(exit_status(process.exit_code()))
}

async fn run_exec(
    image: ImageRef,
    config: RunConfig,
    common: &CommonArgs,
    execution: Execution,
) -> Result<i32> {
    let mut env = env_entries(&config, common)?;
    env.extend(execution.env().iter().cloned());
    let execution = execution.with_env(env);

    let container = Container::new(image, config.machine()).with_retry(config.retry);

    let mut progress = container.pull_image().await?;
    while let Some(payload) = progress.next().await {
        if payload.is_error() {
            return Err(Error::remote(
                Operation::PullImage,
                ClientError::Stream(payload.error),
            ));
        }
        tracing::debug!(id = %payload.id, status = %payload.status, "pull");
    }

    let create = CreateConfig {
        name: config.name.clone().unwrap_or_default(),
        container: ContainerCreateBody {
            open_stdin: Some(true),
            ..Default::default()
        },
        host: None,
        network: None,
    };
    let container = container.create(create).await?.start().await?;

    let result = print_exec_output(&container, &execution).await;
    container.remove(true).await?;
    result?;

    let code = execution.inspection().and_then(|i| i.exit_code);
    Ok(exit_status(code))
}

async fn print_exec_output(
    container: &Container<dockproc::container::Started>,
    execution: &Execution,
) -> Result<()> {
    let mut output = container.exec(execution).await?;
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    while let Some(payload) = output.next().await {
        match payload.stream {
            StreamType::Stderr => stderr.write_all(&payload.data)?,
            _ => stdout.write_all(&payload.data)?,
        }
    }
    stdout.flush()?;
    Ok(())
}

fn exit_status(code: Option<i64>) -> i32 {
    code.map_or(0, |c| i32::try_from(c).unwrap_or(1))
}
