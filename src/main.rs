use anyhow::Context;
use dockerw::adapters::{exec_docker, passthrough};
use dockerw::utils::logger;
use dockerw::{CliConfig, DockerCli, DockerwError, RunEngine, RunOutcome, SystemHost};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::from_env_args();

    logger::init_cli_logger(config.verbose);
    tracing::debug!("dockerw {} args: {:?}", env!("CARGO_PKG_VERSION"), config.args);

    let launch_dir = std::env::current_dir().context("failed to read the current directory")?;
    let docker = DockerCli::new();

    let invocation = if config.is_run() {
        let host = SystemHost::detect().unwrap_or_else(|e| fail(e));
        let engine = RunEngine::new(&docker, &host, launch_dir);

        match engine.run(config.run_args().to_vec()).await {
            Ok(RunOutcome::Print(text)) => {
                println!("{}", text);
                return Ok(());
            }
            Ok(RunOutcome::Exec(invocation)) => invocation,
            Err(e) => fail(e),
        }
    } else {
        passthrough(&docker, config.args, launch_dir)
    };

    fail(exec_docker(&invocation))
}

fn fail(e: DockerwError) -> ! {
    tracing::error!(
        "dockerw failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}
