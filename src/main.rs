use anyhow::Context;
use steward::app::StewardApp;
use steward::config::{FleetConfig, StewardConfig};
use steward::telemetry;

enum CliCommand {
    Run { fleet_config_path: Option<String> },
    Validate { configs: Vec<String> },
    Help,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise telemetry")?;

    match parse_cli_args()? {
        CliCommand::Run { fleet_config_path } => {
            let mut config = StewardConfig::load().context("failed to load configuration")?;
            if let Some(path) = fleet_config_path {
                config.fleet_config_path = Some(path);
            }

            let app =
                StewardApp::initialise(config).context("failed to construct application")?;

            app.run().await.context("application runtime error")?;
            Ok(())
        }
        CliCommand::Validate { configs } => run_validate_command(configs),
        CliCommand::Help => {
            print_help();
            Ok(())
        }
    }
}

fn parse_cli_args() -> anyhow::Result<CliCommand> {
    let mut args = std::env::args().skip(1);
    let Some(first) = args.next() else {
        return Ok(CliCommand::Run {
            fleet_config_path: None,
        });
    };

    if first == "validate" {
        let configs: Vec<String> = args.collect();
        if configs.iter().any(|arg| arg == "-h" || arg == "--help") {
            return Ok(CliCommand::Help);
        }
        if configs.is_empty() {
            anyhow::bail!("steward validate requires at least one config path");
        }
        return Ok(CliCommand::Validate { configs });
    }

    let mut fleet_config_path = None;
    let mut pending = Some(first);

    loop {
        let arg = match pending.take() {
            Some(value) => value,
            None => match args.next() {
                Some(value) => value,
                None => break,
            },
        };

        match arg.as_str() {
            "-c" | "--config" => {
                if fleet_config_path.is_some() {
                    anyhow::bail!("fleet config path specified multiple times");
                }
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("expected path after {arg}"))?;
                fleet_config_path = Some(value);
            }
            "-h" | "--help" => return Ok(CliCommand::Help),
            other => anyhow::bail!("unrecognised argument `{other}`"),
        }
    }

    Ok(CliCommand::Run { fleet_config_path })
}

fn run_validate_command(configs: Vec<String>) -> anyhow::Result<()> {
    let mut had_error = false;

    for config in configs {
        match FleetConfig::from_path(&config) {
            Ok(fleet) => println!("validated {} ({} target(s))", config, fleet.targets.len()),
            Err(err) => {
                eprintln!("{err}");
                had_error = true;
            }
        }
    }

    if had_error {
        Err(anyhow::anyhow!("one or more configs failed validation"))
    } else {
        Ok(())
    }
}

fn print_help() {
    println!(
        "\
Usage: steward [OPTIONS]
       steward validate <CONFIG>...

Options:
  -c, --config <PATH>    Path to the fleet YAML file
  -h, --help             Print this help message

Validate:
  Checks each fleet YAML file and reports every problem found.
"
    );
}
