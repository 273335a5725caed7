use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use prussd_client::{CancelToken, ClientConfig, EventOutcome, Pruss};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

const DEFAULT_CONFIG_PATH: &str = "/etc/default/prussctl.yaml";

const USAGE: &str = "usage: prussctl [-c CONFIG] <boot|shutdown|restart|status>
       prussctl [-c CONFIG] <0|1> <enable|disable|reset|pause|resume|state|regs|recv>
       prussctl [-c CONFIG] <0|1> load PATH
       prussctl [-c CONFIG] <0|1> send TEXT...
       prussctl [-c CONFIG] <0|1> wait [SECONDS]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logger();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = take_config_flag(&mut args)
        .or_else(|| std::env::var("PRUSSCTL_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    if args.is_empty() {
        bail!(USAGE);
    }

    let config = if Path::new(&config_path).exists() {
        info!("Loading configuration from: {}", config_path);
        ClientConfig::load(&config_path)
            .with_context(|| format!("Failed to load config file: {}", config_path))?
    } else {
        ClientConfig::default()
    };

    let pruss = Arc::new(Pruss::open(config).context("Failed to open PRU subsystem")?);
    let token = CancelToken::new();

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    let mut worker = {
        let pruss = Arc::clone(&pruss);
        let token = token.clone();
        tokio::task::spawn_blocking(move || run(&pruss, &args, &token))
    };

    let outcome = tokio::select! {
        result = &mut worker => result,
        _ = sigterm.recv() => {
            info!("Received SIGTERM, cancelling");
            token.cancel();
            worker.await
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, cancelling");
            token.cancel();
            worker.await
        }
    };

    match outcome.context("Command task panicked")? {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}

fn run(pruss: &Pruss, args: &[String], token: &CancelToken) -> Result<String> {
    match args[0].as_str() {
        "boot" => pruss.boot_up().map(|_| String::new()).map_err(Into::into),
        "shutdown" => pruss.shut_down().map(|_| String::new()).map_err(Into::into),
        "restart" => pruss.restart().map(|_| String::new()).map_err(Into::into),
        "status" => {
            let pru0 = pruss.pru0().query_state()?;
            let pru1 = pruss.pru1().query_state()?;
            Ok(format!("pru0: {}\npru1: {}", pru0, pru1))
        }
        number => {
            let number: u8 = number
                .parse()
                .map_err(|_| anyhow!("unknown command {:?}\n{}", number, USAGE))?;
            let pru = pruss
                .pru(number)
                .ok_or_else(|| anyhow!("no PRU with index {}", number))?;
            let action = args.get(1).ok_or_else(|| anyhow!(USAGE))?;
            let rest = &args[2..];

            match action.as_str() {
                "enable" => pru.enable()?,
                "disable" => pru.disable()?,
                "reset" => pru.reset()?,
                "pause" => pru.pause()?,
                "resume" => pru.resume()?,
                "state" => return Ok(pru.query_state()?.to_string()),
                "regs" => return Ok(pru.show_registers()?),
                "recv" => return Ok(pru.get_message()?),
                "load" => {
                    let path = rest.first().ok_or_else(|| anyhow!("load needs a firmware path"))?;
                    pru.load(path)
                        .with_context(|| format!("Failed to load firmware {}", path))?;
                }
                "send" => {
                    if rest.is_empty() {
                        bail!("send needs a message");
                    }
                    pru.send_message(&rest.join(" "))?;
                }
                "wait" => {
                    let timeout = match rest.first() {
                        Some(secs) => Some(Duration::from_secs(
                            secs.parse().context("timeout must be whole seconds")?,
                        )),
                        None => None,
                    };
                    let outcome = pru.wait_for_event_cancellable(timeout, token)?;
                    return Ok(match outcome {
                        EventOutcome::Event => "event".to_string(),
                        EventOutcome::TimedOut => "timeout".to_string(),
                    });
                }
                other => bail!("unknown action {:?}\n{}", other, USAGE),
            }
            Ok(String::new())
        }
    }
}

fn take_config_flag(args: &mut Vec<String>) -> Option<String> {
    let pos = args.iter().position(|a| a == "-c")?;
    if pos + 1 >= args.len() {
        return None;
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Some(value)
}

fn init_logger() {
    // Use `env_logger` for logging. Output goes to stderr.
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}
