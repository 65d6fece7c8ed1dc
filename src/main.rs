use color_eyre::eyre::{
    Result,
    eyre,
};
use lottery_dashboard::{
    controller::{
        self,
        AppConfig,
        NetworkTarget,
    },
    deployment,
    wallet::{
        self,
        ConnectAuth,
        WALLET_PASSWORD_ENV,
    },
};
use std::time::Duration;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 120;
const LOG_FILE: &str = "lottery-dashboard.log";

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: lottery-dashboard [--sepolia | --local] [--rpc-url <url>]\n\
         [--chain-id <id>] [--wallet <name>] [--wallet-dir <path>]\n\
         [--confirm-timeout-secs <n>]\n\
         \n\
         Flags:\n\
           --sepolia                  Connect to Sepolia (default RPC {})\n\
           --local                    Connect to a local node (default RPC {})\n\
           --rpc-url <url>            Override the RPC URL for the selected network\n\
           --chain-id <id>            Chain id used to pick the recorded contract\n\
                                      address (default {})\n\
           --wallet <name>            Keystore wallet to unlock at startup\n\
           --wallet-dir <path>        Override the wallet directory\n\
                                      (defaults to ~/.lottery/wallets)\n\
           --confirm-timeout-secs <n> Abandon confirmation waits after n seconds\n\
                                      (default {})\n\
         \n\
         Set {} to unlock the startup wallet without a prompt.",
        controller::DEFAULT_SEPOLIA_RPC_URL,
        controller::DEFAULT_LOCAL_RPC_URL,
        deployment::DEFAULT_CHAIN_ID,
        DEFAULT_CONFIRM_TIMEOUT_SECS,
        WALLET_PASSWORD_ENV,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Sepolia,
        Local,
    }

    let mut args = std::env::args().skip(1);
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut chain_id: Option<u64> = None;
    let mut wallet_name: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut confirm_timeout_secs: Option<u64> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--sepolia" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --sepolia/--local"
                    ));
                }
                network_flag = Some(NetworkFlag::Sepolia);
            }
            "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --sepolia/--local"
                    ));
                }
                network_flag = Some(NetworkFlag::Local);
            }
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                if network_flag.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--sepolia/--local)"
                    ));
                }
                custom_url = Some(url);
            }
            "--chain-id" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--chain-id requires a numeric argument"))?;
                if chain_id.is_some() {
                    return Err(eyre!("--chain-id may only be specified once"));
                }
                let parsed = raw
                    .parse::<u64>()
                    .map_err(|_| eyre!("--chain-id must be a decimal chain id, got {raw:?}"))?;
                chain_id = Some(parsed);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--confirm-timeout-secs" => {
                let raw = args.next().ok_or_else(|| {
                    eyre!("--confirm-timeout-secs requires a numeric argument")
                })?;
                if confirm_timeout_secs.is_some() {
                    return Err(eyre!("--confirm-timeout-secs may only be specified once"));
                }
                let parsed = raw.parse::<u64>().map_err(|_| {
                    eyre!("--confirm-timeout-secs must be a number of seconds, got {raw:?}")
                })?;
                if parsed == 0 {
                    return Err(eyre!("--confirm-timeout-secs must be greater than zero"));
                }
                confirm_timeout_secs = Some(parsed);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag {
        None => {
            return Err(eyre!("Select a network with --sepolia or --local"));
        }
        Some(NetworkFlag::Sepolia) => NetworkTarget::Sepolia {
            url: custom_url
                .unwrap_or_else(|| controller::DEFAULT_SEPOLIA_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Local) => NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| controller::DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    let startup_auth = resolve_startup_auth(wallet_name.as_deref())?;
    let wallet_dir = wallet::resolve_wallet_dir(wallet_dir.as_deref())?;

    Ok(AppConfig {
        network,
        chain_id: chain_id.unwrap_or(deployment::DEFAULT_CHAIN_ID),
        wallet_name,
        wallet_dir,
        confirm_timeout: Duration::from_secs(
            confirm_timeout_secs.unwrap_or(DEFAULT_CONFIRM_TIMEOUT_SECS),
        ),
        startup_auth,
    })
}

/// Startup connects only when the user named a wallet. The passphrase
/// comes from the environment when available, otherwise from a prompt
/// before the terminal UI takes over.
fn resolve_startup_auth(wallet_name: Option<&str>) -> Result<Option<ConnectAuth>> {
    let Some(name) = wallet_name else {
        return Ok(None);
    };
    if std::env::var(WALLET_PASSWORD_ENV).is_ok() {
        return Ok(Some(ConnectAuth::Authorized));
    }
    let passphrase = rpassword::prompt_password(format!(
        "Enter passphrase for wallet '{name}' (leave empty to connect later): "
    ))?;
    if passphrase.is_empty() {
        Ok(None)
    } else {
        Ok(Some(ConnectAuth::Interactive { passphrase }))
    }
}

// The TUI owns stdout, so logs go to a file next to the binary.
fn init_tracing() -> WorkerGuard {
    let file_appender = rolling::never(".", LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _guard = init_tracing();
    tracing::info!("starting lottery dashboard");
    deployment::ensure_structure()?;
    let config = parse_cli_args()?;
    controller::run_app(config).await
}
