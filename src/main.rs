use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use devscan::{
    api,
    config::ScanConfig,
    network::Credentials,
    output::{OutputConfig, OutputFormat, OutputManager},
    scanner::{DeviceStatus, ScanEngine, ScanRequest},
    utils::profiles::{parse_port_list, ScanProfile},
    utils::target_parser::{parse_ipv4, IpRange},
    utils::Logger,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(ulimit: Option<u64>) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            println!(
                "{} {}",
                "[~] Increasing ulimit value to".bright_blue(),
                limit.to_string().bright_cyan().bold()
            );
        } else {
            eprintln!("{}", "[!] Failed to set ulimit value".bright_red());
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(_) => {
            eprintln!("{}", "[!] Could not get file descriptor limit".bright_yellow());
            65535
        }
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_ulimit: Option<u64>) -> u64 {
    65535
}

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Configuration file (default: ~/.devscan.toml)")
        .value_parser(clap::value_parser!(PathBuf))
        .global(true);

    let timeout_arg = Arg::new("timeout")
        .short('t')
        .long("timeout")
        .value_name("MS")
        .help("Connect timeout per probe in milliseconds")
        .value_parser(clap::value_parser!(u64));

    Command::new("devscan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Network device discovery: find cameras, routers and servers on an IPv4 range")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(config_arg)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v debug, -vv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("scan")
                .about("Scan an address range")
                .arg(
                    Arg::new("range")
                        .value_name("RANGE")
                        .help("a.b.c.d-e.f.g.h, a.b.c.d-n, a.b.c.d/nn or a single address")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("ports")
                        .short('p')
                        .long("ports")
                        .value_name("PORTS")
                        .help("Comma separated ports or ranges, e.g. 80,554,8000-8010"),
                )
                .arg(
                    Arg::new("profile")
                        .long("profile")
                        .value_name("PROFILE")
                        .help("Port profile when --ports is not given (camera, full)"),
                )
                .arg(timeout_arg.clone())
                .arg(
                    Arg::new("http-timeout")
                        .long("http-timeout")
                        .value_name("MS")
                        .help("HTTP fingerprint timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("chunk-size")
                        .long("chunk-size")
                        .value_name("N")
                        .help("Addresses probed concurrently per chunk")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("chunk-delay")
                        .long("chunk-delay")
                        .value_name("MS")
                        .help("Pause between chunks in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("no-http")
                        .long("no-http")
                        .help("Skip HTTP fingerprinting")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("cameras-only")
                        .long("cameras-only")
                        .help("Only list devices classified as cameras")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FORMAT")
                        .help("Output format: text, json, csv")
                        .default_value("text"),
                )
                .arg(
                    Arg::new("output-file")
                        .long("output-file")
                        .value_name("FILE")
                        .help("Write results to a file instead of stdout")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("no-color")
                        .long("no-color")
                        .help("Disable colored output")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("ulimit")
                        .short('u')
                        .long("ulimit")
                        .value_name("LIMIT")
                        .help("Raise the open file limit to this value")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("test-camera")
                .about("Probe and classify a single device")
                .arg(
                    Arg::new("address")
                        .value_name("IP")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .help("Single port to test (default: the configured profile)")
                        .value_parser(clap::value_parser!(u16).range(1..)),
                )
                .arg(Arg::new("username").long("username").value_name("USER"))
                .arg(Arg::new("password").long("password").value_name("PASS"))
                .arg(timeout_arg),
        )
        .subcommand(
            Command::new("serve").about("Run the HTTP API").arg(
                Arg::new("bind")
                    .long("bind")
                    .value_name("ADDR")
                    .help("Listen address (default: 127.0.0.1:3001)"),
            ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<ScanConfig> {
    let path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    ScanConfig::load(path).context("failed to load configuration")
}

/// CLI flags override file and environment settings
fn apply_scan_flags(mut config: ScanConfig, matches: &ArgMatches) -> anyhow::Result<ScanConfig> {
    if let Some(&timeout) = matches.get_one::<u64>("timeout") {
        config = config.with_probe_timeout(timeout);
    }
    if let Some(&timeout) = matches.get_one::<u64>("http-timeout") {
        config = config.with_http_timeout(timeout);
    }
    if let Some(&size) = matches.get_one::<usize>("chunk-size") {
        config.chunk_size = size;
    }
    if let Some(&delay) = matches.get_one::<u64>("chunk-delay") {
        config.chunk_delay_ms = delay;
    }
    if matches.get_flag("no-http") {
        config = config.with_http_fingerprint(false);
    }
    if let Some(profile) = matches.get_one::<String>("profile") {
        config = config.with_profile(profile.parse::<ScanProfile>()?);
    }

    config.validate()?;
    Ok(config)
}

async fn run_scan(config: ScanConfig, matches: &ArgMatches) -> anyhow::Result<()> {
    let config = apply_scan_flags(config, matches)?;

    let fd_limit = adjust_ulimit_size(matches.get_one::<u64>("ulimit").copied());
    log::debug!("Open file limit: {}", fd_limit);

    let range_text = matches
        .get_one::<String>("range")
        .context("missing range argument")?;
    let range = IpRange::parse(range_text)?;
    let ports = match matches.get_one::<String>("ports") {
        Some(list) => parse_port_list(list)?,
        None => config.profile.ports(),
    };

    let sockets = config.chunk_size as u64 * ports.len() as u64;
    if sockets > fd_limit {
        eprintln!(
            "{} {} {}",
            "[!] Up to".bright_yellow(),
            sockets.to_string().bright_cyan(),
            "sockets may be open at once; consider --ulimit or a smaller --chunk-size".bright_yellow()
        );
    }

    let format: OutputFormat = matches
        .get_one::<String>("output")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or_default();
    let colored = !matches.get_flag("no-color");
    let output = OutputManager::new(OutputConfig {
        format,
        file: matches.get_one::<PathBuf>("output-file").cloned(),
        colored,
        cameras_only: matches.get_flag("cameras-only"),
    });

    let engine = ScanEngine::new(config)?;
    let request = ScanRequest::new(range, ports)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.set_message(format!("Scanning {} ({} addresses)", range, range.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = engine.scan(&request).await;
    spinner.finish_and_clear();

    let report = result?;
    output.write_report(&report)?;
    Ok(())
}

async fn run_test_camera(config: ScanConfig, matches: &ArgMatches) -> anyhow::Result<()> {
    let address_text = matches
        .get_one::<String>("address")
        .context("missing address argument")?;
    let address = parse_ipv4(address_text)?;
    let ports: Vec<u16> = matches.get_one::<u16>("port").copied().into_iter().collect();
    let credentials = matches.get_one::<String>("username").map(|username| Credentials {
        username: username.clone(),
        password: matches.get_one::<String>("password").cloned(),
    });
    let timeout = matches.get_one::<u64>("timeout").map(|&ms| Duration::from_millis(ms));

    let engine = ScanEngine::new(config)?;
    match engine.test_device(address, &ports, credentials.as_ref(), timeout).await {
        DeviceStatus::Online(device) => {
            println!("{} {} is {}", "[+]".bright_green(), address, "online".bright_green().bold());
            println!("    type:         {}", device.device_type.to_string().bright_cyan());
            println!("    manufacturer: {}", device.manufacturer);
            let open: Vec<String> = device.open_ports.iter().map(u16::to_string).collect();
            println!("    open ports:   {}", open.join(", "));
            let services: Vec<&str> = device.services.iter().map(String::as_str).collect();
            println!("    services:     {}", services.join(", "));
            if let Some(latency) = device.latency_ms {
                println!("    latency:      {}ms", latency);
            }
            if let Some(http) = &device.http {
                if let Some(server) = &http.server_header {
                    println!("    server:       {}", server);
                }
                if let Some(title) = &http.title {
                    println!("    title:        {}", title);
                }
            }
        }
        DeviceStatus::Offline => {
            println!("{} {} is {}", "[-]".bright_red(), address, "offline".bright_red().bold());
        }
    }
    Ok(())
}

async fn run_serve(mut config: ScanConfig, matches: &ArgMatches) -> anyhow::Result<()> {
    if let Some(bind) = matches.get_one::<String>("bind") {
        config.bind = bind.clone();
    }
    println!("{} {}", "[~] Serving API on".bright_blue(), config.bind.bright_cyan());
    api::serve(config).await?;
    Ok(())
}

fn log_level(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    Logger::init(log_level(matches.get_count("verbose")));

    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("scan", sub)) => run_scan(config, sub).await,
        Some(("test-camera", sub)) => run_test_camera(config, sub).await,
        Some(("serve", sub)) => run_serve(config, sub).await,
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_scan_flags_override_config() {
        let matches = cli()
            .try_get_matches_from([
                "devscan", "scan", "10.0.0.1-20", "--timeout", "250", "--chunk-size", "5", "--no-http",
                "--profile", "full",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();

        let config = apply_scan_flags(ScanConfig::default(), sub).unwrap();
        assert_eq!(config.probe_timeout_ms, 250);
        assert_eq!(config.chunk_size, 5);
        assert!(!config.http_fingerprint);
        assert_eq!(config.profile, ScanProfile::Full);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let matches = cli()
            .try_get_matches_from(["devscan", "scan", "10.0.0.1", "--chunk-size", "0"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(apply_scan_flags(ScanConfig::default(), sub).is_err());
    }

    #[test]
    fn test_config_path_is_global() {
        let matches = cli()
            .try_get_matches_from(["devscan", "serve", "--config", "/tmp/devscan.toml"])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
            Some(Path::new("/tmp/devscan.toml"))
        );
    }
}
