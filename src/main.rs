use std::io::Write;
use std::process;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::{CommandFactory, Parser};
use log::debug;

use echoping::{report, resolve, PingOption, Pinger, Stats};

const INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[clap(
    name = "echoping",
    version = "0.1.0",
    about = "Send ICMP echo requests to a host, one per second, and report round-trip time and loss."
)]
struct Opt {
    #[clap(
        short = 'n',
        long = "count",
        default_value = "-1",
        allow_negative_numbers = true,
        help = "number of echo requests to send, negative means until interrupted"
    )]
    count: i64,

    #[clap(
        short = 'w',
        long = "timeout",
        default_value = "5000",
        help = "timeout in milliseconds to wait for each reply"
    )]
    timeout: u64,

    #[clap(name = "host", help = "IP address or host name, e.g. 8.8.8.8 or www.example.com")]
    host: Option<String>,
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    let opt = Opt::parse();

    let host = match opt.host {
        Some(host) => host,
        None => {
            Opt::command().print_help()?;
            return Ok(());
        }
    };

    ctrlc::set_handler(|| {
        println!("Done.");
        process::exit(0);
    })?;

    let dest = resolve(&host)?;

    let pinger = Pinger::with_icmp_socket(PingOption::new(Duration::from_millis(opt.timeout)));
    debug!("using {:?}", pinger.option());

    let count = probe_count(opt.count);
    match count {
        None => println!("Pinging {} [{}]", host, dest),
        Some(count) => println!("Pinging {} [{}] {} times", host, dest, count),
    }

    let mut stats = Stats::new();
    pinger.run(dest, count, INTERVAL, &mut stats, report::print)?;

    Ok(())
}

/// Negative counts mean "until interrupted".
fn probe_count(count: i64) -> Option<u64> {
    u64::try_from(count).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opt = Opt::try_parse_from(["echoping", "example.com"]).unwrap();
        assert_eq!(opt.count, -1);
        assert_eq!(opt.timeout, 5000);
        assert_eq!(opt.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn flags() {
        let opt = Opt::try_parse_from(["echoping", "-n", "3", "-w", "500", "10.0.0.1"]).unwrap();
        assert_eq!(opt.count, 3);
        assert_eq!(opt.timeout, 500);
        assert_eq!(opt.host.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn negative_count() {
        let opt = Opt::try_parse_from(["echoping", "-n", "-1", "10.0.0.1"]).unwrap();
        assert_eq!(opt.count, -1);
    }

    #[test]
    fn count_mapping() {
        assert_eq!(probe_count(-1), None);
        assert_eq!(probe_count(-20), None);
        assert_eq!(probe_count(0), Some(0));
        assert_eq!(probe_count(3), Some(3));
    }

    #[test]
    fn one_second_spacing() {
        assert_eq!(INTERVAL, Duration::from_secs(1));
    }

    #[test]
    fn host_is_optional() {
        let opt = Opt::try_parse_from(["echoping"]).unwrap();
        assert!(opt.host.is_none());
    }

    #[test]
    fn cli_is_consistent() {
        Opt::command().debug_assert();
    }
}
