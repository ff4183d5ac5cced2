use std::fmt::Write;
use std::time::Duration;

use crate::icmp::{self, ReplyKind};
use crate::ping::ProbeOutcome;
use crate::stat::Stats;

/// Render the lines printed for one probe outcome. `stats` must already
/// include this probe.
pub fn render(outcome: &ProbeOutcome, stats: &Stats) -> Vec<String> {
    let reply = match outcome {
        ProbeOutcome::Timeout => return vec!["Request timed out.".to_string()],
        ProbeOutcome::Success(reply) => reply,
    };

    let mut lines = Vec::with_capacity(2);
    if !reply.is_echo_reply_type() {
        lines.push(format!(
            "Expecting echo reply, instead got {}",
            icmp::type_name(reply.icmp_type)
        ));
    }

    lines.push(match reply.kind {
        ReplyKind::EchoReply => format!(
            "Reply from {}: time={} loss={}%",
            reply.source,
            format_rtt(reply.rtt),
            stats.loss_percent()
        ),
        ReplyKind::DestinationUnreachable => "Could not reach host".to_string(),
        ReplyKind::Other(code) => format!("Received code {}", code),
    });

    lines
}

/// Print the lines of one probe outcome on stdout.
pub fn print(outcome: &ProbeOutcome, stats: &Stats) {
    for line in render(outcome, stats) {
        println!("{}", line);
    }
}

/// Format a round-trip time truncated to milliseconds: `0s`, `23ms`,
/// `1.5s`, `1m2.003s`, `1h0m0s`.
pub fn format_rtt(rtt: Duration) -> String {
    let ms = rtt.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }
    if ms < 1000 {
        return format!("{}ms", ms);
    }

    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let secs = (ms / 1000) % 60;
    let frac = ms % 1000;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    let _ = write!(out, "{}", secs);
    if frac > 0 {
        let frac = format!("{:03}", frac);
        let _ = write!(out, ".{}", frac.trim_end_matches('0'));
    }
    out.push('s');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use crate::icmp::EchoReply;

    fn reply(icmp_type: u8, code: u8, kind: ReplyKind) -> ProbeOutcome {
        ProbeOutcome::Success(EchoReply {
            kind,
            icmp_type,
            code,
            identifier: 1,
            sequence: 1,
            source: Ipv4Addr::new(10, 0, 0, 1),
            rtt: Duration::from_micros(12_700),
            raw_length: 8,
        })
    }

    fn stats(total: u64, lost: u64) -> Stats {
        Stats { total, lost }
    }

    #[test]
    fn timeout() {
        assert_eq!(render(&ProbeOutcome::Timeout, &stats(1, 1)), vec!["Request timed out."]);
    }

    #[test]
    fn echo_reply() {
        let lines = render(&reply(0, 0, ReplyKind::EchoReply), &stats(3, 1));
        assert_eq!(lines, vec!["Reply from 10.0.0.1: time=12ms loss=34%"]);
    }

    #[test]
    fn unreachable_ignores_duration() {
        let lines = render(&reply(3, 1, ReplyKind::DestinationUnreachable), &stats(1, 0));
        assert_eq!(
            lines,
            vec![
                "Expecting echo reply, instead got destination unreachable",
                "Could not reach host"
            ]
        );
    }

    #[test]
    fn other_code() {
        let lines = render(&reply(11, 0, ReplyKind::Other(0)), &stats(1, 0));
        assert_eq!(
            lines,
            vec!["Expecting echo reply, instead got time exceeded", "Received code 0"]
        );

        let lines = render(&reply(0, 5, ReplyKind::Other(5)), &stats(1, 0));
        assert_eq!(lines, vec!["Received code 5"]);
    }

    #[test]
    fn rtt_format() {
        assert_eq!(format_rtt(Duration::from_micros(900)), "0s");
        assert_eq!(format_rtt(Duration::from_micros(23_999)), "23ms");
        assert_eq!(format_rtt(Duration::from_millis(1000)), "1s");
        assert_eq!(format_rtt(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_rtt(Duration::from_millis(62_003)), "1m2.003s");
        assert_eq!(format_rtt(Duration::from_secs(3600)), "1h0m0s");
    }
}
