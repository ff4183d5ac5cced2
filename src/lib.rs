//! An ICMP echo tool: resolve a target, send echo requests one at a time and
//! report round-trip time and cumulative packet loss.
//!
//! ```no_run
//! use std::time::Duration;
//! use echoping::{resolve, PingOption, Pinger, Stats};
//!
//! let dest = resolve("127.0.0.1").unwrap();
//! let pinger = Pinger::with_icmp_socket(PingOption::new(Duration::from_secs(1)));
//! let mut stats = Stats::new();
//! let outcome = pinger.ping_once(dest, &mut stats).unwrap();
//! echoping::report::print(&outcome, &stats);
//! ```

pub mod error;
pub mod icmp;
pub mod ping;
pub mod report;
pub mod resolve;
pub mod stat;
pub mod transport;

pub use error::Error;
pub use icmp::{EchoReply, ReplyKind};
pub use ping::{PingOption, Pinger, ProbeOutcome};
pub use resolve::resolve;
pub use stat::Stats;
