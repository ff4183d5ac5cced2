use std::io::{self, ErrorKind};
use std::net::Ipv4Addr;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{after, bounded, select, Sender};
use log::{debug, info, trace, warn};

use crate::error::Error;
use crate::icmp::{self, EchoReply, MAX_PACKET_SIZE};
use crate::stat::Stats;
use crate::transport::{Connector, IcmpConnector, Transport, TransportGuard};

/// PingOption holds what every probe of a run has in common.
#[derive(Debug, Clone)]
pub struct PingOption {
    /// How long to wait for a reply.
    pub timeout: Duration,
    /// Identifier of the echo requests, used to recognize our replies.
    pub ident: u16,
    pub seq: u16,
    pub payload: Vec<u8>,
}

impl PingOption {
    /// Options identified by the low 16 bits of the process id, with a fixed
    /// sequence number of 1 and an empty payload.
    pub fn new(timeout: Duration) -> Self {
        PingOption {
            timeout,
            ident: process::id() as u16,
            seq: 1,
            payload: Vec::new(),
        }
    }
}

/// The result of one probe. Exactly one per probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success(EchoReply),
    Timeout,
}

/// A datagram handed from the listener thread to the probe.
struct Datagram {
    bytes: Vec<u8>,
    source: Ipv4Addr,
    received_at: Instant,
}

/// Pinger sends one echo request per call and waits for its answer.
pub struct Pinger<C: Connector = IcmpConnector> {
    connector: C,
    popt: PingOption,
}

impl Pinger<IcmpConnector> {
    pub fn with_icmp_socket(popt: PingOption) -> Self {
        Pinger::new(IcmpConnector, popt)
    }
}

impl<C: Connector> Pinger<C> {
    pub fn new(connector: C, popt: PingOption) -> Self {
        Pinger { connector, popt }
    }

    pub fn option(&self) -> &PingOption {
        &self.popt
    }

    /// Run one probe cycle against `dest`: open a transport, send an echo
    /// request and race the reply against the timeout.
    ///
    /// The attempt is always counted in `stats`, a timeout is counted as a
    /// loss. The transport is closed before returning on every path.
    pub fn ping_once(&self, dest: Ipv4Addr, stats: &mut Stats) -> Result<ProbeOutcome, Error> {
        stats.record_attempt();

        let transport = TransportGuard::new(self.connector.connect(self.popt.timeout)?);
        let request = icmp::encode(self.popt.ident, self.popt.seq, &self.popt.payload)?;

        let sent_at = Instant::now();
        let sent = transport
            .send_to(&request, dest)
            .map_err(|e| Error::transport("fail to send echo request", e))?;
        if sent != request.len() {
            return Err(Error::transport(
                "fail to send echo request",
                io::Error::new(
                    ErrorKind::WriteZero,
                    format!("sent {} of {} bytes", sent, request.len()),
                ),
            ));
        }
        debug!("sent {} bytes to {} id={} seq={}", sent, dest, self.popt.ident, self.popt.seq);

        // Capacity 1: the listener never blocks on a result nobody reads.
        let (tx, rx) = bounded(1);
        listen(
            transport.share(),
            tx,
            self.popt.ident,
            sent_at + self.popt.timeout,
        )?;

        let deadline = after(self.popt.timeout);
        let received = select! {
            recv(rx) -> msg => match msg {
                Ok(result) => Some(result),
                // The listener gave up on its own, the deadline still decides.
                Err(_) => {
                    let _ = deadline.recv();
                    None
                }
            },
            recv(deadline) -> _ => None,
        };

        let datagram = match received {
            None => {
                stats.record_loss();
                debug!("no reply from {} within {:?}", dest, self.popt.timeout);
                return Ok(ProbeOutcome::Timeout);
            }
            Some(Ok(datagram)) => datagram,
            Some(Err(e)) => return Err(Error::transport("fail to receive echo reply", e)),
        };

        let rtt = datagram.received_at.duration_since(sent_at);
        let message = icmp::strip_ip_header(&datagram.bytes)?;
        let reply = icmp::decode(message, datagram.source, rtt)?;
        debug!(
            "received type={} code={} from {} in {:?}",
            reply.icmp_type, reply.code, reply.source, rtt
        );

        Ok(ProbeOutcome::Success(reply))
    }

    /// Probe `dest` `count` times, or until the process is interrupted when
    /// `count` is `None`, sleeping `interval` before each probe.
    ///
    /// `on_outcome` sees every outcome after `stats` has been updated for it.
    /// Malformed replies are logged and skipped, any other error ends the run.
    pub fn run<F>(
        &self,
        dest: Ipv4Addr,
        count: Option<u64>,
        interval: Duration,
        stats: &mut Stats,
        mut on_outcome: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&ProbeOutcome, &Stats),
    {
        let mut sent_count = 0;
        while count.map_or(true, |count| sent_count < count) {
            thread::sleep(interval);
            sent_count += 1;

            match self.ping_once(dest, stats) {
                Ok(outcome) => on_outcome(&outcome, stats),
                Err(e) if !e.is_fatal() => warn!("probe {} skipped: {}", sent_count, e),
                Err(e) => {
                    debug!("probe {} failed", sent_count);
                    return Err(e);
                }
            }
        }

        info!("sent {} echo requests and exit", sent_count);
        Ok(())
    }
}

// Spawn the receiving side of the race. The thread only talks through `tx`;
// once the probe stops listening its send fails and is ignored. It ends on
// the first candidate reply, on a receive error, on the socket read timeout
// or once `deadline` has passed.
fn listen<T: Transport>(
    transport: Arc<T>,
    tx: Sender<io::Result<Datagram>>,
    ident: u16,
    deadline: Instant,
) -> Result<(), Error> {
    let check_ident = transport.checks_identifier();

    thread::Builder::new()
        .name("icmp-listener".to_string())
        .spawn(move || {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            loop {
                let (n, source) = match transport.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                        return;
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };
                let received_at = Instant::now();

                if let Ok(message) = icmp::strip_ip_header(&buf[..n]) {
                    if !icmp::is_reply_candidate(message, ident, check_ident) {
                        trace!("skip {} bytes from {}", n, source);
                        if received_at >= deadline {
                            return;
                        }
                        continue;
                    }
                }

                let _ = tx.send(Ok(Datagram {
                    bytes: buf[..n].to_vec(),
                    source,
                    received_at,
                }));
                return;
            }
        })
        .map_err(|e| Error::transport("fail to spawn icmp listener", e))?;

    Ok(())
}
