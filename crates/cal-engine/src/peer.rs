//! Peer-process topology and cross-process best-list exchange.
//!
//! An external launcher may schedule several cooperating processes, assigning
//! each a rank through the environment. Every peer runs the same algorithm on
//! its own contiguous candidate slice; once its local thread pool has fully
//! joined, rank 0 collects every other peer's sorted best list over TCP and
//! folds each into its own, keeping the global Top-N. Only rank 0 reports.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::ops::Range;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use cal_types::{CalError, CalResult};

use crate::bests::{BestEntry, BestSet};
use crate::partition::split_evenly;

/// Environment variable carrying this process's rank (default 0).
pub const RANK_VAR: &str = "CALIBRA_RANK";
/// Environment variable carrying the peer count (default 1).
pub const PEERS_VAR: &str = "CALIBRA_PEERS";
/// Environment variable carrying the coordinator's listen address.
pub const COORD_VAR: &str = "CALIBRA_COORD";

const CONNECT_RETRY: Duration = Duration::from_millis(100);
const CONNECT_DEADLINE: Duration = Duration::from_secs(30);

/// This process's position in the peer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub rank: usize,
    pub peers: usize,
}

impl Topology {
    /// A single process working the whole candidate range.
    pub fn single() -> Self {
        Self { rank: 0, peers: 1 }
    }

    /// Read rank and peer count from the environment set by the launcher.
    pub fn from_env() -> CalResult<Self> {
        let rank = read_env(RANK_VAR, 0)?;
        let peers = read_env(PEERS_VAR, 1)?;
        if peers == 0 || rank >= peers {
            return Err(CalError::Internal(format!(
                "invalid peer topology: rank {rank} of {peers}"
            )));
        }
        Ok(Self { rank, peers })
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }

    /// This peer's contiguous slice of the candidate range, by the same even
    /// split used for threads within the slice.
    pub fn slice(&self, nsimulations: usize) -> Range<usize> {
        split_evenly(0..nsimulations, self.peers)[self.rank].clone()
    }
}

fn read_env(name: &str, default: usize) -> CalResult<usize> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<usize>()
            .map_err(|_| CalError::Internal(format!("{name} is not a number: {value:?}"))),
        Err(_) => Ok(default),
    }
}

/// Combine the peers' local best lists into the global one.
///
/// Returns `Ok(Some(global))` on the coordinator and `Ok(None)` on every
/// other rank. With a single peer the local list is already global.
pub fn exchange(
    topology: &Topology,
    address: Option<&str>,
    local: BestSet,
) -> CalResult<Option<BestSet>> {
    if topology.peers <= 1 {
        return Ok(Some(local));
    }
    let address = address.ok_or_else(|| {
        CalError::Internal(format!("{COORD_VAR} must be set when peers > 1"))
    })?;
    if topology.is_coordinator() {
        let listener = TcpListener::bind(address)?;
        info!(address, senders = topology.peers - 1, "collecting peer results");
        collect_peers(&listener, local, topology.peers - 1).map(Some)
    } else {
        send_bests(address, &local)?;
        Ok(None)
    }
}

/// Coordinator side: accept one connection per sender and fold each sorted
/// list into the local set via the pairwise merge.
pub fn collect_peers(
    listener: &TcpListener,
    mut local: BestSet,
    senders: usize,
) -> CalResult<BestSet> {
    for _ in 0..senders {
        let (stream, peer_address) = listener.accept()?;
        debug!(%peer_address, "peer connected");
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line)?;
        let entries: Vec<BestEntry> = serde_json::from_str(line.trim())?;
        local.merge(&entries);
    }
    Ok(local)
}

/// Non-coordinator side: transmit the sorted local list as one JSON line.
pub fn send_bests(address: &str, local: &BestSet) -> CalResult<()> {
    let mut stream = connect_with_retry(address)?;
    let mut payload = serde_json::to_string(local.entries())?;
    payload.push('\n');
    stream.write_all(payload.as_bytes())?;
    debug!(address, entries = local.len(), "local bests sent");
    Ok(())
}

/// The coordinator only starts listening once its own slice is finished, so
/// peers that finish earlier wait for it.
fn connect_with_retry(address: &str) -> CalResult<TcpStream> {
    let deadline = Instant::now() + CONNECT_DEADLINE;
    loop {
        match TcpStream::connect(address) {
            Ok(stream) => return Ok(stream),
            Err(error) => {
                if Instant::now() >= deadline {
                    return Err(error.into());
                }
                std::thread::sleep(CONNECT_RETRY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn topology_slices_cover_the_range() {
        let mut seen = Vec::new();
        for rank in 0..3 {
            let topology = Topology { rank, peers: 3 };
            seen.extend(topology.slice(10));
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn from_env_rejects_rank_out_of_range() {
        // Touches process-global env: keep both writes in one test.
        std::env::set_var(RANK_VAR, "5");
        std::env::set_var(PEERS_VAR, "2");
        assert!(Topology::from_env().is_err());
        std::env::remove_var(RANK_VAR);
        std::env::remove_var(PEERS_VAR);
        let topology = Topology::from_env().unwrap();
        assert_eq!(topology, Topology::single());
    }

    #[test]
    fn single_peer_exchange_is_identity() {
        let mut local = BestSet::new(2);
        local.offer(3, 0.5);
        let global = exchange(&Topology::single(), None, local.clone()).unwrap();
        assert_eq!(global, Some(local));
    }

    #[test]
    fn loopback_exchange_matches_local_merge() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut coordinator_set = BestSet::new(3);
        coordinator_set.offer(1, 0.1);
        coordinator_set.offer(2, 0.4);

        let mut peer_one = BestSet::new(3);
        peer_one.offer(5, 0.2);
        peer_one.offer(6, 0.5);

        let mut peer_two = BestSet::new(3);
        peer_two.offer(9, 0.05);

        let senders: Vec<_> = [peer_one.clone(), peer_two.clone()]
            .into_iter()
            .map(|set| {
                let address = address.clone();
                thread::spawn(move || send_bests(&address, &set).unwrap())
            })
            .collect();

        let global = collect_peers(&listener, coordinator_set, 2).unwrap();
        for sender in senders {
            sender.join().unwrap();
        }

        let ranked: Vec<(usize, f64)> = global
            .entries()
            .iter()
            .map(|e| (e.candidate, e.value))
            .collect();
        assert_eq!(ranked, vec![(9, 0.05), (1, 0.1), (5, 0.2)]);
    }
}
