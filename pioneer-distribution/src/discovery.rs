//! mDNS-based peer discovery. Each node publishes a `_pioneer._tcp.local.`
//! service record; a background task folds add/remove/expire events from
//! `libp2p`'s mDNS behaviour into a process-global peer set.

use std::sync::Arc;

use futures::StreamExt as _;
use libp2p::mdns::{tokio::Behaviour as MdnsBehaviour, Config as MdnsConfig, Event as MdnsEvent};
use libp2p::swarm::{SwarmBuilder, SwarmEvent};
use libp2p::{identity, PeerId as Libp2pPeerId};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const SERVICE_NAME: &str = "_pioneer._tcp.local.";

/// The process-global set of peers seen via mDNS, keyed by the textual
/// address wrapper code (the consensus engine, the lock manager) treats as
/// a [`pioneer_consensus::PeerId`]. Loopback addresses never enter the set.
pub struct PeerDiscovery {
    peers: Arc<RwLock<Vec<String>>>,
    local_peer_id: Libp2pPeerId,
}

impl PeerDiscovery {
    pub fn peers_handle(&self) -> Arc<RwLock<Vec<String>>> {
        Arc::clone(&self.peers)
    }

    pub async fn peers(&self) -> Vec<String> {
        self.peers.read().await.clone()
    }

    /// Build a swarm advertising and browsing for `_pioneer._tcp.local.`
    /// and spawn the background task that keeps `peers` current. Returns
    /// immediately; discovery runs for the lifetime of the returned handle.
    pub fn start() -> anyhow::Result<Arc<Self>> {
        let keypair = identity::Keypair::generate_ed25519();
        let local_peer_id = Libp2pPeerId::from(keypair.public());

        let mdns = MdnsBehaviour::new(MdnsConfig::default(), local_peer_id)?;
        let mut swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                Default::default(),
                libp2p::noise::Config::new,
                libp2p::yamux::Config::default,
            )?
            .with_behaviour(|_| mdns)?
            .build();

        swarm.listen_on("/ip4/0.0.0.0/tcp/0".parse()?)?;

        let handle = Arc::new(Self { peers: Arc::new(RwLock::new(Vec::new())), local_peer_id });
        let peers = Arc::clone(&handle.peers);

        tokio::spawn(async move {
            loop {
                match swarm.select_next_some().await {
                    SwarmEvent::Behaviour(MdnsEvent::Discovered(found)) => {
                        let mut peers = peers.write().await;
                        for (peer_id, addr) in found {
                            if addr.iter().any(is_loopback) || peer_id == local_peer_id {
                                continue;
                            }
                            let entry = peer_id.to_string();
                            if !peers.contains(&entry) {
                                info!(peer = %entry, %addr, "peer discovered");
                                peers.push(entry);
                            }
                        }
                    }
                    SwarmEvent::Behaviour(MdnsEvent::Expired(expired)) => {
                        let mut peers = peers.write().await;
                        for (peer_id, _) in expired {
                            let entry = peer_id.to_string();
                            peers.retain(|p| p != &entry);
                            debug!(peer = %entry, "peer expired");
                        }
                    }
                    SwarmEvent::NewListenAddr { address, .. } => {
                        debug!(%address, "listening");
                    }
                    other => {
                        warn!(?other, "unhandled swarm event");
                    }
                }
            }
        });

        Ok(handle)
    }

    pub fn local_peer_id(&self) -> Libp2pPeerId {
        self.local_peer_id
    }
}

fn is_loopback(protocol: libp2p::multiaddr::Protocol) -> bool {
    matches!(
        protocol,
        libp2p::multiaddr::Protocol::Ip4(addr) if addr.is_loopback()
    )
}
