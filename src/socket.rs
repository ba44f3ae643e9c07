//! UDP 소켓 래퍼
//!
//! 송신/수신 루프가 `Arc`로 공유한다. 설정에 장애 주입이 있으면
//! 송신 직전에 손실/중복을 적용한다.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::net::UdpSocket;
use tracing::{trace, warn};

use crate::packet::PacketKind;
use crate::simulator::{Fate, FaultInjector};
use crate::stats::TransportStats;
use crate::{Config, Result};

/// 송신 대기 패킷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbox {
    /// 목적지
    pub peer: SocketAddr,

    /// 직렬화된 패킷
    pub frame: Bytes,

    pub kind: PacketKind,
}

impl Outbox {
    pub fn new(peer: SocketAddr, frame: Bytes, kind: PacketKind) -> Self {
        Self { peer, frame, kind }
    }
}

/// 데이터그램 링크
#[derive(Debug)]
pub struct Link {
    socket: UdpSocket,
    faults: Option<Mutex<FaultInjector>>,
    stats: Arc<RwLock<TransportStats>>,
}

impl Link {
    /// 소켓 바인딩
    pub async fn bind(config: &Config, stats: Arc<RwLock<TransportStats>>) -> Result<Self> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        let faults = config
            .faults
            .clone()
            .map(|faults| Mutex::new(FaultInjector::new(faults)));

        Ok(Self {
            socket,
            faults,
            stats,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 데이터그램 수신
    pub async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// 패킷 하나 송신
    ///
    /// 실패는 손실과 같게 취급한다. 기록만 하고 재전송에 맡긴다.
    pub async fn transmit(&self, outbox: &Outbox) {
        let fate = match &self.faults {
            Some(injector) => injector.lock().fate(outbox.kind),
            None => Fate::Deliver,
        };

        let copies = match fate {
            Fate::Drop => {
                trace!("장애 주입: {:?} 패킷 버림 -> {}", outbox.kind, outbox.peer);
                self.stats.write().simulated_drops += 1;
                return;
            }
            Fate::Deliver => 1,
            Fate::Duplicate => 2,
        };

        for _ in 0..copies {
            if let Err(e) = self.socket.send_to(&outbox.frame, outbox.peer).await {
                warn!("송신 실패: peer={}, {}", outbox.peer, e);
                self.stats.write().send_errors += 1;
            }
        }
    }

    /// 여러 패킷 송신
    pub async fn transmit_all(&self, outbox: &[Outbox]) {
        for item in outbox {
            self.transmit(item).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{data_frame, Packet};
    use crate::simulator::FaultConfig;
    use std::time::Duration;

    fn loopback() -> Config {
        Config::new("127.0.0.1:0".parse().unwrap())
    }

    #[tokio::test]
    async fn test_transmit_over_loopback() {
        let stats = Arc::new(RwLock::new(TransportStats::new()));
        let a = Link::bind(&loopback(), stats.clone()).await.unwrap();
        let b = Link::bind(&loopback(), stats.clone()).await.unwrap();

        let outbox = Outbox::new(b.local_addr().unwrap(), data_frame(9, b"ping"), PacketKind::Data);
        a.transmit(&outbox).await;

        let mut buf = [0u8; 64];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), b.recv_from(&mut buf))
            .await
            .expect("recv timed out")
            .unwrap();

        assert_eq!(from, a.local_addr().unwrap());
        let packet = Packet::decode(&Bytes::copy_from_slice(&buf[..len])).unwrap();
        assert_eq!(packet.kind(), PacketKind::Data);
    }

    #[tokio::test]
    async fn test_injected_loss_is_counted() {
        let stats = Arc::new(RwLock::new(TransportStats::new()));
        let config = loopback().with_faults(FaultConfig::lossy(1.0).with_seed(3));
        let a = Link::bind(&config, stats.clone()).await.unwrap();

        let target: SocketAddr = "127.0.0.1:9".parse().unwrap();
        a.transmit_all(&[
            Outbox::new(target, data_frame(1, b"x"), PacketKind::Data),
            Outbox::new(target, data_frame(2, b"y"), PacketKind::Data),
        ])
        .await;

        assert_eq!(stats.read().simulated_drops, 2);
    }
}
