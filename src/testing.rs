//! 메모리 내 테스트 하네스
//!
//! 소켓 없이 송신/수신 파이프라인을 직접 구동한다. 패킷은 호출자가
//! 손으로 옮기므로 손실, 중복, 순서 바꿈을 결정적으로 재현할 수 있다.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::delivery::ReceivedFrame;
use crate::endpoint::Shared;
use crate::handshake::HandshakeStatus;
use crate::packet::Sequence;
use crate::receiver::process_datagram;
use crate::sender::Outbound;
use crate::socket::Outbox;
use crate::stats::TransportStats;
use crate::Config;

pub(crate) struct MemoryNode {
    pub(crate) addr: SocketAddr,
    pub(crate) shared: Arc<Shared>,
    pub(crate) outbound: Outbound,
}

impl MemoryNode {
    pub(crate) fn new(port: u16) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let stats = Arc::new(RwLock::new(TransportStats::new()));
        let shared = Arc::new(Shared::new(Config::new(addr), stats));

        Self {
            addr,
            outbound: Outbound::new(shared.clone()),
            shared,
        }
    }

    pub(crate) fn connect(&self, peer: SocketAddr) -> bool {
        let initiated = self.shared.peers.initiate(peer);
        if initiated {
            self.shared.submissions.submit_handshake(peer);
        }
        initiated
    }

    pub(crate) fn send(&self, peer: SocketAddr, payload: &[u8]) -> Sequence {
        self.shared.submissions.submit(peer, payload)
    }

    /// 제출 큐 비우기
    pub(crate) fn flush(&mut self) -> Vec<Outbox> {
        self.outbound.collect_submissions()
    }

    pub(crate) fn retry_handshakes(&self) -> Vec<Outbox> {
        self.outbound.collect_handshake_retries()
    }

    pub(crate) fn retransmit(&mut self) -> Vec<Outbox> {
        self.outbound.collect_retransmits()
    }

    /// 데이터그램 하나 수신, 회신 패킷 반환
    pub(crate) fn receive(&self, from: SocketAddr, datagram: Bytes) -> Vec<Outbox> {
        process_datagram(&self.shared, from, datagram)
            .into_iter()
            .collect()
    }

    pub(crate) fn status(&self, peer: SocketAddr) -> Option<HandshakeStatus> {
        self.shared.peers.status(&peer)
    }

    pub(crate) fn drain(&self) -> Vec<ReceivedFrame> {
        let mut frames = Vec::new();
        self.shared.deliveries.drain_into(&mut frames);
        frames
    }
}

/// 손실 없이 `outbox`를 주고받기가 끝날 때까지 전달
///
/// `from`이 보낸 패킷 목록에서 시작한다.
pub(crate) fn deliver(from: &MemoryNode, to: &MemoryNode, outbox: Vec<Outbox>) {
    let mut in_flight: Vec<(bool, Outbox)> = outbox.into_iter().map(|o| (true, o)).collect();

    while let Some((forward, outbox)) = in_flight.pop() {
        let (sender, receiver) = if forward { (from, to) } else { (to, from) };
        assert_eq!(outbox.peer, receiver.addr);

        let replies = receiver.receive(sender.addr, outbox.frame);
        in_flight.extend(replies.into_iter().map(|o| (!forward, o)));
    }
}

/// `x`를 주동측으로 핸드쉐이크 완료
pub(crate) fn establish(x: &mut MemoryNode, y: &mut MemoryNode) {
    x.connect(y.addr);

    let mut outbox = x.flush();
    if outbox.is_empty() {
        outbox = x.retry_handshakes();
    }
    deliver(x, y, outbox);

    assert_eq!(x.status(y.addr), Some(HandshakeStatus::EstablishedAsInitiator));
    assert_eq!(y.status(x.addr), Some(HandshakeStatus::EstablishedAsResponder));
}
