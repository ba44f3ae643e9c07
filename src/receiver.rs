//! 수신 파이프라인
//!
//! 데이터그램 하나를 분류해 세션 테이블과 전달 큐를 갱신하고,
//! 회신할 패킷(핸드쉐이크 또는 ACK)이 있으면 돌려준다.
//! ACK는 전달 큐에 넣은 뒤에만 보낸다.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::delivery::ReceivedFrame;
use crate::endpoint::Shared;
use crate::packet::{ack_frame, handshake_frame, Packet, PacketKind};
use crate::session::{AckOutcome, DataOutcome};
use crate::socket::{Link, Outbox};

/// 데이터그램 하나 처리
pub(crate) fn process_datagram(shared: &Shared, peer: SocketAddr, datagram: Bytes) -> Option<Outbox> {
    let packet = match Packet::decode(&datagram) {
        Ok(packet) => packet,
        Err(e) => {
            debug!("잘못된 패킷 무시: peer={}, {}", peer, e);
            shared.stats.write().malformed += 1;
            return None;
        }
    };

    match packet {
        Packet::Handshake => {
            if !shared.peers.on_handshake(peer) {
                return None;
            }
            shared.stats.write().handshake_sent += 1;
            Some(Outbox::new(peer, handshake_frame(), PacketKind::Handshake))
        }

        Packet::Ack { sequence } => {
            let outcome = shared.peers.on_ack(peer, sequence);
            let mut stats = shared.stats.write();
            match outcome {
                AckOutcome::Settled => stats.acks_received += 1,
                AckOutcome::Duplicate => stats.duplicate_acks += 1,
                AckOutcome::NotEstablished => {
                    trace!("미완료 피어의 ACK 버림: peer={}, seq={}", peer, sequence);
                    stats.dropped_unestablished += 1;
                }
            }
            None
        }

        Packet::Data { sequence, .. } => match shared.peers.on_data(peer, sequence) {
            DataOutcome::Fresh => {
                shared
                    .deliveries
                    .push(ReceivedFrame::new(peer, sequence, datagram));
                let mut stats = shared.stats.write();
                stats.delivered += 1;
                stats.acks_sent += 1;
                Some(Outbox::new(peer, ack_frame(sequence), PacketKind::Ack))
            }
            DataOutcome::Duplicate => {
                // 앞선 ACK가 손실되었을 수 있으므로 다시 확인
                trace!("중복 데이터: peer={}, seq={}", peer, sequence);
                let mut stats = shared.stats.write();
                stats.duplicate_data += 1;
                stats.acks_sent += 1;
                Some(Outbox::new(peer, ack_frame(sequence), PacketKind::Ack))
            }
            DataOutcome::NotEstablished => {
                debug!("핸드쉐이크 전 데이터 버림: peer={}, seq={}", peer, sequence);
                shared.stats.write().dropped_unestablished += 1;
                None
            }
        },
    }
}

/// 수신 루프
pub(crate) struct ReceiveLoop {
    shared: Arc<Shared>,
    link: Arc<Link>,
}

impl ReceiveLoop {
    pub(crate) fn new(shared: Arc<Shared>, link: Arc<Link>) -> Self {
        Self { shared, link }
    }

    /// 종료 신호가 올 때까지 실행
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut buf = vec![0u8; self.shared.config.recv_buffer_size];

        while !*shutdown.borrow() {
            tokio::select! {
                _ = shutdown.changed() => break,
                result = self.link.recv_from(&mut buf) => match result {
                    Ok((len, peer)) => {
                        let datagram = Bytes::copy_from_slice(&buf[..len]);
                        if let Some(reply) = process_datagram(&self.shared, peer, datagram) {
                            self.link.transmit(&reply).await;
                        }
                    }
                    Err(e) => {
                        // ICMP port unreachable 등, 루프는 계속
                        warn!("수신 에러: {}", e);
                        self.shared.stats.write().recv_errors += 1;
                    }
                },
            }
        }

        info!("수신 루프 종료");
    }
}
