//! 송신 파이프라인
//!
//! - 제출 큐: 호출자가 넣고 송신 루프가 한 번에 꺼낸다
//! - 시퀀스 할당: 모든 피어가 공유하는 단조 증가 u64 카운터
//! - 재전송 버퍼: 송신 루프만 접근 (락 없음)
//! - 고정 간격 재전송, 백오프 없음

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::endpoint::Shared;
use crate::handshake;
use crate::packet::{data_frame, handshake_frame, PacketKind, Sequence};
use crate::socket::{Link, Outbox};

/// 재전송 버퍼 레코드
#[derive(Debug, Clone)]
pub struct OutboundRecord {
    pub peer: SocketAddr,
    pub sequence: Sequence,

    /// 헤더 포함 패킷
    pub frame: Bytes,

    /// 제출 시간
    pub enqueued_at: Instant,
}

/// 제출 큐 항목
#[derive(Debug, Clone)]
pub(crate) enum Submission {
    /// 핸드쉐이크 1단계 (재전송 버퍼에 넣지 않음)
    Handshake(SocketAddr),

    Data(OutboundRecord),
}

/// 호출자 -> 송신 루프 제출 큐
#[derive(Debug, Default)]
pub struct SubmissionQueue {
    pending: Mutex<VecDeque<Submission>>,
    next_sequence: AtomicU64,
    notify: Notify,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터 제출
    ///
    /// 시퀀스를 할당하고 바로 돌아온다. 핸드쉐이크 완료 여부는 보지 않는다.
    pub fn submit(&self, peer: SocketAddr, payload: &[u8]) -> Sequence {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let record = OutboundRecord {
            peer,
            sequence,
            frame: data_frame(sequence, payload),
            enqueued_at: Instant::now(),
        };

        trace!("데이터 제출: peer={}, seq={}", peer, sequence);
        self.pending.lock().push_back(Submission::Data(record));
        self.notify.notify_one();
        sequence
    }

    /// 핸드쉐이크 1단계 제출
    pub(crate) fn submit_handshake(&self, peer: SocketAddr) {
        self.pending.lock().push_back(Submission::Handshake(peer));
        self.notify.notify_one();
    }

    pub(crate) fn take_all(&self) -> VecDeque<Submission> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// 새 제출 대기
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    /// 다음에 할당될 시퀀스
    pub fn peek_sequence(&self) -> Sequence {
        self.next_sequence.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// 재전송 검사 결과
#[derive(Debug, Default)]
pub struct Rescan {
    /// 다시 보낼 레코드
    pub resend: Vec<OutboundRecord>,

    /// ACK 확인되어 제거된 레코드 수
    pub settled: usize,
}

/// ACK 미수신 패킷 버퍼
#[derive(Debug, Default)]
pub struct RetransmitBuffer {
    records: VecDeque<OutboundRecord>,
}

impl RetransmitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: OutboundRecord) {
        self.records.push_back(record);
    }

    /// 대기 중인 (피어, 시퀀스) 목록
    pub fn pending(&self) -> impl Iterator<Item = (SocketAddr, Sequence)> + '_ {
        self.records.iter().map(|record| (record.peer, record.sequence))
    }

    /// 확인된 (피어, 시퀀스)로 버퍼 정리
    ///
    /// 확인된 레코드는 영구히 제거되고 나머지는 다시 보낼 대상이 된다.
    pub fn rescan(&mut self, acked: &HashSet<(SocketAddr, Sequence)>) -> Rescan {
        let before = self.records.len();
        self.records
            .retain(|record| !acked.contains(&(record.peer, record.sequence)));

        Rescan {
            settled: before - self.records.len(),
            resend: self.records.iter().cloned().collect(),
        }
    }

    pub fn contains(&self, peer: SocketAddr, sequence: Sequence) -> bool {
        self.records
            .iter()
            .any(|record| record.peer == peer && record.sequence == sequence)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 송신 파이프라인 상태 (IO 없음)
pub(crate) struct Outbound {
    shared: Arc<Shared>,
    retransmit: RetransmitBuffer,
}

impl Outbound {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            retransmit: RetransmitBuffer::new(),
        }
    }

    /// 제출 큐를 비우고 보낼 패킷 목록 생성
    pub(crate) fn collect_submissions(&mut self) -> Vec<Outbox> {
        let submissions = self.shared.submissions.take_all();
        if submissions.is_empty() {
            return Vec::new();
        }

        let mut outbox = Vec::with_capacity(submissions.len());
        let mut handshakes = 0;
        let mut data = 0;

        for submission in submissions {
            match submission {
                Submission::Handshake(peer) => {
                    debug!("주동측: hs1 전송: peer={}", peer);
                    outbox.push(Outbox::new(peer, handshake_frame(), PacketKind::Handshake));
                    handshakes += 1;
                }
                Submission::Data(record) => {
                    outbox.push(Outbox::new(record.peer, record.frame.clone(), PacketKind::Data));
                    self.retransmit.push(record);
                    data += 1;
                }
            }
        }

        let mut stats = self.shared.stats.write();
        stats.handshake_sent += handshakes;
        stats.data_sent += data;
        outbox
    }

    /// 핸드쉐이크 미완료 피어에 재전송
    pub(crate) fn collect_handshake_retries(&self) -> Vec<Outbox> {
        let targets = handshake::retry_targets(self.shared.peers.status_snapshot());
        if !targets.is_empty() {
            self.shared.stats.write().handshake_sent += targets.len() as u64;
        }

        targets
            .into_iter()
            .map(|peer| Outbox::new(peer, handshake_frame(), PacketKind::Handshake))
            .collect()
    }

    /// ACK 미수신 데이터 재전송
    pub(crate) fn collect_retransmits(&mut self) -> Vec<Outbox> {
        if self.retransmit.is_empty() {
            return Vec::new();
        }

        let acked = self.shared.peers.acked_among(self.retransmit.pending());
        let rescan = self.retransmit.rescan(&acked);

        {
            let mut stats = self.shared.stats.write();
            stats.settled += rescan.settled as u64;
            stats.retransmitted += rescan.resend.len() as u64;
        }

        if !rescan.resend.is_empty() {
            debug!(
                "재전송: {} 패킷, 정리: {} 패킷",
                rescan.resend.len(),
                rescan.settled
            );
        }

        rescan
            .resend
            .into_iter()
            .map(|record| {
                trace!(
                    "ACK 미수신 재전송: peer={}, seq={}, age={:?}",
                    record.peer,
                    record.sequence,
                    record.enqueued_at.elapsed()
                );
                Outbox::new(record.peer, record.frame, PacketKind::Data)
            })
            .collect()
    }

    pub(crate) fn retransmit_buffer(&self) -> &RetransmitBuffer {
        &self.retransmit
    }
}

/// 송신 루프
pub(crate) struct SendLoop {
    outbound: Outbound,
    link: Arc<Link>,
}

impl SendLoop {
    pub(crate) fn new(shared: Arc<Shared>, link: Arc<Link>) -> Self {
        Self {
            outbound: Outbound::new(shared),
            link,
        }
    }

    /// 종료 신호가 올 때까지 실행
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let shared = self.outbound.shared.clone();

        let mut handshake_tick = interval(shared.config.handshake_retry_interval());
        let mut retransmit_tick = interval(shared.config.data_retry_interval());
        handshake_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        retransmit_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // 첫 tick은 즉시 완료되므로 소비
        handshake_tick.tick().await;
        retransmit_tick.tick().await;

        while !*shutdown.borrow() {
            let outbox = tokio::select! {
                _ = shutdown.changed() => break,
                _ = shared.submissions.notified() => self.outbound.collect_submissions(),
                _ = handshake_tick.tick() => self.outbound.collect_handshake_retries(),
                _ = retransmit_tick.tick() => self.outbound.collect_retransmits(),
            };

            self.link.transmit_all(&outbox).await;
        }

        info!(
            "송신 루프 종료: 미확인 {} 패킷",
            self.outbound.retransmit_buffer().len()
        );
    }
}
