//! 피어 세션 테이블
//!
//! 원격 주소마다 핸드쉐이크 상태, 상대가 확인한 시퀀스, 상대에게서 받은 시퀀스를
//! 하나의 `PeerSession`으로 묶고 테이블 전체를 하나의 락으로 보호한다.
//! 송신 루프는 재전송 대기 목록만 락 안에서 대조하고, 결과는 락 밖에서 쓴다.
//! 결과가 조금 늦어도 재전송이 몇 번 더 일어날 뿐이다.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::handshake::{self, HandshakeStatus};
use crate::packet::Sequence;

/// 피어 하나의 세션 상태
#[derive(Debug, Clone)]
pub struct PeerSession {
    status: HandshakeStatus,

    /// 상대가 ACK로 확인한 로컬 시퀀스
    acked_by_peer: HashSet<Sequence>,

    /// 이미 전달한 상대 시퀀스 (중복 제거용)
    seen_from_peer: HashSet<Sequence>,
}

impl PeerSession {
    pub fn new(status: HandshakeStatus) -> Self {
        Self {
            status,
            acked_by_peer: HashSet::new(),
            seen_from_peer: HashSet::new(),
        }
    }

    pub fn status(&self) -> HandshakeStatus {
        self.status
    }

    pub fn is_acked(&self, sequence: Sequence) -> bool {
        self.acked_by_peer.contains(&sequence)
    }

    pub fn has_seen(&self, sequence: Sequence) -> bool {
        self.seen_from_peer.contains(&sequence)
    }
}

/// ACK 수신 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// 핸드쉐이크 미완료 (또는 세션 없음) - 버림
    NotEstablished,

    /// 처음 받은 ACK
    Settled,

    /// 이미 받은 ACK
    Duplicate,
}

/// 데이터 수신 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// 핸드쉐이크 미완료 (또는 세션 없음) - 버림, ACK 없음
    NotEstablished,

    /// 처음 받은 시퀀스 - 전달 + ACK
    Fresh,

    /// 이미 받은 시퀀스 - ACK만 다시
    Duplicate,
}

/// 원격 주소별 세션 테이블
#[derive(Debug, Default)]
pub struct PeerTable {
    sessions: Mutex<HashMap<SocketAddr, PeerSession>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 주동측 연결 시작
    ///
    /// 세션이 없을 때만 `SentHello`로 만들고 `true`를 돌려준다.
    pub fn initiate(&self, peer: SocketAddr) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&peer) {
            return false;
        }
        sessions.insert(peer, PeerSession::new(HandshakeStatus::SentHello));
        true
    }

    /// 핸드쉐이크 패킷 수신
    ///
    /// 반환값은 핸드쉐이크 패킷 회신 여부.
    pub fn on_handshake(&self, peer: SocketAddr) -> bool {
        let mut sessions = self.sessions.lock();
        let current = sessions.get(&peer).map(PeerSession::status);
        let step = handshake::on_handshake_packet(peer, current);

        sessions
            .entry(peer)
            .and_modify(|session| session.status = step.next)
            .or_insert_with(|| PeerSession::new(step.next));

        step.respond
    }

    /// ACK 수신
    pub fn on_ack(&self, peer: SocketAddr, sequence: Sequence) -> AckOutcome {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&peer) {
            Some(session) if session.status.is_established() => {
                if session.acked_by_peer.insert(sequence) {
                    AckOutcome::Settled
                } else {
                    AckOutcome::Duplicate
                }
            }
            _ => AckOutcome::NotEstablished,
        }
    }

    /// 데이터 수신
    pub fn on_data(&self, peer: SocketAddr, sequence: Sequence) -> DataOutcome {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&peer) {
            Some(session) if session.status.is_established() => {
                if session.seen_from_peer.insert(sequence) {
                    DataOutcome::Fresh
                } else {
                    DataOutcome::Duplicate
                }
            }
            _ => DataOutcome::NotEstablished,
        }
    }

    /// 피어 상태 조회
    pub fn status(&self, peer: &SocketAddr) -> Option<HandshakeStatus> {
        self.sessions.lock().get(peer).map(PeerSession::status)
    }

    /// 세션 복사본 조회
    pub fn session(&self, peer: &SocketAddr) -> Option<PeerSession> {
        self.sessions.lock().get(peer).cloned()
    }

    /// 전체 핸드쉐이크 상태 스냅샷
    pub fn status_snapshot(&self) -> Vec<(SocketAddr, HandshakeStatus)> {
        self.sessions
            .lock()
            .iter()
            .map(|(peer, session)| (*peer, session.status))
            .collect()
    }

    /// 재전송 대기 중인 (피어, 시퀀스) 가운데 이미 확인된 것
    ///
    /// 확인 집합 전체를 복사하지 않고 대기 목록만 검사한다.
    pub fn acked_among<I>(&self, pending: I) -> HashSet<(SocketAddr, Sequence)>
    where
        I: IntoIterator<Item = (SocketAddr, Sequence)>,
    {
        let sessions = self.sessions.lock();
        pending
            .into_iter()
            .filter(|(peer, sequence)| {
                sessions
                    .get(peer)
                    .is_some_and(|session| session.acked_by_peer.contains(sequence))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
