//! 4단계 핸드쉐이크 상태 머신
//!
//! ```text
//!        주동측 (initiator)                     수동측 (responder)
//!   connect   -> SentHello        --hs1-->
//!                                              ReceivedHello          (hs2 전송)
//!             <- ReceivedHelloAck <--hs2--
//!                (hs3 전송)       --hs3-->
//!                                              EstablishedAsResponder (hs4 전송)
//!             <- EstablishedAsInitiator <--hs4--
//! ```
//!
//! 네 패킷 모두 같은 1바이트 핸드쉐이크 패킷이다. 단계는 피어별 상태로만 구분된다.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// 피어별 핸드쉐이크 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HandshakeStatus {
    /// 주동측이 1단계를 보냄
    SentHello,

    /// 수동측이 1단계를 받고 2단계를 보냄
    ReceivedHello,

    /// 주동측이 2단계를 받고 3단계를 보냄
    ReceivedHelloAck,

    /// 수동측이 3단계를 받고 4단계를 보냄 (종료 상태)
    EstablishedAsResponder,

    /// 주동측이 4단계를 받음 (종료 상태)
    EstablishedAsInitiator,
}

impl HandshakeStatus {
    /// 연결 성립 여부 (데이터/ACK 처리 가능)
    pub fn is_established(self) -> bool {
        matches!(
            self,
            HandshakeStatus::EstablishedAsResponder | HandshakeStatus::EstablishedAsInitiator
        )
    }

    /// 주기적 재전송 대상 여부
    pub fn needs_retry(self) -> bool {
        !self.is_established()
    }
}

impl fmt::Display for HandshakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// 핸드쉐이크 패킷 수신 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// 다음 상태
    pub next: HandshakeStatus,

    /// 핸드쉐이크 패킷 회신 여부
    pub respond: bool,
}

/// 핸드쉐이크 패킷 수신 시 전이
pub fn on_handshake_packet(peer: SocketAddr, current: Option<HandshakeStatus>) -> Step {
    use HandshakeStatus::*;

    match current {
        None => {
            debug!("수동측: hs1 수신, hs2 전송: peer={}", peer);
            Step { next: ReceivedHello, respond: true }
        }
        Some(SentHello) => {
            debug!("주동측: hs2 수신, hs3 전송: peer={}", peer);
            Step { next: ReceivedHelloAck, respond: true }
        }
        Some(ReceivedHello) => {
            debug!("수동측: hs3 수신, hs4 전송, 연결 성립: peer={}", peer);
            Step { next: EstablishedAsResponder, respond: true }
        }
        Some(ReceivedHelloAck) => {
            debug!("주동측: hs4 수신, 연결 성립: peer={}", peer);
            Step { next: EstablishedAsInitiator, respond: false }
        }
        Some(EstablishedAsResponder) => {
            // 상대가 hs4를 못 받아 hs3를 다시 보낸 경우
            debug!("수동측: 성립 후 핸드쉐이크 수신, hs4 재전송: peer={}", peer);
            Step { next: EstablishedAsResponder, respond: true }
        }
        Some(EstablishedAsInitiator) => {
            debug!("주동측: 성립 후 핸드쉐이크 수신, 무시: peer={}", peer);
            Step { next: EstablishedAsInitiator, respond: false }
        }
    }
}

/// 주기적 재전송이 필요한 피어 목록
///
/// 피어별 타이머 대신 전체 스냅샷을 한 번에 훑는다.
pub fn retry_targets<I>(snapshot: I) -> Vec<SocketAddr>
where
    I: IntoIterator<Item = (SocketAddr, HandshakeStatus)>,
{
    snapshot
        .into_iter()
        .filter(|(peer, status)| {
            let retry = status.needs_retry();
            if retry {
                trace!("핸드쉐이크 재전송: peer={}, status={}", peer, status);
            }
            retry
        })
        .map(|(peer, _)| peer)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use HandshakeStatus::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn test_transition_table() {
        let cases = [
            (None, ReceivedHello, true),
            (Some(SentHello), ReceivedHelloAck, true),
            (Some(ReceivedHello), EstablishedAsResponder, true),
            (Some(ReceivedHelloAck), EstablishedAsInitiator, false),
            (Some(EstablishedAsResponder), EstablishedAsResponder, true),
            (Some(EstablishedAsInitiator), EstablishedAsInitiator, false),
        ];

        for (current, next, respond) in cases {
            let step = on_handshake_packet(addr(), current);
            assert_eq!(step, Step { next, respond }, "from {:?}", current);
        }
    }

    #[test]
    fn test_terminal_states_are_stable() {
        for status in [EstablishedAsResponder, EstablishedAsInitiator] {
            for _ in 0..3 {
                assert_eq!(on_handshake_packet(addr(), Some(status)).next, status);
            }
        }
    }

    #[test]
    fn test_retry_targets_skip_established() {
        let a: SocketAddr = "10.0.0.1:1".parse().unwrap();
        let b: SocketAddr = "10.0.0.2:1".parse().unwrap();
        let c: SocketAddr = "10.0.0.3:1".parse().unwrap();
        let d: SocketAddr = "10.0.0.4:1".parse().unwrap();

        let mut targets = retry_targets(vec![
            (a, SentHello),
            (b, EstablishedAsInitiator),
            (c, ReceivedHelloAck),
            (d, EstablishedAsResponder),
        ]);
        targets.sort();

        assert_eq!(targets, vec![a, c]);
    }
}
