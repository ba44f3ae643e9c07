//! 전송 통계

use std::time::{Duration, Instant};

/// 엔드포인트 전송 통계
#[derive(Debug, Clone)]
pub struct TransportStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 송신한 핸드쉐이크 패킷 수 (재전송 포함)
    pub handshake_sent: u64,

    /// 처음 송신한 데이터 패킷 수
    pub data_sent: u64,

    /// 재전송한 데이터 패킷 수
    pub retransmitted: u64,

    /// 송신한 ACK 수
    pub acks_sent: u64,

    /// 처음 받은 ACK 수
    pub acks_received: u64,

    /// 중복 ACK 수
    pub duplicate_acks: u64,

    /// 전달 큐에 넣은 데이터 수
    pub delivered: u64,

    /// 중복 데이터 수
    pub duplicate_data: u64,

    /// 핸드쉐이크 완료 전이라 버린 패킷 수
    pub dropped_unestablished: u64,

    /// 잘못된 패킷 수
    pub malformed: u64,

    /// 송신 IO 에러 수
    pub send_errors: u64,

    /// 수신 IO 에러 수
    pub recv_errors: u64,

    /// 장애 주입으로 버린 패킷 수
    pub simulated_drops: u64,

    /// 재전송 버퍼에서 정리된 레코드 수
    pub settled: u64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            handshake_sent: 0,
            data_sent: 0,
            retransmitted: 0,
            acks_sent: 0,
            acks_received: 0,
            duplicate_acks: 0,
            delivered: 0,
            duplicate_data: 0,
            dropped_unestablished: 0,
            malformed: 0,
            send_errors: 0,
            recv_errors: 0,
            simulated_drops: 0,
            settled: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 재전송 비율 (재전송 / 최초 송신)
    pub fn retransmit_ratio(&self) -> f64 {
        if self.data_sent == 0 {
            return 0.0;
        }
        self.retransmitted as f64 / self.data_sent as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Sent: {} (+{} retx, {:.1}%) | Acks: {} sent / {} recv ({} dup) | Delivered: {} ({} dup) | Dropped: {} unestablished, {} malformed, {} simulated | IO errors: {}/{}",
            self.elapsed().as_secs_f64(),
            self.data_sent,
            self.retransmitted,
            self.retransmit_ratio() * 100.0,
            self.acks_sent,
            self.acks_received,
            self.duplicate_acks,
            self.delivered,
            self.duplicate_data,
            self.dropped_unestablished,
            self.malformed,
            self.simulated_drops,
            self.send_errors,
            self.recv_errors,
        )
    }
}

impl Default for TransportStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmit_ratio() {
        let mut stats = TransportStats::new();
        assert_eq!(stats.retransmit_ratio(), 0.0);

        stats.data_sent = 4;
        stats.retransmitted = 1;
        assert!((stats.retransmit_ratio() - 0.25).abs() < f64::EPSILON);
        assert!(stats.summary().contains("+1 retx"));
    }
}
