//! 에러 타입 정의

use thiserror::Error;

/// DRU 전송 계층 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 헤더보다 짧은 데이터그램
    #[error("잘못된 패킷: {len} bytes, 최소 {expected} bytes 필요")]
    MalformedPacket { len: usize, expected: usize },

    #[error("종료 진행 중")]
    ShutdownInProgress,

    #[error("유효하지 않은 설정: {reason}")]
    InvalidConfig { reason: String },

    #[error("{task} 태스크 비정상 종료: {reason}")]
    TaskFailed { task: &'static str, reason: String },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
