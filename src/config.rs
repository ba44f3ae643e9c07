//! 전송 계층 설정

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::simulator::FaultConfig;
use crate::{Error, Result};

/// 기본 핸드쉐이크 재전송 간격 (밀리초)
pub const DEFAULT_HANDSHAKE_RETRY_MS: u64 = 300;

/// 기본 데이터 재전송 간격 (밀리초)
pub const DEFAULT_DATA_RETRY_MS: u64 = 500;

/// 기본 수신 버퍼 크기
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// 최소 수신 버퍼 크기 (IPv4 UDP 최대 페이로드)
///
/// 이보다 작으면 큰 데이터그램이 잘린 채 전달되고 ACK까지 나간다.
pub const MIN_RECV_BUFFER_SIZE: usize = 65507;

/// DRU 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 바인드 주소
    pub bind_addr: SocketAddr,

    /// 핸드쉐이크 미완료 피어에 대한 재전송 간격 (밀리초)
    pub handshake_retry_interval_ms: u64,

    /// ACK 미수신 데이터 재전송 간격 (밀리초)
    /// 백오프 없이 고정
    pub data_retry_interval_ms: u64,

    /// 수신 버퍼 크기
    pub recv_buffer_size: usize,

    /// 장애 주입 (테스트/데모용, 기본 비활성)
    pub faults: Option<FaultConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            handshake_retry_interval_ms: DEFAULT_HANDSHAKE_RETRY_MS,
            data_retry_interval_ms: DEFAULT_DATA_RETRY_MS,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            faults: None,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// LAN/루프백용 설정 (짧은 재전송 간격)
    pub fn lan(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            handshake_retry_interval_ms: 100,
            data_retry_interval_ms: 150,
            ..Self::default()
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            handshake_retry_interval_ms: 500,
            data_retry_interval_ms: 800,
            ..Self::default()
        }
    }

    /// 장애 주입 설정
    pub fn with_faults(mut self, faults: FaultConfig) -> Self {
        self.faults = Some(faults);
        self
    }

    pub fn handshake_retry_interval(&self) -> Duration {
        Duration::from_millis(self.handshake_retry_interval_ms)
    }

    pub fn data_retry_interval(&self) -> Duration {
        Duration::from_millis(self.data_retry_interval_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.handshake_retry_interval_ms == 0 {
            return Err(Error::InvalidConfig {
                reason: "handshake_retry_interval_ms must be > 0".into(),
            });
        }
        if self.data_retry_interval_ms == 0 {
            return Err(Error::InvalidConfig {
                reason: "data_retry_interval_ms must be > 0".into(),
            });
        }
        if self.recv_buffer_size < MIN_RECV_BUFFER_SIZE {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "recv_buffer_size {} is smaller than the largest UDP datagram ({} bytes)",
                    self.recv_buffer_size, MIN_RECV_BUFFER_SIZE
                ),
            });
        }
        if let Some(faults) = &self.faults {
            faults.validate()?;
        }
        Ok(())
    }
}
