//! 장애 주입 (손실/중복)
//!
//! 실제 네트워크 없이도 재전송과 중복 제거를 시험할 수 있도록
//! 송신 직전에 패킷을 버리거나 두 번 보낸다.
//! 핸드쉐이크 패킷은 기본적으로 건드리지 않는다.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::packet::PacketKind;
use crate::{Error, Result};

/// 장애 주입 설정
///
/// 확률은 모두 `[0.0, 1.0]` 범위
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// 패킷 손실 확률
    pub loss_rate: f64,

    /// 패킷 중복 확률
    pub duplicate_rate: f64,

    /// 난수 시드 (None이면 엔트로피 사용)
    pub seed: Option<u64>,

    /// 핸드쉐이크 패킷에도 적용할지 여부
    pub include_handshake: bool,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            seed: None,
            include_handshake: false,
        }
    }
}

impl FaultConfig {
    /// 손실만 주입
    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            loss_rate,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [("loss_rate", self.loss_rate), ("duplicate_rate", self.duplicate_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::InvalidConfig {
                    reason: format!("{} {} out of [0, 1]", name, rate),
                });
            }
        }
        Ok(())
    }
}

/// 패킷 처리 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Deliver,
    Drop,
    Duplicate,
}

/// 장애 주입기
#[derive(Debug)]
pub struct FaultInjector {
    config: FaultConfig,
    rng: StdRng,
}

impl FaultInjector {
    pub fn new(config: FaultConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// 송신할 패킷의 운명 결정
    pub fn fate(&mut self, kind: PacketKind) -> Fate {
        if kind == PacketKind::Handshake && !self.config.include_handshake {
            return Fate::Deliver;
        }

        if self.config.loss_rate > 0.0 && self.rng.gen_bool(self.config.loss_rate) {
            Fate::Drop
        } else if self.config.duplicate_rate > 0.0 && self.rng.gen_bool(self.config.duplicate_rate) {
            Fate::Duplicate
        } else {
            Fate::Deliver
        }
    }
}
