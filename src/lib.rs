//! # DRU (Dual Reliable UDP)
//!
//! UDP 위에서 동작하는 핸드쉐이크 + ACK 재전송 방식 신뢰성 데이터그램 전송
//!
//! ## 핵심 특징
//! - **4단계 핸드쉐이크**: 데이터 교환 전에 양쪽이 서로를 확인
//! - **ACK 기반 재전송**: 확인되지 않은 패킷은 고정 간격으로 재전송
//! - **중복 제거**: 같은 시퀀스는 한 번만 전달 (순서 보장 없음)
//! - **양방향**: 한 엔드포인트가 주동측과 수동측을 동시에 수행
//! - **협조적 종료**: 종료 신호 후 두 루프가 끝날 때까지 대기
//!
//! ```no_run
//! # async fn demo() -> dru::Result<()> {
//! let endpoint = dru::Endpoint::bind("127.0.0.1:0".parse().unwrap()).await?;
//! let peer = "127.0.0.1:9000".parse().unwrap();
//!
//! endpoint.initiate_handshake(peer)?;
//! endpoint.send(peer, "hello")?;
//!
//! let mut frames = Vec::new();
//! endpoint.drain_received(&mut frames)?;
//! endpoint.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod endpoint;
pub mod error;
pub mod handshake;
pub mod packet;
mod receiver;
pub mod sender;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod stats;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use delivery::ReceivedFrame;
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use handshake::HandshakeStatus;
pub use packet::{Packet, Sequence};
pub use simulator::FaultConfig;
pub use stats::TransportStats;
