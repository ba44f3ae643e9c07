//! 와이어 포맷 정의
//!
//! ```text
//! [0]     컨트롤 바이트: bit0 = 핸드쉐이크, bit1 = ACK
//! [1..9]  시퀀스 번호 (u64, big-endian) - 핸드쉐이크 패킷에는 없음
//! [9..]   페이로드 - 데이터 패킷만
//! ```
//!
//! 핸드쉐이크 패킷은 컨트롤 바이트 1개뿐이고, ACK 패킷은 9바이트 헤더만 가진다.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// 시퀀스 번호 (송신측이 할당)
pub type Sequence = u64;

/// 핸드쉐이크 플래그 (bit 0)
pub const FLAG_HANDSHAKE: u8 = 0b0000_0001;

/// ACK 플래그 (bit 1)
pub const FLAG_ACK: u8 = 0b0000_0010;

/// 핸드쉐이크 패킷 길이
pub const HANDSHAKE_LEN: usize = 1;

/// 데이터/ACK 헤더 길이 (컨트롤 1 + 시퀀스 8)
pub const HEADER_LEN: usize = 9;

/// 패킷 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Handshake,
    Ack,
    Data,
}

/// 디코딩된 패킷
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// 핸드쉐이크 (시퀀스, 본문 없음)
    Handshake,

    /// 상대가 보낸 시퀀스에 대한 확인
    Ack { sequence: Sequence },

    /// 애플리케이션 데이터
    Data { sequence: Sequence, payload: Bytes },
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Handshake => PacketKind::Handshake,
            Packet::Ack { .. } => PacketKind::Ack,
            Packet::Data { .. } => PacketKind::Data,
        }
    }

    /// 바이트로 직렬화
    pub fn encode(&self) -> Bytes {
        match self {
            Packet::Handshake => handshake_frame(),
            Packet::Ack { sequence } => ack_frame(*sequence),
            Packet::Data { sequence, payload } => data_frame(*sequence, payload),
        }
    }

    /// 데이터그램에서 역직렬화
    ///
    /// 길이를 먼저 검사하므로 짧은 입력은 `Error::MalformedPacket`이 된다.
    /// 데이터 페이로드는 원본 버퍼를 복사 없이 슬라이스한다.
    pub fn decode(datagram: &Bytes) -> Result<Self> {
        let Some(&control) = datagram.first() else {
            return Err(Error::MalformedPacket {
                len: 0,
                expected: HANDSHAKE_LEN,
            });
        };

        if control & FLAG_HANDSHAKE != 0 {
            return Ok(Packet::Handshake);
        }

        if datagram.len() < HEADER_LEN {
            return Err(Error::MalformedPacket {
                len: datagram.len(),
                expected: HEADER_LEN,
            });
        }

        let sequence = (&datagram[1..HEADER_LEN]).get_u64();

        if control & FLAG_ACK != 0 {
            Ok(Packet::Ack { sequence })
        } else {
            Ok(Packet::Data {
                sequence,
                payload: datagram.slice(HEADER_LEN..),
            })
        }
    }
}

/// 핸드쉐이크 패킷 (4단계 모두 같은 바이트)
pub fn handshake_frame() -> Bytes {
    Bytes::from_static(&[FLAG_HANDSHAKE])
}

/// ACK 패킷
pub fn ack_frame(sequence: Sequence) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    buf.put_u8(FLAG_ACK);
    buf.put_u64(sequence);
    buf.freeze()
}

/// 데이터 패킷 (헤더 + 페이로드)
pub fn data_frame(sequence: Sequence, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(0);
    buf.put_u64(sequence);
    buf.extend_from_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_is_single_byte() {
        let frame = Packet::Handshake.encode();
        assert_eq!(frame.as_ref(), &[0x01]);
        assert_eq!(Packet::decode(&frame).unwrap(), Packet::Handshake);
    }

    #[test]
    fn test_data_header_layout() {
        let frame = data_frame(0x0102_0304_0506_0708, b"hello");

        assert_eq!(frame.len(), HEADER_LEN + 5);
        assert_eq!(frame[0], 0x00);
        // big-endian
        assert_eq!(&frame[1..9], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&frame[9..], b"hello");

        match Packet::decode(&frame).unwrap() {
            Packet::Data { sequence, payload } => {
                assert_eq!(sequence, 0x0102_0304_0506_0708);
                assert_eq!(payload.as_ref(), b"hello");
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_ack_has_no_body() {
        let frame = ack_frame(5);
        assert_eq!(frame.as_ref(), &[0x02, 0, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(Packet::decode(&frame).unwrap(), Packet::Ack { sequence: 5 });
    }

    #[test]
    fn test_empty_data_payload() {
        let frame = data_frame(7, &[]);
        assert_eq!(frame.len(), HEADER_LEN);
        assert_eq!(
            Packet::decode(&frame).unwrap(),
            Packet::Data {
                sequence: 7,
                payload: Bytes::new()
            }
        );
    }

    #[test]
    fn test_handshake_bit_wins() {
        // 핸드쉐이크 비트가 있으면 나머지는 무시
        let frame = Bytes::from_static(&[FLAG_HANDSHAKE | FLAG_ACK, 9, 9]);
        assert_eq!(Packet::decode(&frame).unwrap(), Packet::Handshake);
    }

    #[test]
    fn test_malformed_packets() {
        let empty = Bytes::new();
        assert!(matches!(
            Packet::decode(&empty),
            Err(Error::MalformedPacket { len: 0, expected: 1 })
        ));

        let short_ack = Bytes::from_static(&[FLAG_ACK, 0, 0, 0]);
        assert!(matches!(
            Packet::decode(&short_ack),
            Err(Error::MalformedPacket { len: 4, expected: 9 })
        ));

        let short_data = Bytes::from_static(&[0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            Packet::decode(&short_data),
            Err(Error::MalformedPacket { len: 8, expected: 9 })
        ));
    }
}
