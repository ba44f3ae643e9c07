//! 수신 데이터 전달 큐
//!
//! 수신 루프가 넣고 애플리케이션이 자기 주기로 한 번에 꺼내 간다.

use std::collections::VecDeque;
use std::net::SocketAddr;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::packet::{Sequence, HEADER_LEN};

/// 수신된 데이터 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// 송신 피어
    pub peer: SocketAddr,

    /// 상대가 할당한 시퀀스
    pub sequence: Sequence,

    /// 헤더를 포함한 원본 데이터그램
    pub datagram: Bytes,
}

impl ReceivedFrame {
    pub fn new(peer: SocketAddr, sequence: Sequence, datagram: Bytes) -> Self {
        Self {
            peer,
            sequence,
            datagram,
        }
    }

    /// 헤더를 제외한 본문
    pub fn payload(&self) -> Bytes {
        self.datagram.slice(HEADER_LEN.min(self.datagram.len())..)
    }
}

/// 스레드 안전 전달 큐
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    frames: Mutex<VecDeque<ReceivedFrame>>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, frame: ReceivedFrame) {
        self.frames.lock().push_back(frame);
    }

    /// 쌓인 프레임을 모두 `into`로 옮긴다
    ///
    /// 한 번의 락 안에서 처리하고 바로 돌아온다. 새 데이터를 기다리지 않는다.
    pub fn drain_into<E>(&self, into: &mut E) -> usize
    where
        E: Extend<ReceivedFrame>,
    {
        let mut frames = self.frames.lock();
        let count = frames.len();
        into.extend(frames.drain(..));
        count
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::data_frame;

    fn frame(sequence: Sequence, body: &[u8]) -> ReceivedFrame {
        let peer = SocketAddr::from(([127, 0, 0, 1], 7000));
        ReceivedFrame::new(peer, sequence, data_frame(sequence, body))
    }

    #[test]
    fn test_payload_strips_header() {
        assert_eq!(frame(3, b"abc").payload().as_ref(), b"abc");
        assert!(frame(3, b"").payload().is_empty());
    }

    #[test]
    fn test_drain_moves_everything() {
        let queue = DeliveryQueue::new();
        queue.push(frame(1, b"a"));
        queue.push(frame(2, b"b"));

        let mut out = Vec::new();
        assert_eq!(queue.drain_into(&mut out), 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].sequence, 1);
        assert!(queue.is_empty());

        // 비어 있으면 바로 0
        assert_eq!(queue.drain_into(&mut out), 0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = std::sync::Arc::new(DeliveryQueue::new());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        queue.push(frame(t * 1000 + i, b"x"));
                    }
                })
            })
            .collect();

        let mut out = Vec::new();
        for handle in handles {
            handle.join().unwrap();
        }
        queue.drain_into(&mut out);
        assert_eq!(out.len(), 400);
    }
}
