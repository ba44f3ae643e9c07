//! 엔드포인트 (공개 API)
//!
//! 소켓 하나와 두 개의 루프 태스크를 소유한다.
//!
//! ```text
//! 호출자 --send--> [제출 큐] --> 송신 루프 --> UDP
//!                                   ^ ACK 대조
//! 호출자 <--drain-- [전달 큐] <-- 수신 루프 <-- UDP
//!                          (세션 테이블 갱신)
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::delivery::{DeliveryQueue, ReceivedFrame};
use crate::handshake::HandshakeStatus;
use crate::packet::Sequence;
use crate::receiver::ReceiveLoop;
use crate::sender::{SendLoop, SubmissionQueue};
use crate::session::PeerTable;
use crate::socket::Link;
use crate::stats::TransportStats;
use crate::{Config, Error, Result};

/// 루프와 호출자가 공유하는 상태
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) peers: PeerTable,
    pub(crate) submissions: SubmissionQueue,
    pub(crate) deliveries: DeliveryQueue,
    pub(crate) stats: Arc<RwLock<TransportStats>>,
}

impl Shared {
    pub(crate) fn new(config: Config, stats: Arc<RwLock<TransportStats>>) -> Self {
        Self {
            config,
            peers: PeerTable::new(),
            submissions: SubmissionQueue::new(),
            deliveries: DeliveryQueue::new(),
            stats,
        }
    }
}

struct Tasks {
    send: JoinHandle<()>,
    receive: JoinHandle<()>,
}

impl Tasks {
    /// 두 태스크를 모두 기다린 뒤 첫 실패를 보고
    async fn join(self) -> Result<()> {
        let sent = self.send.await.map_err(|e| Error::TaskFailed {
            task: "send",
            reason: e.to_string(),
        });
        let received = self.receive.await.map_err(|e| Error::TaskFailed {
            task: "receive",
            reason: e.to_string(),
        });
        sent.and(received)
    }
}

/// DRU 엔드포인트
///
/// 같은 엔드포인트가 주동측과 수동측을 동시에 할 수 있다.
pub struct Endpoint {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Option<Tasks>>,
    closing: AtomicBool,
}

impl Endpoint {
    /// 소켓을 바인딩하고 송신/수신 루프 시작
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(RwLock::new(TransportStats::new()));
        let link = Arc::new(Link::bind(&config, stats.clone()).await?);
        let local_addr = link.local_addr()?;

        info!(
            "DRU endpoint started on {} (handshake retry {:?}, data retry {:?})",
            local_addr,
            config.handshake_retry_interval(),
            config.data_retry_interval()
        );

        let shared = Arc::new(Shared::new(config, stats));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let send = tokio::spawn(SendLoop::new(shared.clone(), link.clone()).run(shutdown_rx.clone()));
        let receive = tokio::spawn(ReceiveLoop::new(shared.clone(), link).run(shutdown_rx));

        Ok(Self {
            shared,
            local_addr,
            shutdown_tx,
            tasks: Mutex::new(Some(Tasks { send, receive })),
            closing: AtomicBool::new(false),
        })
    }

    /// 기본 설정으로 바인딩
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Self::open(Config::new(addr)).await
    }

    /// 주동측 핸드쉐이크 시작
    ///
    /// 이미 세션이 있으면 아무것도 하지 않고 `false`.
    /// 실제 전송은 송신 루프가 한다.
    pub fn initiate_handshake(&self, peer: SocketAddr) -> Result<bool> {
        self.ensure_open()?;

        if !self.shared.peers.initiate(peer) {
            debug!("이미 세션 있음: peer={}", peer);
            return Ok(false);
        }

        info!("핸드쉐이크 시작: peer={}", peer);
        self.shared.submissions.submit_handshake(peer);
        Ok(true)
    }

    /// 데이터 전송 요청
    ///
    /// 큐에 넣고 할당된 시퀀스를 바로 돌려준다. 핸드쉐이크가 끝나기 전에
    /// 보낸 데이터는 상대가 버리지만 재전송 버퍼에 남아 완료 후 전달된다.
    pub fn send(&self, peer: SocketAddr, payload: impl Into<Bytes>) -> Result<Sequence> {
        self.ensure_open()?;
        let payload: Bytes = payload.into();
        Ok(self.shared.submissions.submit(peer, &payload))
    }

    /// 수신 프레임을 모두 꺼냄
    pub fn drain_received<E>(&self, into: &mut E) -> Result<usize>
    where
        E: Extend<ReceivedFrame>,
    {
        self.ensure_open()?;
        Ok(self.shared.deliveries.drain_into(into))
    }

    /// 피어별 핸드쉐이크 상태 스냅샷
    pub fn drain_peer_status<E>(&self, into: &mut E) -> Result<usize>
    where
        E: Extend<(SocketAddr, HandshakeStatus)>,
    {
        self.ensure_open()?;
        let snapshot = self.shared.peers.status_snapshot();
        let count = snapshot.len();
        into.extend(snapshot);
        Ok(count)
    }

    /// 피어 하나의 상태
    pub fn peer_status(&self, peer: SocketAddr) -> Option<HandshakeStatus> {
        self.shared.peers.status(&peer)
    }

    /// 통계 복사본
    pub fn stats(&self) -> TransportStats {
        self.shared.stats.read().clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// 협조적 종료
    ///
    /// 두 루프에 신호를 보내고 끝날 때까지 기다린다. 반환 후에는 소켓이 닫혀 있다.
    pub async fn close(&self) -> Result<()> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Err(Error::ShutdownInProgress);
        }

        // 수신자가 모두 끝났으면 실패하지만 그 경우도 종료된 것
        let _ = self.shutdown_tx.send(true);

        let tasks = self.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.join().await?;
        }

        info!("DRU endpoint closed: {}", self.shared.stats.read().summary());
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::ShutdownInProgress)
        } else {
            Ok(())
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("local_addr", &self.local_addr)
            .field("peers", &self.shared.peers.len())
            .field("closing", &self.is_closed())
            .finish()
    }
}
