//! DRU 노드 - Dual Reliable UDP 데모
//!
//! 한 프로세스가 수동측(서버)과 주동측(클라이언트)을 모두 할 수 있다.
//!
//! 사용법:
//!   cargo run --release --bin dru-node -- [OPTIONS]
//!
//! 예시:
//!   # 에코 서버
//!   cargo run --release --bin dru-node -- --bind 127.0.0.1:9000 --echo
//!
//!   # 클라이언트: 메시지 5번 전송
//!   cargo run --release --bin dru-node -- --connect 127.0.0.1:9000 --message hello --count 5

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dru::{Config, Endpoint, FaultConfig, HandshakeStatus};

/// 에코 응답 본문
const ECHO_REPLY: &str = "Message Received";

/// 노드 설정
struct NodeConfig {
    bind_addr: SocketAddr,
    connect: Option<SocketAddr>,
    message: String,
    count: usize,
    echo: bool,
    loss: Option<f64>,
    lan: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".parse().unwrap(),
            connect: None,
            message: "hello".to_string(),
            count: 1,
            echo: false,
            loss: None,
            lan: false,
        }
    }
}

fn parse_args() -> NodeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = NodeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--connect" | "-c" => {
                if i + 1 < args.len() {
                    config.connect = Some(args[i + 1].parse().expect("유효한 주소 필요"));
                    i += 1;
                }
            }
            "--message" | "-m" => {
                if i + 1 < args.len() {
                    config.message = args[i + 1].clone();
                    i += 1;
                }
            }
            "--count" | "-n" => {
                if i + 1 < args.len() {
                    config.count = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--loss" => {
                if i + 1 < args.len() {
                    config.loss = Some(args[i + 1].parse().expect("0.0 ~ 1.0 사이 값 필요"));
                    i += 1;
                }
            }
            "--echo" | "-e" => {
                config.echo = true;
            }
            "--lan" => {
                config.lan = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"DRU Node - Dual Reliable UDP 데모

4단계 핸드쉐이크 + ACK 재전송 기반 신뢰성 UDP 노드
- 받은 메시지는 한 번씩만 출력 (순서 보장 없음)
- 피어 핸드쉐이크 상태 변화 출력

사용법:
  cargo run --release --bin dru-node -- [OPTIONS]

옵션:
  -b, --bind <ADDR>      로컬 바인드 주소 (기본: 0.0.0.0:0 = 자동 할당)
  -c, --connect <ADDR>   연결할 피어 주소 (주동측)
  -m, --message <TEXT>   보낼 메시지 (기본: hello)
  -n, --count <N>        메시지 전송 횟수 (기본: 1)
  -e, --echo             받은 메시지마다 "{}" 회신
  --loss <RATE>          데이터 패킷 손실 주입 (0.0 ~ 1.0)
  --lan                  LAN 프리셋 (짧은 재전송 간격)
  -h, --help             이 도움말 출력

로그 상세도는 RUST_LOG로 조정:
  RUST_LOG=dru::handshake=debug,info
"#,
                    ECHO_REPLY
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let node = parse_args();

    let mut config = if node.lan {
        Config::lan(node.bind_addr)
    } else {
        Config::new(node.bind_addr)
    };
    if let Some(rate) = node.loss {
        config = config.with_faults(FaultConfig::lossy(rate));
    }

    let endpoint = Endpoint::open(config).await?;
    info!("DRU Node listening on {}", endpoint.local_addr());

    if let Some(peer) = node.connect {
        endpoint.initiate_handshake(peer)?;
        // 핸드쉐이크 완료 전 전송분은 재전송으로 전달된다
        for _ in 0..node.count {
            let sequence = endpoint.send(peer, node.message.clone())?;
            info!("Queued seq={} -> {}", sequence, peer);
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    let mut known: HashMap<SocketAddr, HandshakeStatus> = HashMap::new();
    let mut frames = Vec::new();
    let mut statuses = Vec::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl-C, closing...");
                break;
            }
            _ = ticker.tick() => {
                endpoint.drain_received(&mut frames)?;
                for frame in frames.drain(..) {
                    let payload = frame.payload();
                    info!(
                        "[{}] seq={} {}",
                        frame.peer,
                        frame.sequence,
                        String::from_utf8_lossy(&payload)
                    );

                    if node.echo {
                        if let Err(e) = endpoint.send(frame.peer, ECHO_REPLY) {
                            warn!("에코 실패: {}", e);
                        }
                    }
                }

                endpoint.drain_peer_status(&mut statuses)?;
                for (peer, status) in statuses.drain(..) {
                    if known.insert(peer, status) != Some(status) {
                        info!("Peer {} -> {}", peer, status);
                    }
                }
            }
        }
    }

    endpoint.close().await?;
    info!("{}", endpoint.stats().summary());

    Ok(())
}
