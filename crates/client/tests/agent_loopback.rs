use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use amicale_auth::{MemberIdentity, SessionDirectory};
use amicale_client::{AgentConfig, BackoffConfig, ClientError, ConnectionState, RealtimeAgent};
use amicale_config::RealtimeConfig;
use amicale_gateway::{create_router, GatewayState};
use amicale_realtime::RealtimeCore;

struct TestServer {
    addr: SocketAddr,
    sessions: SessionDirectory,
}

impl TestServer {
    async fn start() -> Self {
        let realtime = RealtimeConfig::default();
        let sessions = SessionDirectory::with_ttl(Duration::from_secs(60));
        let core = RealtimeCore::new(&realtime);
        let router = create_router(GatewayState::new(core, sessions.clone(), realtime));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        Self { addr, sessions }
    }

    async fn seed_member(&self, member_id: i64, first: &str, last: &str) -> String {
        self.sessions
            .issue(MemberIdentity {
                member_id,
                first_name: first.to_string(),
                last_name: last.to_string(),
                role: "member".to_string(),
            })
            .await
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }
}

async fn wait_for_state(
    rx: &mut tokio::sync::watch::Receiver<ConnectionState>,
    predicate: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed")
        .clone()
}

/// A port with nothing listening on it.
async fn dead_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}

#[tokio::test]
async fn agent_connects_and_observes_the_roster() {
    let server = TestServer::start().await;
    let token = server.seed_member(1, "Alice", "Martin").await;

    let agent = RealtimeAgent::connect(AgentConfig::new(server.url(), token)).expect("agent");

    let mut state = agent.connection_state();
    wait_for_state(&mut state, |s| *s == ConnectionState::Connected).await;

    let mut roster = agent.online_members();
    let roster = tokio::time::timeout(
        Duration::from_secs(5),
        roster.wait_for(|members| !members.is_empty()),
    )
    .await
    .expect("timed out waiting for roster")
    .expect("roster channel closed")
    .clone();

    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].member_id, 1);
    assert_eq!(roster[0].first_name, "Alice");

    agent.disconnect().await;
}

#[tokio::test]
async fn chat_round_trips_through_the_gateway() {
    let server = TestServer::start().await;
    let token = server.seed_member(2, "Bob", "Durand").await;

    let agent = RealtimeAgent::connect(AgentConfig::new(server.url(), token)).expect("agent");
    let mut messages = agent.messages();

    let mut state = agent.connection_state();
    wait_for_state(&mut state, |s| *s == ConnectionState::Connected).await;

    agent.send_chat("bonjour").await.expect("send");

    let message = tokio::time::timeout(Duration::from_secs(5), messages.recv())
        .await
        .expect("timed out waiting for echo")
        .expect("message channel closed");

    assert_eq!(message.body, "bonjour");
    assert_eq!(message.author_id, 2);
    assert_eq!(message.author_name, "Bob Durand");

    agent.disconnect().await;
}

#[tokio::test]
async fn missing_token_never_opens_a_socket() {
    let result = RealtimeAgent::connect(AgentConfig::new("ws://127.0.0.1:1", ""));
    assert!(matches!(result, Err(ClientError::MissingToken)));
}

#[tokio::test]
async fn unreachable_gateway_moves_the_agent_into_backoff() {
    let addr = dead_port().await;
    let mut config = AgentConfig::new(format!("ws://{addr}"), "some-token");
    config.backoff = BackoffConfig {
        initial: Duration::from_secs(30),
        max: Duration::from_secs(30),
        max_attempts: 3,
    };

    let agent = RealtimeAgent::connect(config).expect("agent");
    let mut state = agent.connection_state();
    let observed =
        wait_for_state(&mut state, |s| matches!(s, ConnectionState::Reconnecting { .. })).await;
    assert_eq!(observed, ConnectionState::Reconnecting { attempt: 1 });

    // sends are rejected locally while not connected
    let result = agent.send_chat("queued?").await;
    assert!(matches!(result, Err(ClientError::NotConnected)));

    // explicit disconnect interrupts the backoff wait
    agent.disconnect().await;
}

#[tokio::test]
async fn agent_gives_up_past_the_retry_ceiling() {
    let addr = dead_port().await;
    let mut config = AgentConfig::new(format!("ws://{addr}"), "some-token");
    config.backoff = BackoffConfig {
        initial: Duration::from_millis(10),
        max: Duration::from_millis(20),
        max_attempts: 2,
    };

    let agent = RealtimeAgent::connect(config).expect("agent");
    let mut state = agent.connection_state();
    wait_for_state(&mut state, |s| *s == ConnectionState::GivenUp).await;

    let result = agent.send_chat("anyone there?").await;
    assert!(matches!(result, Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn explicit_disconnect_does_not_reconnect() {
    let server = TestServer::start().await;
    let token = server.seed_member(3, "Paul", "Leroy").await;

    let agent = RealtimeAgent::connect(AgentConfig::new(server.url(), token)).expect("agent");
    let mut state = agent.connection_state();
    wait_for_state(&mut state, |s| *s == ConnectionState::Connected).await;

    agent.disconnect().await;
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
}
