// tests/irc_platform_tests.rs
//
// Drives IrcPlatform against a scripted server on a local socket.

use std::time::Duration;

use autogram_core::platforms::irc::{IrcConnectConfig, IrcPlatform};
use autogram_core::platforms::{ConnectionStatus, MessageSink, PlatformIntegration};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Peer {
    lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let (read, writer) = stream.into_split();
        Self { lines: BufReader::new(read).lines(), writer }
    }

    async fn expect_line(&mut self) -> String {
        timeout(WAIT, self.lines.next_line()).await.unwrap().unwrap().unwrap()
    }

    async fn say(&mut self, line: &str) {
        self.writer.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
    }
}

#[tokio::test]
async fn test_register_join_relay_and_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = IrcConnectConfig {
        server: listener.local_addr().unwrap().to_string(),
        use_tls: false,
        accept_invalid_certs: true,
        nickname: "autogram".into(),
        realname: "Autogram Bridge".into(),
    };
    let mut platform = IrcPlatform::new(config, "#autogram");
    let mut events = platform.take_events().unwrap();
    let sender = platform.sender();

    let (connected, peer) = tokio::join!(platform.connect(), Peer::accept(&listener));
    connected.unwrap();
    let mut peer = peer;

    assert_eq!(peer.expect_line().await, "NICK autogram");
    assert_eq!(peer.expect_line().await, "USER autogram 0 * :Autogram Bridge");

    peer.say(":irc.example.net 001 autogram :Welcome").await;
    assert_eq!(peer.expect_line().await, "JOIN #autogram");

    peer.say("PING :irc.example.net").await;
    assert_eq!(peer.expect_line().await, "PONG :irc.example.net");

    peer.say(":carol!c@host PRIVMSG #autogram :hello bridge").await;
    let evt = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(evt.command, "PRIVMSG");
    assert_eq!(evt.channel.as_deref(), Some("#autogram"));
    assert_eq!(evt.nick.as_deref(), Some("carol"));
    assert_eq!(evt.text.as_deref(), Some("hello bridge"));

    sender.send_message("#autogram", "alice: one\nalice: two").await.unwrap();
    assert_eq!(peer.expect_line().await, "PRIVMSG #autogram :alice: one");
    assert_eq!(peer.expect_line().await, "PRIVMSG #autogram :alice: two");

    // Server hangs up; the platform dials back in and registers again.
    drop(peer);
    let mut peer = Peer::accept(&listener).await;
    assert_eq!(peer.expect_line().await, "NICK autogram");
    assert_eq!(peer.expect_line().await, "USER autogram 0 * :Autogram Bridge");
    timeout(WAIT, async {
        while platform.get_connection_status().await.unwrap() != ConnectionStatus::Connected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    platform.disconnect().await.unwrap();
    assert_eq!(peer.expect_line().await, "QUIT :bridge shutting down");
    assert_eq!(
        platform.get_connection_status().await.unwrap(),
        ConnectionStatus::Disconnected
    );
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut platform = IrcPlatform::new(
        IrcConnectConfig {
            server: addr.to_string(),
            use_tls: false,
            accept_invalid_certs: true,
            nickname: "autogram".into(),
            realname: "Autogram".into(),
        },
        "#autogram",
    );
    assert!(platform.connect().await.is_err());
    assert!(matches!(
        platform.get_connection_status().await.unwrap(),
        ConnectionStatus::Error(_)
    ));
}
