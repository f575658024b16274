//! Integration tests for the exec handshake and the two-task relay.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use groupctl::relay::{ExecRequest, ExecSession, DRAIN_GRACE};
use groupctl::{AppError, RelayDirection};

use super::test_helpers::{
    joined, Call, FakeConnector, FakeRemoteClient, RemoteEnd, EXEC_PASSWORD,
};

/// Reader that fails on first use.
struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed")))
    }
}

async fn open_session(
    client: &FakeRemoteClient,
    connector: &FakeConnector,
) -> (ExecSession, RemoteEnd) {
    let remote = connector.prepare();
    let session = ExecSession::open(
        client,
        connector,
        &ExecRequest::new("g1", "web", "/bin/sh"),
        &CancellationToken::new(),
    )
    .await
    .expect("session opens");
    (session, remote)
}

#[tokio::test]
async fn secret_is_the_first_frame_before_run() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();

    let (session, mut remote) = open_session(&client, &connector).await;

    assert_eq!(session.group(), "g1");
    assert_eq!(session.container(), "web");
    let frames = remote.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].as_ref(), EXEC_PASSWORD.as_bytes());
}

#[tokio::test]
async fn relays_both_directions_until_remote_closes() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let (session, mut remote) = open_session(&client, &connector).await;
    remote.drain();

    let (reader, mut keyboard) = tokio::io::duplex(64);
    let (writer, mut screen) = tokio::io::duplex(64);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(async move { session.run(reader, writer, &cancel).await });

    keyboard.write_all(b"ls\n").await.expect("type");
    let mut typed = Vec::new();
    for _ in 0..3 {
        let frame = tokio::time::timeout(Duration::from_secs(5), remote.from_local.recv())
            .await
            .expect("frame in time")
            .expect("frame");
        assert_eq!(frame.len(), 1);
        typed.push(frame);
    }
    assert_eq!(joined(&typed), b"ls\n".to_vec());

    remote.send(b"file.txt\n");
    remote.close();

    run.await.expect("join").expect("clean close");
    let mut output = Vec::new();
    screen.read_to_end(&mut output).await.expect("read output");
    assert_eq!(output, b"file.txt\n".to_vec());
}

#[tokio::test]
async fn downstream_close_wins_over_open_input() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let (session, mut remote) = open_session(&client, &connector).await;
    remote.close();

    let (reader, _keyboard) = tokio::io::duplex(8);
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        session.run(reader, tokio::io::sink(), &CancellationToken::new()),
    )
    .await
    .expect("run returns without waiting for input");

    assert!(outcome.is_ok(), "{outcome:?}");
}

#[tokio::test]
async fn end_of_input_closes_the_channel() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let (session, mut remote) = open_session(&client, &connector).await;

    let outcome = tokio::time::timeout(
        DRAIN_GRACE,
        session.run(&b"exit"[..], tokio::io::sink(), &CancellationToken::new()),
    )
    .await
    .expect("acknowledged close ends the session before the grace period");

    assert!(outcome.is_ok(), "{outcome:?}");
    assert_eq!(joined(&remote.drain()[1..]), b"exit".to_vec());
    assert!(matches!(
        remote.from_local.try_recv(),
        Err(TryRecvError::Disconnected)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echoed_input_is_written_exactly_once() {
    let input: Vec<u8> = (0..200u8).collect();

    for _ in 0..20 {
        let client = FakeRemoteClient::new();
        let connector = FakeConnector::new();
        connector.prepare_echo();
        let session = ExecSession::open(
            &client,
            &connector,
            &ExecRequest::new("g1", "web", "/bin/sh"),
            &CancellationToken::new(),
        )
        .await
        .expect("session opens");

        let (writer, mut screen) = tokio::io::duplex(4096);
        session
            .run(
                std::io::Cursor::new(input.clone()),
                writer,
                &CancellationToken::new(),
            )
            .await
            .expect("clean end of input");

        let mut output = Vec::new();
        screen.read_to_end(&mut output).await.expect("read output");
        assert_eq!(output, input);
    }
}

#[tokio::test]
async fn unacknowledged_close_is_bounded_by_the_grace_period() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let remote = connector.prepare_unacknowledged();
    let session = ExecSession::open(
        &client,
        &connector,
        &ExecRequest::new("g1", "web", "/bin/sh"),
        &CancellationToken::new(),
    )
    .await
    .expect("session opens");

    let late = remote.to_local.clone().expect("remote open");
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = late.send(Ok(bytes::Bytes::from_static(b"bye\n")));
    });

    let (writer, mut screen) = tokio::io::duplex(64);
    let started = Instant::now();
    session
        .run(&b"exit"[..], writer, &CancellationToken::new())
        .await
        .expect("grace period ends cleanly");

    let elapsed = started.elapsed();
    assert!(elapsed >= DRAIN_GRACE, "{elapsed:?}");
    assert!(elapsed < DRAIN_GRACE + Duration::from_secs(3), "{elapsed:?}");
    let mut output = Vec::new();
    screen.read_to_end(&mut output).await.expect("read output");
    assert_eq!(output, b"bye\n".to_vec());
    drop(remote);
}

#[tokio::test]
async fn reader_failure_is_tagged_upstream() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let (session, _remote) = open_session(&client, &connector).await;

    let err = session
        .run(BrokenReader, tokio::io::sink(), &CancellationToken::new())
        .await
        .expect_err("reader failed");

    assert!(
        matches!(err, AppError::Relay { direction: RelayDirection::Upstream, .. }),
        "{err}"
    );
    assert!(err.to_string().contains("failed to send input to container"));
}

#[tokio::test]
async fn peer_gone_while_sending_is_tagged_upstream() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let (session, remote) = open_session(&client, &connector).await;
    let RemoteEnd {
        to_local,
        from_local,
    } = remote;
    drop(from_local);

    let err = session
        .run(&b"x"[..], tokio::io::sink(), &CancellationToken::new())
        .await
        .expect_err("send failed");

    assert!(
        matches!(err, AppError::Relay { direction: RelayDirection::Upstream, .. }),
        "{err}"
    );
    drop(to_local);
}

#[tokio::test]
async fn channel_failure_is_tagged_downstream() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let (session, remote) = open_session(&client, &connector).await;
    remote.fail(AppError::Transport("websocket: connection reset".into()));

    let (reader, _keyboard) = tokio::io::duplex(8);
    let err = session
        .run(reader, tokio::io::sink(), &CancellationToken::new())
        .await
        .expect_err("channel failed");

    assert!(
        matches!(err, AppError::Relay { direction: RelayDirection::Downstream, .. }),
        "{err}"
    );
    let message = err.to_string();
    assert!(message.contains("failed to read input from container"), "{message}");
    assert!(message.contains("connection reset"), "{message}");
}

#[tokio::test]
async fn cancellation_stops_an_idle_session() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let (session, _remote) = open_session(&client, &connector).await;

    let (reader, _keyboard) = tokio::io::duplex(8);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = session
        .run(reader, tokio::io::sink(), &cancel)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, AppError::Cancelled(_)), "{err}");
}

#[tokio::test]
async fn handshake_errors_are_returned_unchanged() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    client.fail_exec(AppError::NotFound("container \"nope\"".into()));

    let err = ExecSession::open(
        &client,
        &connector,
        &ExecRequest::new("g1", "nope", "/bin/sh"),
        &CancellationToken::new(),
    )
    .await
    .expect_err("unknown container");

    assert!(err.is_not_found(), "{err}");
    assert!(connector.uris().is_empty());
}

#[tokio::test]
async fn cancelled_open_skips_the_handshake() {
    let client = FakeRemoteClient::new();
    let connector = FakeConnector::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = ExecSession::open(
        &client,
        &connector,
        &ExecRequest::new("g1", "web", "/bin/sh"),
        &cancel,
    )
    .await
    .expect_err("cancelled");

    assert!(matches!(err, AppError::Cancelled(_)), "{err}");
    assert!(!client
        .calls()
        .iter()
        .any(|call| matches!(call, Call::ExecHandshake { .. })));
}
