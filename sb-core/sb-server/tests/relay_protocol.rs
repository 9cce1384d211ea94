use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sb_model::{BoardSelection, ErrorKind, RelayCommand, RelayRequest, RelayResponse, RelayResult};
use sb_server::serial::{FakeSerial, FakeSerialHandle};
use sb_server::toolchain::RecordingRunner;
use sb_server::{Credential, RelayServer, SerialBridge, Session, ToolchainGateway};

const TOKEN: &str = "relay-test-token";

fn server_with(fake: FakeSerial, runner: &RecordingRunner) -> RelayServer {
    let session = Session::new(
        SerialBridge::new(Box::new(fake)),
        ToolchainGateway::new(Box::new(runner.clone())).with_program("arduino-cli"),
    );
    RelayServer::new(session, Credential::new(TOKEN))
}

fn server() -> (RelayServer, FakeSerialHandle, RecordingRunner) {
    let fake = FakeSerial::new(["/dev/ttyACM0"]);
    let handle = fake.handle();
    let runner = RecordingRunner::new();
    (server_with(fake, &runner), handle, runner)
}

fn send(server: &RelayServer, id: u64, command: RelayCommand, token: Option<&str>) -> RelayResponse {
    let request = RelayRequest::new(id, &command, token.map(str::to_string));
    let text = serde_json::to_string(&request).unwrap();
    RelayResponse::parse(&server.handle_text(&text)).unwrap()
}

fn status(server: &RelayServer) -> RelayResult {
    send(server, 99, RelayCommand::Status, Some(TOKEN)).into_result().unwrap()
}

#[test_log::test]
fn test_wrong_or_missing_token_has_no_effect() {
    let (server, _, _) = server();

    for token in [None, Some("guess")] {
        let response = send(
            &server,
            1,
            RelayCommand::SelectBoard {
                board: "uno".to_string(),
            },
            token,
        );
        assert!(!response.success);
        assert_eq!(response.id, 1);
        assert_eq!(response.error.unwrap().kind, ErrorKind::Unauthorized);
    }

    match status(&server) {
        RelayResult::Status(status) => assert_eq!(status.board, BoardSelection::Unselected),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test_log::test]
fn test_unknown_operation_and_malformed_requests() {
    let (server, _, _) = server();

    let text = format!(r#"{{"id":5,"token":"{TOKEN}","op":"reboot","payload":{{}}}}"#);
    let response = RelayResponse::parse(&server.handle_text(&text)).unwrap();
    assert_eq!(response.id, 5);
    assert_eq!(response.error.unwrap().kind, ErrorKind::UnknownOperation);

    let text = format!(r#"{{"id":6,"token":"{TOKEN}","op":"listen","payload":{{"duration_secs":"long"}}}}"#);
    let response = RelayResponse::parse(&server.handle_text(&text)).unwrap();
    assert_eq!(response.error.unwrap().kind, ErrorKind::MalformedRequest);

    let response = RelayResponse::parse(&server.handle_text("{\"id\":")).unwrap();
    assert_eq!(response.id, 0);
    assert_eq!(response.error.unwrap().kind, ErrorKind::MalformedRequest);
}

#[test_log::test]
fn test_unknown_operation_is_checked_after_token() {
    let (server, _, _) = server();
    let response = RelayResponse::parse(&server.handle_text(r#"{"id":7,"op":"reboot"}"#)).unwrap();
    assert_eq!(response.error.unwrap().kind, ErrorKind::Unauthorized);
}

#[test_log::test]
fn test_compile_failure_carries_log() {
    let runner = RecordingRunner::new().failing("sketch.ino:9:5: error: expected ';'");
    let server = server_with(FakeSerial::new(["COM5"]), &runner);

    send(
        &server,
        1,
        RelayCommand::SelectBoard {
            board: "uno".to_string(),
        },
        Some(TOKEN),
    );
    let response = send(
        &server,
        2,
        RelayCommand::Compile {
            source: "void loop() { x }".to_string(),
            extra_args: vec![],
        },
        Some(TOKEN),
    );
    assert!(!response.success);
    assert_eq!(response.error.as_ref().unwrap().kind, ErrorKind::CompileFailed);
    match response.result {
        Some(RelayResult::Build(build)) => assert!(build.log.contains("expected ';'")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test_log::test]
fn test_listen_returns_lines_from_window() {
    let fake = FakeSerial::new(["COM5"])
        .with_line(Duration::from_millis(500), "tick 1")
        .with_line(Duration::from_millis(1000), "tick 2")
        .with_line(Duration::from_millis(1500), "tick 3")
        .with_line(Duration::from_millis(2600), "tick 4");
    let server = server_with(fake, &RecordingRunner::new());

    send(
        &server,
        1,
        RelayCommand::ConfigureSerial {
            port: Some("COM5".to_string()),
            baud: Some(9600),
        },
        Some(TOKEN),
    );
    let result = send(
        &server,
        2,
        RelayCommand::Listen {
            duration_secs: 2.0,
            prefix: None,
        },
        Some(TOKEN),
    )
    .into_result()
    .unwrap();
    assert_eq!(
        result,
        RelayResult::Lines {
            lines: vec!["tick 1".to_string(), "tick 2".to_string(), "tick 3".to_string()]
        }
    );
}

#[test_log::test]
fn test_concurrent_uploads_never_overlap() {
    let runner = RecordingRunner::new().with_delay(Duration::from_millis(100));
    let server = Arc::new(server_with(FakeSerial::new(["COM5"]), &runner));

    send(
        &server,
        1,
        RelayCommand::SelectBoard {
            board: "mega".to_string(),
        },
        Some(TOKEN),
    );
    send(
        &server,
        2,
        RelayCommand::ConfigureSerial {
            port: Some("COM5".to_string()),
            baud: None,
        },
        Some(TOKEN),
    );

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                let response = send(
                    &server,
                    10 + i,
                    RelayCommand::Upload {
                        source: format!("// build {i}"),
                        extra_args: vec![],
                    },
                    Some(TOKEN),
                );
                assert!(response.success, "upload {i} failed: {response:?}");
                assert_eq!(response.id, 10 + i);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut calls = runner.invocations();
    assert_eq!(calls.len(), 4);
    calls.sort_by_key(|call| call.started);
    for pair in calls.windows(2) {
        assert!(pair[0].finished <= pair[1].started, "uploads overlapped");
    }
}
