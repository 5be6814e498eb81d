//! Backend client tests.

mod fake;
mod invoker_test;
mod process_test;
mod stream_test;

/// Verify the public backend surface is exported from the library.
#[test]
fn test_all_backend_types_exported() {
    use pacman_client::backend::{
        classify, BackendClient, BackendCommand, ClientError, ErrorKind, LineBuffer,
        ProcessSpawner, StreamCallbacks, StreamEvent, StreamSession, DEFAULT_TIMEOUT,
    };

    let _ = ProcessSpawner::new();
    let _ = LineBuffer::new();
    let _ = StreamSession::new("upgrade", StreamCallbacks::new());
    let _: fn(&pacman_client::config::ClientConfig) -> BackendClient = BackendClient::new;
    let _ = BackendCommand::new("check-updates", pacman_client::backend::Privilege::Optional);
    let _ = StreamEvent::Complete {
        success: true,
        message: None,
    };
    assert_eq!(classify("Operation timed out"), ErrorKind::Timeout);
    assert_eq!(ClientError::internal("boom").kind, ErrorKind::InternalError);
    assert_eq!(DEFAULT_TIMEOUT.as_secs(), 30);
}
