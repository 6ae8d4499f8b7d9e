//! Emulator control channel
//!
//! The emulator exposes its monitor on a local socket. The harness only ever
//! writes one command to it and never reads a reply.

use std::io;
use std::path::Path;
use std::time::Duration;

use interprocess::local_socket::tokio::{prelude::*, Stream};
use interprocess::local_socket::{GenericFilePath, ToFsName};
use tokio::io::AsyncWriteExt;

/// Upper bound for connecting and writing one command
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Command that asks the emulator to shut down
pub const QUIT: &str = "quit";

/// Write a single command line to the control socket
pub async fn send_command(socket: &Path, command: &str) -> io::Result<()> {
    let name = socket.to_string_lossy().into_owned();

    let send = async {
        let name = name.to_fs_name::<GenericFilePath>()?;
        let mut stream = Stream::connect(name).await?;
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await
    };

    tokio::time::timeout(SEND_TIMEOUT, send)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "control socket not responding"))?
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn test_command_is_newline_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("monitor.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            conn.read_to_string(&mut received).await.unwrap();
            received
        });

        send_command(&socket, QUIT).await.unwrap();
        assert_eq!(server.await.unwrap(), "quit\n");
    }

    #[tokio::test]
    async fn test_missing_socket_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = send_command(&dir.path().join("absent.sock"), QUIT).await;
        assert!(result.is_err());
    }
}
