//! Daemon RPC client.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::{ListArgs, Operation};
use crate::error::{Error, Result};
use crate::model::Issue;

/// Client for a running daemon.
///
/// Holds no connection: every call opens a fresh one, bounded by `timeout`
/// on both read and write.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// Return a client only if a daemon answers `ping` on `socket_path`.
    ///
    /// A missing socket, a refused connection or a failed ping all mean
    /// "no daemon"; the reason is logged at debug level.
    #[must_use]
    pub fn try_connect(socket_path: &Path, timeout: Duration) -> Option<Self> {
        if !socket_path.exists() {
            debug!(socket = %socket_path.display(), "No daemon socket");
            return None;
        }

        let client = Self::new(socket_path, timeout);
        match client.ping() {
            Ok(()) => {
                debug!(socket = %socket_path.display(), "Daemon reachable");
                Some(client)
            }
            Err(e) => {
                debug!(socket = %socket_path.display(), error = %e, "Daemon unreachable");
                None
            }
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Health probe.
    ///
    /// # Errors
    ///
    /// Returns `Error::Daemon` if the daemon cannot be reached or reports
    /// a failure.
    pub fn ping(&self) -> Result<()> {
        self.call(Operation::Ping, Value::Null).map(|_| ())
    }

    /// List issues matching `args`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Daemon` on any transport failure, a daemon-side
    /// error, or a payload that is not an issue array.
    pub fn list(&self, args: &ListArgs) -> Result<Vec<Issue>> {
        let args = serde_json::to_value(args)?;
        let data = self.call(Operation::List, args)?;
        serde_json::from_value(data)
            .map_err(|e| Error::daemon(format!("invalid list response: {e}")))
    }

    #[cfg(unix)]
    fn call(&self, operation: Operation, args: Value) -> Result<Value> {
        use std::io::BufReader;
        use std::os::unix::net::UnixStream;

        use super::{Request, Response, read_message, write_message};

        let stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            Error::daemon_io(
                format!("cannot connect to {}: {e}", self.socket_path.display()),
                e,
            )
        })?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|()| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|e| Error::daemon_io(format!("cannot set socket timeout: {e}"), e))?;

        let request = Request::new(operation, args);
        debug!(?operation, request_id = %request.request_id, "RPC request");

        let mut writer = &stream;
        write_message(&mut writer, &request)
            .map_err(|e| Error::daemon_io(format!("send failed: {e}"), e))?;

        let mut reader = BufReader::new(&stream);
        let response: Response = read_message(&mut reader)
            .map_err(|e| Error::daemon_io(format!("receive failed: {e}"), e))?
            .ok_or_else(|| Error::daemon("daemon closed the connection without responding"))?;

        response.into_result()
    }

    #[cfg(not(unix))]
    fn call(&self, _operation: Operation, _args: Value) -> Result<Value> {
        Err(Error::daemon("daemon RPC requires Unix domain sockets"))
    }
}
