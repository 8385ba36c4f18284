use std::time::Duration;

/// Configuration for transports and [`CmdRunner`](crate::CmdRunner).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Timeout for opening the transport. Default: 10 seconds.
    pub connect_timeout: Duration,
    /// Deadline for a response in [`CmdRunner::run`](crate::CmdRunner::run). Default: 10 seconds.
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(10),
        }
    }
}
