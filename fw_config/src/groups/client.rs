use std::time::Duration;

crate::config_group!({

    /// Maximum time allowed to establish a TCP connection to the server.
    ///
    /// The default value is 60sec.
    ///
    /// Use the environment variable `FW_SDK_CLIENT_CONNECT_TIMEOUT` to set this value.
    ref connect_timeout: Duration = Duration::from_secs(60);

    /// Maximum time allowed between receiving data packets.  The timer resets whenever data arrives,
    /// so long but progressing transfers are not cut off.
    ///
    /// The default value is 120sec.
    ///
    /// Use the environment variable `FW_SDK_CLIENT_READ_TIMEOUT` to set this value.
    ref read_timeout: Duration = Duration::from_secs(120);

    /// Cleanup idle connections that are unused for this amount of time.
    ///
    /// The default value is 60sec.
    ///
    /// Use the environment variable `FW_SDK_CLIENT_IDLE_CONNECTION_TIMEOUT` to set this value.
    ref idle_connection_timeout: Duration = Duration::from_secs(60);

    /// Keep no more than this number of idle connections per host in the connection pool.
    ///
    /// The default value is 16.
    ///
    /// Use the environment variable `FW_SDK_CLIENT_MAX_IDLE_CONNECTIONS` to set this value.
    ref max_idle_connections: usize = 16;

    /// Dump every outgoing request (request line and headers) and the response status.
    ///
    /// The default value is false.
    ///
    /// Use the environment variable `FW_SDK_CLIENT_DEBUG_REQUESTS` (or the legacy `SdkDebug`) to set this value.
    ref debug_requests: bool = false;

    /// User agent sent with every request.
    ///
    /// The default value is "fw-sdk-rust/<crate version>".
    ///
    /// Use the environment variable `FW_SDK_CLIENT_USER_AGENT` to set this value.
    ref user_agent: String = format!("fw-sdk-rust/{}", env!("CARGO_PKG_VERSION"));

});
