use std::time::Duration;

crate::config_group!({

    /// How often a transfer publishes its byte count to the progress channel.  Updates are only
    /// sent when the count changed since the last one.
    ///
    /// The default value is 200ms.
    ///
    /// Use the environment variable `FW_SDK_TRANSFER_PROGRESS_INTERVAL` to set this value.
    ref progress_interval: Duration = Duration::from_millis(200);

    /// Capacity of the progress channel created by the `*_simple` transfer calls.  Updates that
    /// find the channel full are dropped.
    ///
    /// The default value is 10.
    ///
    /// Use the environment variable `FW_SDK_TRANSFER_PROGRESS_CHANNEL_CAPACITY` to set this value.
    ref progress_channel_capacity: usize = 10;

    /// Number of chunks the in-memory upload pipe holds before the multipart encoder has to wait
    /// for the network side.
    ///
    /// The default value is 16.
    ///
    /// Use the environment variable `FW_SDK_TRANSFER_PIPE_BUFFER_CHUNKS` to set this value.
    ref pipe_buffer_chunks: usize = 16;

    /// Size of the buffer used to copy file contents into the multipart body and response bodies
    /// into download destinations.
    ///
    /// The default value is 65536.
    ///
    /// Use the environment variable `FW_SDK_TRANSFER_COPY_BUFFER_SIZE` to set this value.
    ref copy_buffer_size: usize = 64 * 1024;

});
