use std::time::Duration;

use bytes::Bytes;
use rand::RngCore;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use utils::ChannelWriter;

use crate::error::{Result, TransferError};
use crate::progress_notifier::ProgressNotifier;
use crate::source::UploadSource;

/// Streaming `multipart/form-data` writer.
///
/// Parts are written straight through to the inner writer as they are created; nothing is buffered
/// beyond a part header.
pub struct MultipartWriter<W> {
    writer: W,
    boundary: String,
    wrote_part: bool,
}

fn random_boundary() -> String {
    let mut buf = [0u8; 30];
    rand::rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl<W: AsyncWrite + Unpin> MultipartWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_boundary(writer, random_boundary())
    }

    pub fn with_boundary(writer: W, boundary: impl Into<String>) -> Self {
        Self {
            writer,
            boundary: boundary.into(),
            wrote_part: false,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn form_data_content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    async fn create_part(&mut self, content_disposition: String, content_type: Option<&str>) -> std::io::Result<()> {
        let mut header = String::new();
        if self.wrote_part {
            header.push_str("\r\n");
        }
        header.push_str(&format!("--{}\r\n", self.boundary));
        header.push_str(&format!("Content-Disposition: {content_disposition}\r\n"));
        if let Some(content_type) = content_type {
            header.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        header.push_str("\r\n");

        self.wrote_part = true;
        self.writer.write_all(header.as_bytes()).await
    }

    /// Writes a complete form field.
    pub async fn write_field(&mut self, name: &str, value: &[u8]) -> std::io::Result<()> {
        self.create_part(format!("form-data; name=\"{}\"", escape_quotes(name)), None)
            .await?;
        self.writer.write_all(value).await
    }

    /// Starts a file part and returns the writer the file contents go to.  The part ends when the next
    /// part is created or the writer is finished.
    pub async fn create_form_file(&mut self, field_name: &str, file_name: &str) -> std::io::Result<&mut W> {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(field_name),
            escape_quotes(file_name)
        );
        self.create_part(disposition, Some("application/octet-stream")).await?;
        Ok(&mut self.writer)
    }

    /// Writes the closing boundary and flushes, returning the inner writer.
    pub async fn finish(mut self) -> std::io::Result<W> {
        let trailer = if self.wrote_part {
            format!("\r\n--{}--\r\n", self.boundary)
        } else {
            format!("--{}--\r\n", self.boundary)
        };
        self.writer.write_all(trailer.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(self.writer)
    }

    /// Gives up on the body without writing the closing boundary.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Field name of the `index`-th (0-based) of `count` uploaded files.
fn file_field_name(index: usize, count: usize) -> String {
    if count == 1 {
        "file".to_string()
    } else {
        format!("file{}", index + 1)
    }
}

/// Everything the encoder task needs to produce one upload body.
pub(crate) struct UploadBody {
    pub metadata: Option<Vec<u8>>,
    pub sources: Vec<UploadSource>,
    pub progress: Option<mpsc::Sender<u64>>,
    pub progress_interval: Duration,
    pub copy_buffer_size: usize,
}

/// Encodes `body` into the pipe.
///
/// On success the closing boundary is written and the pipe is shut down cleanly.  On failure or
/// cancellation the pipe is aborted with the error so the request body fails instead of ending
/// early.  The progress channel is closed on every path.
pub(crate) async fn write_upload_body(
    mut multipart: MultipartWriter<ChannelWriter>,
    body: UploadBody,
    cancel: CancellationToken,
) -> Result<()> {
    let mut notifier = ProgressNotifier::<UploadSource>::new(body.progress, body.progress_interval);

    let result = tokio::select! {
        result = write_parts(&mut multipart, &mut notifier, body.metadata, body.sources, body.copy_buffer_size) => result,
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
    };

    let result = match result {
        Ok(()) => finish_body(multipart).await,
        Err(e) => {
            debug!(error = %e, "aborting upload body");
            multipart.into_inner().abort(std::io::Error::other(e.to_string())).await;
            Err(e)
        },
    };

    notifier.close();
    result
}

async fn finish_body(multipart: MultipartWriter<ChannelWriter>) -> Result<()> {
    let mut pipe = multipart.finish().await?;
    pipe.shutdown().await?;
    Ok(())
}

async fn write_parts(
    multipart: &mut MultipartWriter<ChannelWriter>,
    notifier: &mut ProgressNotifier<UploadSource>,
    metadata: Option<Vec<u8>>,
    sources: Vec<UploadSource>,
    copy_buffer_size: usize,
) -> Result<()> {
    if let Some(metadata) = metadata.filter(|m| !m.is_empty()) {
        multipart.write_field("metadata", &metadata).await?;
    }

    let count = sources.len();
    for (index, mut source) in sources.into_iter().enumerate() {
        let file_name = source.resolved_name()?;
        let field_name = file_field_name(index, count);

        // Only file contents pass through the notifier, so progress ignores the multipart framing.
        // Swapping in this source drops the previous one along with its handle.
        source.open().await?;
        notifier.set_reader(source);

        trace!(field = %field_name, file = %file_name, "writing upload part");
        let part = multipart.create_form_file(&field_name, &file_name).await?;
        let mut reader = BufReader::with_capacity(copy_buffer_size.max(1), &mut *notifier);
        tokio::io::copy_buf(&mut reader, part).await?;
    }

    Ok(())
}

/// A part decoded by [parse_form_data].
#[derive(Clone, Debug, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Parse a `multipart/form-data` body.
///
/// Extracts the boundary from `content_type`, splits the body by boundary markers and reads the
/// `Content-Disposition` and `Content-Type` headers of each part.  Parts are returned in body order.
pub fn parse_form_data(content_type: &str, body: Bytes) -> Result<Vec<FormPart>> {
    let boundary = extract_boundary(content_type)?;

    let delimiter = format!("\r\n--{boundary}");
    let body_slice = body.as_ref();

    // The body starts with --boundary (no leading \r\n).
    let first_delim = format!("--{boundary}");
    let Some(start) = find_subsequence(body_slice, first_delim.as_bytes()) else {
        return Err(malformed("no boundary found in body"));
    };

    let mut parts = Vec::new();
    let mut remaining = &body_slice[start + first_delim.len()..];

    loop {
        if remaining.starts_with(b"\r\n") {
            remaining = &remaining[2..];
        } else if remaining.starts_with(b"--") {
            // Closing boundary.
            break;
        } else {
            return Err(malformed("boundary is not followed by a line break"));
        }

        let Some(next_boundary) = find_subsequence(remaining, delimiter.as_bytes()) else {
            return Err(malformed("missing closing boundary"));
        };
        let part_data = &remaining[..next_boundary];

        let header_end = if part_data.starts_with(b"\r\n") {
            Some(0)
        } else {
            find_subsequence(part_data, b"\r\n\r\n").map(|p| p + 2)
        };
        let Some(header_end) = header_end else {
            return Err(malformed("part headers are not terminated"));
        };
        let headers = std::str::from_utf8(&part_data[..header_end])
            .map_err(|e| malformed(format!("invalid UTF-8 in part headers: {e}")))?;
        let data_start = header_end + 2;

        let mut name = None;
        let mut filename = None;
        let mut part_content_type = None;
        for line in headers.split("\r\n").filter(|l| !l.is_empty()) {
            let Some((key, value)) = line.split_once(':') else {
                return Err(malformed(format!("invalid part header: {line}")));
            };
            let value = value.trim();
            if key.eq_ignore_ascii_case("content-disposition") {
                for (param, param_value) in disposition_params(value) {
                    match param.to_ascii_lowercase().as_str() {
                        "name" => name = Some(param_value),
                        "filename" => filename = Some(param_value),
                        _ => {},
                    }
                }
            } else if key.eq_ignore_ascii_case("content-type") {
                part_content_type = Some(value.to_string());
            }
        }

        let offset = remaining.as_ptr() as usize - body_slice.as_ptr() as usize + data_start;
        parts.push(FormPart {
            name: name.ok_or_else(|| malformed("part without a name"))?,
            filename,
            content_type: part_content_type,
            data: body.slice(offset..offset + (part_data.len() - data_start)),
        });

        remaining = &remaining[next_boundary + delimiter.len()..];
    }

    Ok(parts)
}

fn malformed(message: impl Into<String>) -> TransferError {
    TransferError::MalformedMultipart(message.into())
}

/// Extract the boundary parameter from a Content-Type header value.
fn extract_boundary(content_type: &str) -> Result<String> {
    for part in content_type.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("boundary=") {
            let boundary = value.trim_matches('"');
            return Ok(boundary.to_string());
        }
    }
    Err(malformed(format!("no boundary in Content-Type: {content_type}")))
}

/// Splits `form-data; name="a"; filename="b"` into its parameters, undoing quote escapes.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut rest = value;

    // Skip the disposition type.
    match rest.find(';') {
        Some(pos) => rest = &rest[pos + 1..],
        None => return params,
    }

    loop {
        rest = rest.trim_start_matches([' ', ';']);
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim().to_string();
        rest = &rest[eq + 1..];

        let mut param_value = String::new();
        if let Some(quoted) = rest.strip_prefix('"') {
            let mut chars = quoted.char_indices();
            let mut consumed = quoted.len();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            param_value.push(escaped);
                        }
                    },
                    '"' => {
                        consumed = i + 1;
                        break;
                    },
                    c => param_value.push(c),
                }
            }
            rest = &quoted[consumed..];
        } else {
            let end = rest.find(';').unwrap_or(rest.len());
            param_value.push_str(rest[..end].trim());
            rest = &rest[end..];
        }

        params.push((key, param_value));
    }

    params
}

/// Find the first occurrence of a subsequence in a byte slice.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    async fn encode_to_vec(metadata: Option<&[u8]>, fields: &[(&str, &str, &[u8])]) -> (String, Bytes) {
        let mut writer = MultipartWriter::new(Vec::new());
        if let Some(metadata) = metadata {
            writer.write_field("metadata", metadata).await.unwrap();
        }
        for (field, file, data) in fields {
            writer.create_form_file(field, file).await.unwrap().write_all(data).await.unwrap();
        }
        let content_type = writer.form_data_content_type();
        (content_type, Bytes::from(writer.finish().await.unwrap()))
    }

    async fn drain(stream: utils::ChannelStream) -> std::io::Result<Bytes> {
        let chunks: Vec<_> = stream.collect().await;
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(out))
    }

    fn upload_body(metadata: Option<Vec<u8>>, sources: Vec<UploadSource>) -> UploadBody {
        UploadBody {
            metadata,
            sources,
            progress: None,
            progress_interval: Duration::from_millis(200),
            copy_buffer_size: 4,
        }
    }

    #[test]
    fn test_boundary_is_random_hex() {
        let a = random_boundary();
        let b = random_boundary();
        assert_eq!(a.len(), 60);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_empty_body_is_minimal() {
        let writer = MultipartWriter::with_boundary(Vec::new(), "xyz");
        let content_type = writer.form_data_content_type();
        let body = writer.finish().await.unwrap();
        assert_eq!(body, b"--xyz--\r\n");

        let parts = parse_form_data(&content_type, Bytes::from(body)).unwrap();
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn test_exact_wire_format() {
        let mut writer = MultipartWriter::with_boundary(Vec::new(), "b0");
        writer.write_field("metadata", b"{}").await.unwrap();
        writer.create_form_file("file", "a.txt").await.unwrap().write_all(b"AAA").await.unwrap();
        let body = writer.finish().await.unwrap();

        let expected = "--b0\r\n\
            Content-Disposition: form-data; name=\"metadata\"\r\n\
            \r\n\
            {}\r\n\
            --b0\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
            Content-Type: application/octet-stream\r\n\
            \r\n\
            AAA\r\n\
            --b0--\r\n";
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_round_trip_with_escaped_names() {
        let (content_type, body) = encode_to_vec(
            Some(&br#"{"label": "x"}"#[..]),
            &[("file1", "say \"hi\".txt", &b"first"[..]), ("file2", r"back\slash.bin", &b""[..])],
        )
        .await;

        let parts = parse_form_data(&content_type, body).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].name, "metadata");
        assert_eq!(parts[0].filename, None);
        assert_eq!(&parts[0].data[..], br#"{"label": "x"}"#);
        assert_eq!(parts[1].filename.as_deref(), Some("say \"hi\".txt"));
        assert_eq!(parts[1].content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(&parts[1].data[..], b"first");
        assert_eq!(parts[2].filename.as_deref(), Some(r"back\slash.bin"));
        assert!(parts[2].data.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_form_data("text/plain", Bytes::new()).is_err());
        assert!(parse_form_data("multipart/form-data; boundary=q", Bytes::from_static(b"nothing")).is_err());
        assert!(
            parse_form_data(
                "multipart/form-data; boundary=q",
                Bytes::from_static(b"--q\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nunterminated")
            )
            .is_err()
        );
    }

    #[test]
    fn test_extract_boundary() {
        assert_eq!(extract_boundary("multipart/form-data; boundary=something").unwrap(), "something");
        assert_eq!(extract_boundary("multipart/form-data; boundary=\"quoted\"").unwrap(), "quoted");
    }

    #[test]
    fn test_field_names() {
        assert_eq!(file_field_name(0, 1), "file");
        assert_eq!(file_field_name(0, 2), "file1");
        assert_eq!(file_field_name(1, 2), "file2");
    }

    #[tokio::test]
    async fn test_upload_body_through_pipe() {
        let (pipe, stream) = utils::pipe(2);
        let multipart = MultipartWriter::new(pipe);
        let content_type = multipart.form_data_content_type();

        let sources = vec![
            UploadSource::from_bytes("one.txt", b"first file".to_vec()),
            UploadSource::from_bytes("two.txt", b"second file".to_vec()),
        ];
        let encoder = tokio::spawn(write_upload_body(
            multipart,
            upload_body(Some(b"{\"k\": 1}".to_vec()), sources),
            CancellationToken::new(),
        ));

        let body = drain(stream).await.unwrap();
        encoder.await.unwrap().unwrap();

        let parts = parse_form_data(&content_type, body).unwrap();
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["metadata", "file1", "file2"]);
        assert_eq!(parts[1].filename.as_deref(), Some("one.txt"));
        assert_eq!(&parts[2].data[..], b"second file");
    }

    #[tokio::test]
    async fn test_single_file_field_and_empty_metadata() {
        let (pipe, stream) = utils::pipe(4);
        let multipart = MultipartWriter::new(pipe);
        let content_type = multipart.form_data_content_type();

        let encoder = tokio::spawn(write_upload_body(
            multipart,
            upload_body(Some(Vec::new()), vec![UploadSource::from_bytes("only.dat", b"x".to_vec())]),
            CancellationToken::new(),
        ));

        let body = drain(stream).await.unwrap();
        encoder.await.unwrap().unwrap();

        let parts = parse_form_data(&content_type, body).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "file");
    }

    #[tokio::test]
    async fn test_open_failure_aborts_the_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let (pipe, stream) = utils::pipe(4);

        let encoder = tokio::spawn(write_upload_body(
            MultipartWriter::new(pipe),
            upload_body(None, vec![UploadSource::from_path(dir.path().join("missing.txt"))]),
            CancellationToken::new(),
        ));

        let err = drain(stream).await.unwrap_err();
        assert!(err.to_string().starts_with("open "));

        let err = encoder.await.unwrap().unwrap_err();
        assert!(matches!(err, TransferError::Open { .. }));
    }

    #[tokio::test]
    async fn test_dropped_reader_is_broken_pipe() {
        let (pipe, stream) = utils::pipe(1);
        drop(stream);

        let err = write_upload_body(
            MultipartWriter::new(pipe),
            upload_body(None, vec![UploadSource::from_bytes("a", vec![0u8; 1024])]),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_broken_pipe());
    }

    #[tokio::test]
    async fn test_progress_counts_only_file_bytes() {
        let (pipe, stream) = utils::pipe(4);
        let (tx, mut rx) = mpsc::channel(16);

        let body = UploadBody {
            progress: Some(tx),
            ..upload_body(Some(b"metadata is not counted".to_vec()), vec![
                UploadSource::from_bytes("a", vec![1u8; 100]),
                UploadSource::from_bytes("b", vec![2u8; 50]),
            ])
        };
        let encoder = tokio::spawn(write_upload_body(MultipartWriter::new(pipe), body, CancellationToken::new()));

        drain(stream).await.unwrap();
        encoder.await.unwrap().unwrap();

        let mut last = None;
        while let Some(v) = rx.recv().await {
            last = Some(v);
        }
        assert_eq!(last, Some(150));
    }
}
