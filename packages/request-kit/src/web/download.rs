use std::path::Path;

use actix_web::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use actix_web::HttpResponse;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::error;

use crate::error::WebError;

const OCTET_STREAM: &str = "application/octet-stream";

/// Response streaming the bytes of `path`.
///
/// With `download_name`, the response asks the client to save it as an
/// attachment under that name. With `delete`, the file is removed once it
/// has been opened, whether or not the open succeeded; a failed removal is
/// the error returned. The open handle keeps the contents readable while
/// the body streams.
pub async fn file_response(
    path: &Path,
    download_name: Option<&str>,
    delete: bool,
) -> Result<HttpResponse, WebError> {
    let opened = File::open(path).await;

    if delete {
        tokio::fs::remove_file(path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Could not delete file after download");
            WebError::Io(e)
        })?;
    }

    let file = opened.map_err(|e| {
        error!(path = %path.display(), error = %e, "Could not open file for download");
        WebError::Io(e)
    })?;

    let mut builder = HttpResponse::Ok();
    builder.insert_header((CONTENT_TYPE, OCTET_STREAM));
    if let Some(name) = download_name {
        builder.insert_header((CONTENT_DISPOSITION, attachment(name)));
    }
    Ok(builder.streaming(ReaderStream::new(file)))
}

fn attachment(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

#[cfg(test)]
mod tests {
    use actix_web::body::{to_bytes, BodySize, MessageBody};

    use super::*;

    #[test]
    fn test_attachment_header_escapes_quotes() {
        assert_eq!(attachment("report.csv"), "attachment; filename=\"report.csv\"");
        assert_eq!(attachment("a\"b.csv"), "attachment; filename=\"a_b.csv\"");
    }

    #[actix_web::test]
    async fn test_download_sets_disposition_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"payload").unwrap();

        let resp = file_response(&path, Some("informe.bin"), false).await.unwrap();
        assert_eq!(
            resp.headers().get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"informe.bin\""
        );
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), OCTET_STREAM);
        assert!(path.exists());

        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"payload");
    }

    #[actix_web::test]
    async fn test_delete_removes_file_and_still_streams_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp.txt");
        std::fs::write(&path, b"x").unwrap();

        let resp = file_response(&path, None, true).await.unwrap();
        assert!(resp.headers().get(CONTENT_DISPOSITION).is_none());
        assert!(!path.exists());

        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"x");
    }

    #[actix_web::test]
    async fn test_large_file_is_streamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let contents = vec![7u8; 8 * 1024 * 1024];
        std::fs::write(&path, &contents).unwrap();

        let resp = file_response(&path, Some("big.bin"), false).await.unwrap();
        assert!(matches!(resp.body().size(), BodySize::Stream));

        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(body.len(), contents.len());
    }

    #[actix_web::test]
    async fn test_missing_file_with_delete_reports_removal_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");

        let err = file_response(&path, None, true).await.unwrap_err();
        match err {
            WebError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected Io error, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        let err = file_response(&path, None, false).await.unwrap_err();
        assert!(matches!(err, WebError::Io(_)));
    }
}
