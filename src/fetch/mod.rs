// src/fetch/mod.rs
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub mod document;

pub use document::parse_document;

/// One line of the source CSV, fields in document order.
pub type RawRow = Vec<String>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure or a non-2xx status from the source.
    #[error("source {url} unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body could not be split into consistent comma-delimited records.
    #[error("malformed document at record {record}: {source}")]
    MalformedDocument {
        record: usize,
        #[source]
        source: csv::Error,
    },
}

/// How the source client treats the server's certificate chain.
///
/// The CSV mirror is public and only ever read, so `AcceptInvalid` is allowed
/// for the source client. Nothing else in the crate builds a client from this.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CertificatePolicy {
    #[default]
    Verify,
    AcceptInvalid,
}

/// Build the HTTP client used to fetch the source document.
pub fn build_client(policy: CertificatePolicy, timeout: Duration) -> reqwest::Result<Client> {
    let builder = Client::builder().timeout(timeout);
    let builder = match policy {
        CertificatePolicy::Verify => builder,
        CertificatePolicy::AcceptInvalid => {
            debug!("source client accepts certificates that fail chain validation");
            builder.danger_accept_invalid_certs(true)
        }
    };
    builder.build()
}

/// GET `location` and split the body into raw CSV rows (header included).
#[tracing::instrument(level = "info", skip(client, location), fields(url = %location))]
pub async fn fetch(client: &Client, location: &Url) -> Result<Vec<RawRow>, FetchError> {
    let unreachable = |source: reqwest::Error| FetchError::Unreachable {
        url: location.to_string(),
        source,
    };

    let body = client
        .get(location.clone())
        .send()
        .await
        .map_err(unreachable)?
        .error_for_status()
        .map_err(unreachable)?
        .bytes()
        .await
        .map_err(unreachable)?;

    let rows = parse_document(&body)?;
    info!(bytes = body.len(), rows = rows.len(), "fetched document");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tracing_subscriber::{fmt, EnvFilter};

    fn init_logging() {
        let _ = fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    }

    /// Serve exactly one canned HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = sock.read(&mut buf).await;
            let resp = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
        });
        Url::parse(&format!("http://{}/series.csv", addr)).unwrap()
    }

    fn client() -> Client {
        build_client(CertificatePolicy::Verify, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_header_and_data_rows() {
        init_logging();
        let url = serve_once(
            "200 OK",
            "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\nHubei,China,30.9,112.3,1,2\n",
        )
        .await;

        let rows = fetch(&client(), &url).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][4], "1/22/20");
        assert_eq!(rows[1], vec!["Hubei", "China", "30.9", "112.3", "1", "2"]);
    }

    #[tokio::test]
    async fn non_success_status_is_unreachable() {
        init_logging();
        let url = serve_once("404 Not Found", "").await;

        let err = fetch(&client(), &url).await.unwrap_err();
        assert!(matches!(err, FetchError::Unreachable { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        init_logging();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{}/series.csv", addr)).unwrap();

        let err = fetch(&client(), &url).await.unwrap_err();
        assert!(matches!(err, FetchError::Unreachable { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn ragged_body_is_malformed() {
        init_logging();
        let url = serve_once("200 OK", "a,b,c,d,1/22/20\nx,y,1,2\n").await;

        let err = fetch(&client(), &url).await.unwrap_err();
        assert!(
            matches!(err, FetchError::MalformedDocument { record: 1, .. }),
            "{err:?}"
        );
    }

    #[test]
    fn relaxed_policy_still_builds_a_client() {
        assert!(build_client(CertificatePolicy::AcceptInvalid, Duration::from_secs(1)).is_ok());
    }
}
