//! Minimal HTTP responder for exercising network code in tests.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One canned HTTP response.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl CannedResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }
}

/// A running responder; requests are recorded as raw text.
pub struct TestServer {
    pub url: String,
    pub requests: Arc<Mutex<Vec<String>>>,
}

/// Serve `responses` in order, repeating the last one once exhausted.
pub async fn serve(responses: Vec<CannedResponse>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    tokio::spawn(async move {
        let mut served = 0usize;
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let response = responses
                .get(served)
                .or_else(|| responses.last())
                .cloned()
                .unwrap_or_else(|| CannedResponse::new(404, None, Vec::new()));
            served += 1;
            let recorded = recorded.clone();
            tokio::spawn(async move {
                handle(stream, response, recorded).await;
            });
        }
    });

    TestServer { url, requests }
}

async fn handle(mut stream: TcpStream, response: CannedResponse, recorded: Arc<Mutex<Vec<String>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    recorded
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&buf).to_string());

    let mut out = format!("HTTP/1.1 {} Canned\r\n", response.status);
    if let Some(ct) = &response.content_type {
        out.push_str(&format!("Content-Type: {}\r\n", ct));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.body.len()
    ));

    let _ = stream.write_all(out.as_bytes()).await;
    let _ = stream.write_all(&response.body).await;
    let _ = stream.shutdown().await;
}
