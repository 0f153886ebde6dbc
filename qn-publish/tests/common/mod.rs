#![allow(dead_code)]

//! Loopback HTTP responder for exercising the Qiniu client without network.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the responder sends back for one connection.
pub struct Canned {
    pub status: u16,
    pub body: String,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// One request as seen on the wire.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request_line: String,
    pub head: String,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Bind a random local port. Returns the listener and its base URL.
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    (listener, base_url)
}

/// Serve `responses` in order, one per connection, on a random local port.
/// Returns the base URL and a handle yielding the recorded requests.
pub async fn serve(responses: Vec<Canned>) -> (String, JoinHandle<Vec<Recorded>>) {
    let (listener, base_url) = bind().await;
    (base_url, respond(listener, responses))
}

/// Serve `responses` on an already bound listener.
pub fn respond(listener: TcpListener, responses: Vec<Canned>) -> JoinHandle<Vec<Recorded>> {
    tokio::spawn(async move {
        let mut recorded = Vec::new();
        for canned in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            recorded.push(read_request(&mut stream).await);
            let reply = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                canned.status,
                reason(canned.status),
                canned.body.len(),
                canned.body
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        }
        recorded
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Unknown",
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn read_more(stream: &mut TcpStream, buf: &mut Vec<u8>) -> bool {
    let mut chunk = [0u8; 8192];
    let n = stream.read(&mut chunk).await.unwrap();
    buf.extend_from_slice(&chunk[..n]);
    n > 0
}

async fn read_request(stream: &mut TcpStream) -> Recorded {
    let mut buf = Vec::new();
    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if !read_more(stream, &mut buf).await {
            break buf.len();
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let request_line = head.lines().next().unwrap_or_default().to_string();
    let content_length = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse::<usize>().ok()
        } else {
            None
        }
    });
    let chunked = head
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked");

    let mut body = buf[header_end..].to_vec();
    if let Some(len) = content_length {
        while body.len() < len && read_more(stream, &mut body).await {}
    } else if chunked {
        while !body.ends_with(b"0\r\n\r\n") && read_more(stream, &mut body).await {}
    }

    Recorded {
        request_line,
        head,
        body,
    }
}

/// Accept one connection, read the request and never answer.
pub async fn stall() -> (String, JoinHandle<Recorded>) {
    let (listener, base_url) = bind().await;
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let recorded = read_request(&mut stream).await;
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        drop(stream);
        recorded
    });
    (base_url, handle)
}
