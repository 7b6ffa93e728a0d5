//! A one-shot HTTP/1.1 listener that replays canned responses and records
//! what the client sent.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub struct Exchange {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Exchange {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub struct MockServer {
    base_url: String,
    handle: JoinHandle<Vec<Exchange>>,
}

impl MockServer {
    /// Serves exactly one connection per `(status, body)` pair, in order.
    pub fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut exchanges = Vec::new();
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                exchanges.push(read_request(&mut reader));

                let mut stream = stream;
                write!(
                    stream,
                    "HTTP/1.1 {status} Mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
                stream.flush().unwrap();
            }
            exchanges
        });
        Self { base_url, handle }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn finish(self) -> Vec<Exchange> {
        self.handle.join().unwrap()
    }
}

fn read_request(reader: &mut impl BufRead) -> Exchange {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).unwrap();

    Exchange {
        request_line: request_line.trim_end().to_string(),
        headers,
        body,
    }
}
