use std::{
    io::{BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    thread::JoinHandle,
};

/// Loopback HTTP server answering a fixed sequence of response bodies.
///
/// Serves exactly one connection per body, then exits.
pub(crate) struct Collector {
    base_url: String,
    join_handle: JoinHandle<Vec<String>>,
}

impl Collector {
    pub(crate) fn start(bodies: &[&str]) -> Collector {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let bodies: Vec<String> = bodies.iter().map(|b| b.to_string()).collect();

        let join_handle = std::thread::spawn(move || {
            let mut requests = Vec::new();
            for body in bodies {
                let (stream, _) = listener.accept().unwrap();
                requests.push(serve(stream, &body));
            }
            requests
        });

        Collector {
            base_url,
            join_handle,
        }
    }

    /// A base URL nothing listens on.
    pub(crate) fn closed_base_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Wait for all responses to be served and return the requested paths.
    pub(crate) fn requests(self) -> Vec<String> {
        self.join_handle.join().unwrap()
    }
}

fn serve(stream: TcpStream, body: &str) -> String {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).unwrap();
        if header.trim().is_empty() {
            break;
        }
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).unwrap();
    stream.flush().unwrap();

    request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_owned()
}
