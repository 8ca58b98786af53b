//! Mock server fixture shared by the integration tests.

use std::net::SocketAddr;

/// Start the mock server on a random port and return its base URL.
pub fn spawn_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr: SocketAddr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// A server that answers one connection with `head` and then stalls.
///
/// Returns the base URL and a receiver that fires once the client has
/// closed its side of the connection.
#[allow(dead_code)]
pub fn spawn_stalled_server(head: &'static str) -> (String, std::sync::mpsc::Receiver<()>) {
    use std::io::{Read, Write};
    use std::time::Duration;

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(10))).unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        socket.write_all(head.as_bytes()).unwrap();
        socket.flush().unwrap();

        // Only EOF from the client counts as a release.
        loop {
            match socket.read(&mut buf) {
                Ok(0) => {
                    let _ = closed_tx.send(());
                    return;
                }
                Ok(_) => continue,
                Err(_) => return,
            }
        }
    });

    (format!("http://{addr}"), closed_rx)
}
