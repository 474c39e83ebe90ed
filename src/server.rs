// TCP server (C9): accept loop, one task per connection, `\r\n\r\n`-framed
// request/response.
use std::sync::Arc;

use colored::Colorize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::protocol::handle_request;
use crate::state::ServerState;

const READ_BUFFER_SIZE: usize = 4096;
const FRAME_SEPARATOR: &str = "\r\n\r\n";

pub async fn run(bind_address: &str, state: Arc<ServerState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    println!("{} listening on {}", "[server]".bright_blue().bold(), bind_address);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("{} accept failed: {e}", "[server]".red().bold());
                continue;
            }
        };
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &state).await {
                eprintln!("{} connection {peer} closed with error: {e}", "[server]".yellow());
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, state: &ServerState) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut read_chunk = [0u8; READ_BUFFER_SIZE];

    loop {
        while let Some(frame_end) = find_frame_boundary(&buffer) {
            let request_bytes: Vec<u8> = buffer.drain(..frame_end + FRAME_SEPARATOR.len()).collect();
            let request = String::from_utf8_lossy(&request_bytes);
            let response = handle_request(state, &request);
            stream.write_all(response.as_bytes()).await?;
        }

        let n = stream.read(&mut read_chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&read_chunk[..n]);
    }
}

fn find_frame_boundary(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(FRAME_SEPARATOR.len())
        .position(|w| w == FRAME_SEPARATOR.as_bytes())
}
