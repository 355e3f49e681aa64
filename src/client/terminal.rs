//! Line-oriented terminal client
//!
//! Each stdin line is sent as one message; each relayed message is printed as
//! one line. `exit` or end of input leaves the chat.

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::ToSocketAddrs;

use crate::error::Result;
use crate::protocol::FrameCodec;

use super::connector::{ClientReader, ClientWriter, RelayClient};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Connect to `addr` and bridge stdin/stdout to the relay until the user quits
pub async fn run<A: ToSocketAddrs>(addr: A, codec: FrameCodec) -> Result<()> {
    let client = RelayClient::connect_with_codec(addr, codec).await?;
    write_stdout(&format!("*** connected to {}", client.peer_addr())).await?;

    let (mut reader, mut writer) = client.into_split();
    let mut stdin = BufReader::new(io::stdin());
    let mut input = String::new();

    loop {
        tokio::select! {
            message = reader.recv() => {
                if !handle_server_message(message?).await? {
                    break;
                }
            }
            bytes_read = stdin.read_line(&mut input) => {
                // read_line keeps partial input across cancellation; clear only whole lines
                let keep_going = handle_stdin_line(bytes_read?, &input, &mut writer).await?;
                input.clear();
                if !keep_going {
                    break;
                }
            }
        }
    }

    shutdown(&mut writer, reader).await;
    Ok(())
}

async fn handle_server_message(message: Option<bytes::Bytes>) -> Result<bool> {
    match message {
        Some(payload) => {
            write_stdout(&String::from_utf8_lossy(&payload)).await?;
            Ok(true)
        }
        None => {
            write_stdout("*** server closed the connection").await?;
            Ok(false)
        }
    }
}

async fn handle_stdin_line(bytes_read: usize, input: &str, writer: &mut ClientWriter) -> Result<bool> {
    if bytes_read == 0 {
        return Ok(false);
    }

    let text = input.trim_end_matches(LINE_ENDINGS);
    if text.is_empty() {
        return Ok(true);
    }

    if text.eq_ignore_ascii_case("exit") {
        write_stdout("*** closing connection").await?;
        return Ok(false);
    }

    writer.send(text).await?;
    Ok(true)
}

async fn shutdown(writer: &mut ClientWriter, reader: ClientReader) {
    if let Err(e) = writer.close().await {
        tracing::warn!(error = %e, "Failed to shut down connection cleanly");
    }
    drop(reader);
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
