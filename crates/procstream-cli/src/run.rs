// Relay the terminal's stdio to a supervised command

use procstream::{
    InputSink, OutputSource, ProcessConfig, ProcessEvent, ProcessSupervisor, StdioStreams,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{CliError, CliResult};

const INPUT_CHUNK: usize = 8 * 1024;

/// Run `config` to completion and return its exit code
///
/// Ctrl-C destroys the command; its exit code is still reported.
pub async fn run(config: ProcessConfig) -> CliResult<i32> {
    let command = config.command.clone();
    let (handle, mut events) = ProcessSupervisor::spawn(config)?;
    info!(pid = %handle.pid(), command = %command, "Supervising command");

    let StdioStreams {
        stdin,
        stdout,
        stderr,
    } = match events.recv().await {
        Some(ProcessEvent::Started(streams)) => streams,
        _ => return Err(CliError::NoExitCode),
    };

    let input = tokio::spawn(relay_input(tokio::io::stdin(), stdin));
    let output = tokio::spawn(relay_output(stdout, tokio::io::stdout()));
    let errors = tokio::spawn(relay_output(stderr, tokio::io::stderr()));

    let exit_code = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ProcessEvent::Exited { exit_code }) => break Some(exit_code),
                Some(ProcessEvent::Started(_)) => continue,
                None => break None,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, destroying command");
                handle.destroy();
            }
        }
    };

    // Both sources have terminated by now; let the relays flush what they hold
    for relay in [output, errors] {
        match relay.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Output relay failed"),
            Err(e) => warn!(error = %e, "Output relay task failed"),
        }
    }
    input.abort();
    handle.join().await;

    exit_code.ok_or(CliError::NoExitCode)
}

/// Copy chunks from a source to a writer until the source terminates
pub async fn relay_output<W>(mut source: OutputSource, mut writer: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = source.next_chunk().await {
        match chunk {
            Ok(bytes) => {
                writer.write_all(&bytes).await?;
                writer.flush().await?;
            }
            Err(e) => {
                warn!(stream = %source.kind(), error = %e, "Output stream ended early");
                break;
            }
        }
    }
    Ok(())
}

/// Copy a reader into the command's stdin, closing it at end of input
pub async fn relay_input<R>(mut reader: R, sink: InputSink)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; INPUT_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if sink.send(buf[..n].to_vec()).await.is_err() {
                    debug!("Command stopped reading stdin");
                    return;
                }
            }
            Err(e) => {
                debug!(error = %e, "Failed to read input");
                break;
            }
        }
    }
    sink.close();
}
