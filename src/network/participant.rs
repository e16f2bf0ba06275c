//! Participants and Connection Tasks
//!
//! A participant is one seat's handle inside a session: identity, level, an
//! optional outbound channel and the receiving end of its command queue.
//! Human connections are served by a reader task and a writer task; a bot
//! has no connection and its generator plays the reader's role.

use std::fmt;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::network::protocol::ServerMessage;

/// Participant errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParticipantError {
    #[error("participant disconnected")]
    Disconnected,
}

/// Bot difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Map the menu choice `1..=3`.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Difficulty::Easy),
            2 => Some(Difficulty::Medium),
            3 => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Menu number.
    pub fn level(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }
}

/// Who sits in the seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantKind {
    /// A TCP connection
    Human,
    /// A server-side command generator
    Bot(Difficulty),
}

/// One seat of a session.
pub struct Participant {
    /// Identity token
    pub id: Uuid,
    /// Display name (profile key for humans)
    pub username: String,
    /// Level, refreshed after experience awards
    pub level: u32,
    /// Human or bot
    pub kind: ParticipantKind,
    outbound: Option<mpsc::Sender<ServerMessage>>,
    commands: mpsc::Receiver<String>,
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("level", &self.level)
            .field("kind", &self.kind)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Participant {
    /// Human seat fed by a connection.
    pub fn human(username: impl Into<String>, level: u32, connection: Connection) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            level,
            kind: ParticipantKind::Human,
            outbound: Some(connection.outbound),
            commands: connection.commands,
        }
    }

    /// Bot seat fed by a generator through `commands`.
    pub fn bot(difficulty: Difficulty, commands: mpsc::Receiver<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: format!("BotLv{}", difficulty.level()),
            level: 1,
            kind: ParticipantKind::Bot(difficulty),
            outbound: None,
            commands,
        }
    }

    /// Is this seat a bot?
    pub fn is_bot(&self) -> bool {
        matches!(self.kind, ParticipantKind::Bot(_))
    }

    /// Can the seat still receive messages? Bots are always reachable.
    pub fn is_connected(&self) -> bool {
        match &self.outbound {
            Some(tx) => !tx.is_closed(),
            None => self.is_bot(),
        }
    }

    /// Queue a message for the participant. A no-op for bots.
    pub async fn send(&self, message: ServerMessage) -> Result<(), ParticipantError> {
        match &self.outbound {
            Some(tx) => tx.send(message).await.map_err(|_| ParticipantError::Disconnected),
            None if self.is_bot() => Ok(()),
            None => Err(ParticipantError::Disconnected),
        }
    }

    /// Next command line; `None` once the source is gone.
    pub async fn recv_command(&mut self) -> Option<String> {
        self.commands.recv().await
    }

    /// Discard queued commands. Returns how many were dropped.
    pub fn drain_commands(&mut self) -> usize {
        let mut drained = 0;
        while self.commands.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

// =============================================================================
// CONNECTION TASKS
// =============================================================================

/// Channels of a live connection: messages out, command lines in.
pub struct Connection {
    pub outbound: mpsc::Sender<ServerMessage>,
    pub commands: mpsc::Receiver<String>,
}

/// Spawn the reader and writer tasks for a line-delimited text stream.
///
/// The reader forwards trimmed non-empty lines into a queue of depth
/// `queue_depth`, blocking when it is full, and exits on EOF, on a read
/// error or when the queue receiver is dropped. The writer exits on a write
/// failure, when the reader is gone, or when every outbound sender is dropped.
pub fn spawn_connection<R, W>(reader: R, writer: W, queue_depth: usize) -> Connection
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (commands_tx, commands_rx) = mpsc::channel(queue_depth);
    let (outbound_tx, outbound_rx) = mpsc::channel(queue_depth * 4);
    let (reader_done_tx, reader_done_rx) = oneshot::channel();

    tokio::spawn(read_commands(reader, commands_tx, reader_done_tx));
    tokio::spawn(write_messages(writer, outbound_rx, reader_done_rx));

    Connection {
        outbound: outbound_tx,
        commands: commands_rx,
    }
}

async fn read_commands<R>(reader: R, commands_tx: mpsc::Sender<String>, _reader_done: oneshot::Sender<()>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            _ = commands_tx.closed() => {
                trace!("Command queue closed, stopping reader");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if commands_tx.send(line.to_string()).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Connection closed by peer");
                    break;
                }
                Err(e) => {
                    debug!("Read error: {}", e);
                    break;
                }
            }
        }
    }
}

async fn write_messages<W>(
    mut writer: W,
    mut outbound_rx: mpsc::Receiver<ServerMessage>,
    mut reader_done: oneshot::Receiver<()>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;

            message = outbound_rx.recv() => {
                let Some(message) = message else { break };
                let text = format!("{}\n", message);
                if let Err(e) = writer.write_all(text.as_bytes()).await {
                    debug!("Write error: {}", e);
                    break;
                }
            }
            _ = &mut reader_done => break,
        }
    }
    let _ = writer.shutdown().await;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    fn connect() -> (Connection, tokio::io::DuplexStream) {
        let (server_side, client_side) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(server_side);
        (spawn_connection(read_half, write_half, 10), client_side)
    }

    #[tokio::test]
    async fn test_reader_forwards_trimmed_lines() {
        let (mut conn, mut client) = connect();
        client.write_all(b"pawn-L\r\n\n  knight-C \n").await.unwrap();

        assert_eq!(conn.commands.recv().await.as_deref(), Some("pawn-L"));
        assert_eq!(conn.commands.recv().await.as_deref(), Some("knight-C"));
    }

    #[tokio::test]
    async fn test_full_queue_blocks_reader_without_dropping() {
        let (mut conn, mut client) = connect();
        let script: String = (0..25).map(|i| format!("cmd-{}\n", i)).collect();
        client.write_all(script.as_bytes()).await.unwrap();

        // Let the reader fill the queue and park on the next send
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        for i in 0..25 {
            let expected = format!("cmd-{}", i);
            assert_eq!(conn.commands.recv().await.as_deref(), Some(expected.as_str()));
        }
    }

    #[tokio::test]
    async fn test_eof_closes_command_queue() {
        let (mut conn, client) = connect();
        drop(client);
        assert_eq!(conn.commands.recv().await, None);
    }

    #[tokio::test]
    async fn test_writer_renders_lines() {
        let (conn, mut client) = connect();
        conn.outbound.send(ServerMessage::ReplayPrompt).await.unwrap();
        conn.outbound.send(ServerMessage::Goodbye).await.unwrap();
        drop(conn);

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "Play again? (Y/N)\nThanks for playing! Goodbye!\n");
    }

    #[tokio::test]
    async fn test_participant_drain_and_disconnect() {
        let (conn, client) = connect();
        let mut participant = Participant::human("alice", 1, conn);
        assert!(participant.is_connected());

        drop(client);
        // Reader exits on EOF, the writer follows
        assert_eq!(participant.recv_command().await, None);
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while participant.is_connected() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            participant.send(ServerMessage::Goodbye).await,
            Err(ParticipantError::Disconnected)
        );
    }

    #[tokio::test]
    async fn test_bot_participant() {
        let (tx, rx) = mpsc::channel(10);
        let mut bot = Participant::bot(Difficulty::Hard, rx);
        assert_eq!(bot.username, "BotLv3");
        assert!(bot.is_connected());
        assert!(bot.send(ServerMessage::Waiting).await.is_ok());

        tx.send("pawn-L".into()).await.unwrap();
        tx.send("pawn-R".into()).await.unwrap();
        assert_eq!(bot.drain_commands(), 2);
    }

    #[test]
    fn test_difficulty_levels() {
        assert_eq!(Difficulty::from_level(2), Some(Difficulty::Medium));
        assert_eq!(Difficulty::from_level(0), None);
        assert_eq!(Difficulty::from_level(4), None);
        assert_eq!(Difficulty::Hard.level(), 3);
    }
}
