//! Async frame I/O
//!
//! [`FrameReader`] and [`FrameWriter`] move whole frames between a byte
//! stream and [`Message`](crate::messages::Message) values. The reader
//! drains the sub-chunk streams appended after each frame before returning,
//! so the next read always starts on a frame boundary.

mod reader;
mod writer;

pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EncodeOptions, LobValue, TypeRegistry};
    use crate::error::Error;
    use crate::messages::{Message, ResultsMessage};
    use crate::row::{Row, Value};
    use tokio::io::AsyncWriteExt;

    fn lob_results() -> Message {
        let rows = vec![Row::new(vec![
            Value::Lob(LobValue::clob("é".repeat(40_000))),
            Value::Long(9),
            Value::Lob(LobValue::blob(vec![1u8, 2, 3])),
        ])];
        Message::Results(ResultsMessage::batch(1, rows, true))
    }

    #[tokio::test]
    async fn test_frames_in_sequence() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client, EncodeOptions::default());
        let mut reader = FrameReader::new(server, TypeRegistry::new(), 1 << 20);

        let first = lob_results();
        let second = Message::Results(ResultsMessage::batch(2, vec![], true));
        let (w, r) = tokio::join!(
            async {
                writer.write_message(&first).await?;
                writer.write_message(&second).await
            },
            async {
                let a = reader.read_message().await?;
                let b = reader.read_message().await?;
                Ok::<_, Error>((a, b))
            }
        );
        w.unwrap();
        let (a, b) = r.unwrap();
        assert_eq!(a, first);
        assert_eq!(b, second);
    }

    #[tokio::test]
    async fn test_eof_is_connection_lost() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = FrameReader::new(server, TypeRegistry::new(), 1024);
        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_before_read() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(&[0, 1, 0, 0]).await.unwrap();
        let mut reader = FrameReader::new(server, TypeRegistry::new(), 1024);
        assert!(matches!(
            reader.read_message().await,
            Err(Error::FrameTooLarge { size: 65536, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_appended_stream_over_limit_rejected() {
        let rows = vec![Row::new(vec![Value::Lob(LobValue::blob(vec![0u8; 200_000]))])];
        let message = Message::Results(ResultsMessage::batch(1, rows, true));
        let frame = crate::codec::encode(&message).unwrap();

        let (mut client, server) = tokio::io::duplex(1 << 20);
        let writer = tokio::spawn(async move {
            let _ = client.write_all(&frame).await;
        });
        let mut reader = FrameReader::new(server, TypeRegistry::new(), 1024);
        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { max: 1024, .. }));
        assert!(err.is_fatal());
        drop(reader);
        let _ = writer.await;
    }

    #[tokio::test]
    async fn test_truncated_stream_is_connection_lost() {
        let frame = crate::codec::encode(&lob_results()).unwrap();
        let (mut client, server) = tokio::io::duplex(1 << 20);
        client.write_all(&frame[..frame.len() - 10]).await.unwrap();
        drop(client);
        let mut reader = FrameReader::new(server, TypeRegistry::new(), 1 << 20);
        assert!(matches!(
            reader.read_message().await,
            Err(Error::ConnectionLost(_))
        ));
    }
}
