//! File-transfer chunking helpers.
//!
//! A transfer is a Metadata frame, `total_chunks` Chunk frames carrying
//! base64 file data, and an End frame, all grouped by one `file_id`. The
//! relay never reassembles; splitting happens on the sending client and
//! reassembly on the receiving one, so both directions live here.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use uuid::Uuid;

use crate::constants::FILE_CHUNK_SIZE;
use crate::error::ProtocolError;
use crate::protocol::{Message, MessageKind};

/// Number of chunks a file of `file_size` bytes splits into.
///
/// Always at least 1: a zero-byte file still travels as one empty chunk.
pub fn chunk_count(file_size: u64) -> u32 {
    let chunks = file_size.div_ceil(FILE_CHUNK_SIZE as u64);
    chunks.max(1) as u32
}

/// Split raw file bytes into chunk-sized slices, at least one.
pub fn split_chunks(data: &[u8]) -> Vec<&[u8]> {
    if data.is_empty() {
        return vec![&[]];
    }
    data.chunks(FILE_CHUNK_SIZE).collect()
}

/// Rebuild the original bytes from `(chunk_index, data)` pairs received in
/// any order.
pub fn reassemble(mut chunks: Vec<(u32, Vec<u8>)>) -> Vec<u8> {
    chunks.sort_by_key(|(index, _)| *index);
    let mut out = Vec::with_capacity(chunks.iter().map(|(_, d)| d.len()).sum());
    for (_, data) in chunks {
        out.extend_from_slice(&data);
    }
    out
}

/// Decode the base64 payload of one Chunk frame.
pub fn decode_chunk(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload = message.file_data.as_deref().unwrap_or("");
    BASE64.decode(payload).map_err(|_| ProtocolError::ChunkDecode)
}

/// The Metadata frame announcing a transfer.
pub fn transfer_metadata(
    file_id: Uuid,
    file_name: &str,
    file_size: u64,
    mime_type: &str,
) -> Message {
    let mut msg = Message::new(MessageKind::FileTransferMetadata);
    msg.file_id = file_id;
    msg.file_name = Some(file_name.to_string());
    msg.file_size = file_size;
    msg.file_mime_type = Some(mime_type.to_string());
    msg.total_chunks = chunk_count(file_size);
    msg
}

/// One Chunk frame carrying `data` at `chunk_index`.
pub fn transfer_chunk(file_id: Uuid, chunk_index: u32, total_chunks: u32, data: &[u8]) -> Message {
    let mut msg = Message::new(MessageKind::FileTransferChunk);
    msg.file_id = file_id;
    msg.chunk_index = chunk_index;
    msg.total_chunks = total_chunks;
    msg.file_data = Some(BASE64.encode(data));
    msg
}

/// The End frame closing a transfer.
pub fn transfer_end(file_id: Uuid, file_name: &str, file_size: u64, mime_type: &str) -> Message {
    let mut msg = Message::new(MessageKind::FileTransferEnd);
    msg.file_id = file_id;
    msg.file_name = Some(file_name.to_string());
    msg.file_size = file_size;
    msg.file_mime_type = Some(mime_type.to_string());
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count_boundaries() {
        assert_eq!(chunk_count(0), 1);
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(FILE_CHUNK_SIZE as u64), 1);
        assert_eq!(chunk_count(FILE_CHUNK_SIZE as u64 + 1), 2);
    }

    #[test]
    fn test_130kb_file_splits_into_three_chunks() {
        let size = 130 * 1024;
        let data = vec![0xA5u8; size];

        assert_eq!(chunk_count(size as u64), 3);

        let chunks = split_chunks(&data);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), FILE_CHUNK_SIZE);
        assert_eq!(chunks[1].len(), FILE_CHUNK_SIZE);
        assert_eq!(chunks[2].len(), size - 2 * FILE_CHUNK_SIZE);
    }

    #[test]
    fn test_zero_byte_file_is_one_empty_chunk() {
        let chunks = split_chunks(&[]);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_empty());
    }

    #[test]
    fn test_reassemble_out_of_order() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let file_id = Uuid::new_v4();
        let chunks = split_chunks(&data);
        let total = chunks.len() as u32;

        // Encode to wire messages, then decode in reverse order.
        let mut received: Vec<(u32, Vec<u8>)> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate().rev() {
            let msg = transfer_chunk(file_id, i as u32, total, chunk);
            received.push((msg.chunk_index, decode_chunk(&msg).unwrap()));
        }

        assert_eq!(reassemble(received), data);
    }

    #[test]
    fn test_metadata_carries_chunk_count() {
        let msg = transfer_metadata(Uuid::new_v4(), "big.bin", 130 * 1024, "application/octet-stream");
        assert_eq!(msg.kind, MessageKind::FileTransferMetadata);
        assert_eq!(msg.total_chunks, 3);
        assert_eq!(msg.file_name.as_deref(), Some("big.bin"));
    }

    #[test]
    fn test_end_frame_shape() {
        let id = Uuid::new_v4();
        let msg = transfer_end(id, "big.bin", 42, "application/octet-stream");
        assert_eq!(msg.kind, MessageKind::FileTransferEnd);
        assert_eq!(msg.file_id, id);
        assert_eq!(msg.file_size, 42);
    }
}
