//! Transcript chunking and reassembly.
//!
//! Transcripts may exceed a single blob's practical size limit. The default
//! splitter here is line-oriented, matching JSONL transcripts: it never
//! splits in the middle of a line, so reassembly is loss-less including at
//! chunk boundaries.

/// Split `data` into chunks no larger than `max_chunk_bytes`, breaking only
/// at line boundaries (`\n`). A single line longer than `max_chunk_bytes`
/// is kept whole in its own oversized chunk rather than corrupted.
pub fn split_lines(data: &[u8], max_chunk_bytes: usize) -> Vec<Vec<u8>> {
    if data.len() <= max_chunk_bytes {
        return vec![data.to_vec()];
    }

    let mut chunks = Vec::new();
    let mut current = Vec::with_capacity(max_chunk_bytes);
    for line in split_keep_newline(data) {
        if !current.is_empty() && current.len() + line.len() > max_chunk_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Reassemble chunks produced by [`split_lines`] back into the original bytes.
pub fn reassemble(chunks: &[Vec<u8>]) -> Vec<u8> {
    chunks.concat()
}

fn split_keep_newline(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (index, byte) in data.iter().enumerate() {
        if *byte == b'\n' {
            lines.push(&data[start..=index]);
            start = index + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}
