use serde::{Deserialize, Serialize};

/// Server-side chunked upload session persisted across process restarts
///
/// A resumed upload reuses `upload_id` and only sends the chunks missing from
/// `completed_chunks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadSession {
    pub media_id: String,
    pub upload_id: String,
    pub total_chunks: u32,
    pub chunk_size: u64,
    pub completed_chunks: Vec<u32>,
    pub created_at: i64,
}

impl UploadSession {
    pub fn is_chunk_done(&self, index: u32) -> bool {
        self.completed_chunks.contains(&index)
    }

    pub fn missing_chunks(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|i| !self.is_chunk_done(*i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_chunks() {
        let session = UploadSession {
            media_id: "m".into(),
            upload_id: "u".into(),
            total_chunks: 4,
            chunk_size: 10,
            completed_chunks: vec![0, 2],
            created_at: 0,
        };
        assert_eq!(session.missing_chunks(), vec![1, 3]);
    }
}
