/*!
 * Splitting a structural unit into backend-sized chunks.
 *
 * The skeleton is always its own chunk. Members are packed greedily, in
 * order: a member joins the current chunk when the joined text still fits,
 * otherwise the current chunk is closed and the member starts a new one. A
 * member too large on its own still becomes a single chunk.
 */

use crate::backends::Backend;
use crate::source::StructuralUnit;

/// Separator placed between members of one chunk
pub const MEMBER_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Skeleton,
    Members,
}

/// Text submitted as one backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub text: String,
    /// Size in the backend's own units
    pub size: usize,
    /// Number of members packed into the chunk (0 for the skeleton)
    pub member_count: usize,
}

/// Packs members according to a backend's capacity
pub struct Chunker<'a> {
    backend: &'a dyn Backend,
}

impl<'a> Chunker<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Skeleton chunk followed by the member chunks
    pub fn chunk(&self, unit: &StructuralUnit) -> Vec<Chunk> {
        let mut chunks = vec![Chunk {
            kind: ChunkKind::Skeleton,
            text: unit.skeleton().to_string(),
            size: self.backend.count_tokens(unit.skeleton()),
            member_count: 0,
        }];
        chunks.extend(self.chunk_members(unit.members()));
        chunks
    }

    /// Greedy in-order packing; fit is checked on the tentatively joined text
    pub fn chunk_members(&self, members: &[String]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut count = 0;

        for member in members {
            if count == 0 {
                buffer.push_str(member);
                count = 1;
                continue;
            }

            let candidate = format!("{}{}{}", buffer, MEMBER_SEPARATOR, member);
            if self.backend.fits(&candidate) {
                buffer = candidate;
                count += 1;
            } else {
                chunks.push(self.members_chunk(std::mem::take(&mut buffer), count));
                buffer.push_str(member);
                count = 1;
            }
        }

        if count > 0 {
            chunks.push(self.members_chunk(buffer, count));
        }

        chunks
    }

    fn members_chunk(&self, text: String, member_count: usize) -> Chunk {
        Chunk {
            kind: ChunkKind::Members,
            size: self.backend.count_tokens(&text),
            text,
            member_count,
        }
    }
}
