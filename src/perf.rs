//! Chunk encoding across cores.
//!
//! Every content entry is serialized and compressed independently, so the
//! work fans out cleanly.  With the `parallel` feature the entries go through
//! Rayon; without it, or when the caller asks for sequential encoding, they
//! are encoded in a plain loop.  Either way the output order is the input
//! order, which is the on-disk order.

use crate::chunk::{encode_chunk, EncodedChunk};
use crate::codec::Codec;
use crate::document::ContentEntry;
use crate::error::Result;

/// Encode `entries` into chunks, dropping entries with no wire form.
///
/// The first error wins; the rest of the batch is abandoned.
pub fn encode_chunks(
    entries:  &[(&str, &ContentEntry)],
    codec:    &dyn Codec,
    parallel: bool,
) -> Result<Vec<EncodedChunk>> {
    #[cfg(feature = "parallel")]
    {
        if parallel && entries.len() > 1 {
            use rayon::prelude::*;

            let results: Vec<Result<Option<EncodedChunk>>> = entries
                .par_iter()
                .map(|(content_type, entry)| encode_chunk(content_type, entry, codec))
                .collect();

            let mut out = Vec::with_capacity(entries.len());
            for r in results {
                out.extend(r?);
            }
            return Ok(out);
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    let mut out = Vec::with_capacity(entries.len());
    for (content_type, entry) in entries {
        out.extend(encode_chunk(content_type, entry, codec)?);
    }
    Ok(out)
}
