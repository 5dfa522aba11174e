//! Context assembly: the vault corpus turned into a bounded prompt block.
//!
//! | Tier | Source | Rendering |
//! |------|--------|-----------|
//! | 1. Anchor | Self README | Full, cut to fit |
//! | 2. Today | Today's daily note | Full, cut to fit |
//! | 3. Recent | Daily notes in the lookback window | Excerpt, newest first |
//! | 4. Categories | Focused first, then the rest | Full if focused, else excerpt |

pub mod assembler;

pub use assembler::{
    lane_context, AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler, IncludedDoc,
    Inclusion, TierStats,
};
