//! Property-based tests for the block index
//!
//! **Property 7: primary pieces never overlap on the source, every
//! duplicate piece overlaps a primary piece of equal or higher rank, and
//! every aligned source base keeps a primary path**
//! **Property 8: queries return exactly the overlapping bases**

use fast_hal::core::{BlockIndex, ChainBlock, ChainFile};
use fast_hal::Strand;
use proptest::prelude::*;
use std::collections::HashMap;

/// Blocks on chr1 from several chains with distinct scores
fn arb_blocks() -> impl Strategy<Value = Vec<ChainBlock>> {
    prop::collection::vec(
        (0usize..4, 0u64..5000, 1u64..500),
        1..60,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .map(|(chain, start, len)| ChainBlock {
                source_chrom: "chr1".to_string(),
                source_start: start,
                source_end: start + len,
                target_chrom: format!("t{}", chain),
                target_start: start,
                target_end: start + len,
                target_strand: Strand::Plus,
                score: 1000 - chain as u64 * 100,
                chain_index: chain,
            })
            .collect()
    })
}

fn build(blocks: Vec<ChainBlock>) -> BlockIndex {
    let mut source_chrom_sizes = HashMap::new();
    source_chrom_sizes.insert("chr1".to_string(), 10_000u64);
    BlockIndex::from_chain_data(ChainFile {
        blocks,
        source_chrom_sizes,
        target_chrom_sizes: HashMap::new(),
        chain_count: 4,
    })
}

fn overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 7: paralogy ranking**
    #[test]
    fn prop_primary_blocks_disjoint(blocks in arb_blocks()) {
        let index = build(blocks);
        let all = index.query("chr1", 0, 10_000);
        let primary: Vec<_> = all.iter().filter(|iv| !iv.val.duplicate).collect();
        let dupes: Vec<_> = all.iter().filter(|iv| iv.val.duplicate).collect();

        for (i, a) in primary.iter().enumerate() {
            for b in &primary[i + 1..] {
                prop_assert!(!overlaps((a.start, a.stop), (b.start, b.stop)));
            }
        }
        for d in &dupes {
            let shadowed = primary.iter().any(|p| {
                overlaps((p.start, p.stop), (d.start, d.stop)) && p.val.score >= d.val.score
            });
            prop_assert!(shadowed);
        }
        prop_assert_eq!(index.duplicate_count(), dupes.len());
    }

    /// A base aligned by any block is covered by a primary piece
    #[test]
    fn prop_aligned_bases_keep_primary_path(blocks in arb_blocks(), pos in 0u64..5500) {
        let aligned = blocks.iter().any(|b| b.source_start <= pos && pos < b.source_end);
        let index = build(blocks);
        let primary = index
            .query("chr1", pos, pos + 1)
            .iter()
            .filter(|iv| !iv.val.duplicate)
            .count();
        prop_assert_eq!(primary, usize::from(aligned));
    }

    /// The top-scoring chain never has duplicates
    #[test]
    fn prop_best_chain_primary(blocks in arb_blocks()) {
        let has_best_overlap = {
            let best: Vec<_> = blocks.iter().filter(|b| b.chain_index == 0).collect();
            best.iter().enumerate().any(|(i, a)| {
                best[i + 1..].iter().any(|b| overlaps((a.source_start, a.source_end), (b.source_start, b.source_end)))
            })
        };
        prop_assume!(!has_best_overlap);
        let index = build(blocks);
        for iv in index.query("chr1", 0, 10_000) {
            if iv.val.chain_index == 0 {
                prop_assert!(!iv.val.duplicate);
            }
        }
    }

    /// **Property 8: query completeness**
    ///
    /// Split pieces partition their blocks, so the bases a query reaches
    /// match a brute-force scan of the unsplit blocks.
    #[test]
    fn prop_query_matches_scan(blocks in arb_blocks(), start in 0u64..6000, len in 1u64..1000) {
        let end = start + len;
        let overlap = |s: u64, e: u64| e.min(end).saturating_sub(s.max(start));
        let expected: u64 = blocks.iter().map(|b| overlap(b.source_start, b.source_end)).sum();
        let index = build(blocks);
        let found: u64 = index.query("chr1", start, end).iter().map(|iv| overlap(iv.start, iv.stop)).sum();
        prop_assert_eq!(found, expected);
        let aliased: u64 = index.query("1", start, end).iter().map(|iv| overlap(iv.start, iv.stop)).sum();
        prop_assert_eq!(aliased, expected);
    }

    /// Target coordinates of plus-strand pieces keep the block's offset
    #[test]
    fn prop_pieces_keep_target_offset(blocks in arb_blocks()) {
        // arb_blocks aligns each block onto the same coordinates
        let index = build(blocks);
        for iv in index.query("chr1", 0, 10_000) {
            prop_assert_eq!((iv.val.target_start, iv.val.target_end), (iv.start, iv.stop));
        }
    }
}

#[test]
fn test_ties_break_by_chain_order() {
    let block = |chain: usize| ChainBlock {
        source_chrom: "chr1".to_string(),
        source_start: 10,
        source_end: 20,
        target_chrom: "chrT".to_string(),
        target_start: chain as u64 * 100,
        target_end: chain as u64 * 100 + 10,
        target_strand: Strand::Plus,
        score: 500,
        chain_index: chain,
    };
    let index = build(vec![block(1), block(0)]);
    let hits = index.query("chr1", 10, 20);
    let primary: Vec<_> = hits.iter().filter(|iv| !iv.val.duplicate).collect();
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].val.chain_index, 0);
}

#[test]
fn test_unknown_chrom_is_empty() {
    let index = build(Vec::new());
    assert!(index.query("chr1", 0, 100).is_empty());
    assert!(!index.has_chrom("chr1"));
}
