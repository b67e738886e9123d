//! Interval index of aligned blocks
//!
//! Uses rust-lapper for O(log n + k) queries per source sequence. Each
//! block is ranked as primary or duplicate when the index is built: blocks
//! are visited by descending chain score, and the part of a block whose
//! source range overlaps an already-accepted primary block becomes a
//! duplicate (paralogous) piece. The rest of the block stays primary.

use crate::core::chain::{parse_chain_file, ChainBlock, ChainFile, ChainParseError};
use crate::core::mapper::{calculate_target_coords, Strand};
use log::debug;
use rayon::prelude::*;
use rust_lapper::{Interval, Lapper};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Target side of an aligned block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockValue {
    pub target_chrom: String,
    /// Forward-strand start on the target sequence
    pub target_start: u64,
    pub target_end: u64,
    pub target_strand: Strand,
    pub score: u64,
    pub chain_index: usize,
    /// Covered by a higher-ranked block on the source
    pub duplicate: bool,
}

pub type BlockInterval = Interval<u64, BlockValue>;

/// Blocks of one chain file keyed by source sequence
pub struct BlockIndex {
    maps: HashMap<String, Lapper<u64, BlockValue>>,
    pub source_sizes: HashMap<String, u64>,
    pub target_sizes: HashMap<String, u64>,
    /// Normalized name -> name used in the chain file
    chrom_aliases: HashMap<String, String>,
}

impl BlockIndex {
    pub fn from_chain_file<P: AsRef<Path>>(path: P) -> Result<Self, ChainParseError> {
        Ok(Self::from_chain_data(parse_chain_file(path.as_ref())?))
    }

    pub fn from_chain_data(chain_file: ChainFile) -> Self {
        let mut blocks_by_chrom: HashMap<String, Vec<ChainBlock>> = HashMap::new();
        for block in chain_file.blocks {
            blocks_by_chrom
                .entry(block.source_chrom.clone())
                .or_default()
                .push(block);
        }

        let chrom_aliases = blocks_by_chrom
            .keys()
            .map(|chrom| (normalize_chrom_key(chrom), chrom.clone()))
            .collect();

        let maps: HashMap<String, Lapper<u64, BlockValue>> = blocks_by_chrom
            .into_par_iter()
            .map(|(chrom, blocks)| {
                let intervals = rank_blocks(blocks);
                (chrom, Lapper::new(intervals))
            })
            .collect();

        debug!(
            "Indexed {} blocks over {} source sequences",
            maps.values().map(|l| l.len()).sum::<usize>(),
            maps.len()
        );

        Self {
            maps,
            source_sizes: chain_file.source_chrom_sizes,
            target_sizes: chain_file.target_chrom_sizes,
            chrom_aliases,
        }
    }

    /// Blocks overlapping `[start, end)` in source order
    ///
    /// Handles chromosome name variants (chr1, 1, CHR1).
    pub fn query(&self, chrom: &str, start: u64, end: u64) -> Vec<&BlockInterval> {
        match self.find_lapper(chrom) {
            Some(l) => l.find(start, end).collect(),
            None => vec![],
        }
    }

    fn find_lapper(&self, chrom: &str) -> Option<&Lapper<u64, BlockValue>> {
        if let Some(l) = self.maps.get(chrom) {
            return Some(l);
        }
        self.chrom_aliases
            .get(&normalize_chrom_key(chrom))
            .and_then(|original| self.maps.get(original))
    }

    /// Name the chain file uses for a sequence
    pub fn canonical_chrom(&self, chrom: &str) -> Option<&str> {
        if let Some((key, _)) = self.maps.get_key_value(chrom) {
            return Some(key.as_str());
        }
        self.chrom_aliases
            .get(&normalize_chrom_key(chrom))
            .map(|s| s.as_str())
    }

    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.find_lapper(chrom).is_some()
    }

    pub fn source_chroms(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(|s| s.as_str())
    }

    pub fn interval_count(&self, chrom: &str) -> usize {
        self.find_lapper(chrom).map(|l| l.len()).unwrap_or(0)
    }

    pub fn total_intervals(&self) -> usize {
        self.maps.values().map(|l| l.len()).sum()
    }

    pub fn duplicate_count(&self) -> usize {
        self.maps
            .values()
            .flat_map(|l| l.iter())
            .filter(|iv| iv.val.duplicate)
            .count()
    }
}

/// Rank the blocks of one source sequence
///
/// A block is split at the boundaries of higher-ranked primary blocks: the
/// pieces already covered become duplicates, the rest stay primary.
fn rank_blocks(mut blocks: Vec<ChainBlock>) -> Vec<BlockInterval> {
    blocks.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.chain_index.cmp(&b.chain_index))
            .then(a.source_start.cmp(&b.source_start))
    });

    // Accepted primary ranges, non-overlapping: start -> end
    let mut primary: BTreeMap<u64, u64> = BTreeMap::new();
    let mut intervals = Vec::with_capacity(blocks.len());
    for block in blocks {
        let whole = BlockValue {
            target_chrom: block.target_chrom,
            target_start: block.target_start,
            target_end: block.target_end,
            target_strand: block.target_strand,
            score: block.score,
            chain_index: block.chain_index,
            duplicate: false,
        };
        let pieces = split_at_primary(&primary, block.source_start, block.source_end);
        for (start, stop, duplicate) in pieces {
            if !duplicate {
                primary.insert(start, stop);
            }
            let (target_start, target_end) =
                calculate_target_coords(&whole, start - block.source_start, stop - start);
            intervals.push(Interval {
                start,
                stop,
                val: BlockValue {
                    target_start,
                    target_end,
                    duplicate,
                    ..whole.clone()
                },
            });
        }
    }
    intervals
}

/// `[start, end)` cut into `(start, stop, covered)` pieces against `primary`
fn split_at_primary(primary: &BTreeMap<u64, u64>, start: u64, end: u64) -> Vec<(u64, u64, bool)> {
    let before = primary
        .range(..start)
        .next_back()
        .filter(|(_, &stop)| stop > start);
    let mut pieces = Vec::new();
    let mut cursor = start;
    for (&p_start, &p_stop) in before.into_iter().chain(primary.range(start..end)) {
        if p_start > cursor {
            pieces.push((cursor, p_start, false));
        }
        let covered_end = p_stop.min(end);
        pieces.push((cursor.max(p_start), covered_end, true));
        cursor = covered_end;
    }
    if cursor < end {
        pieces.push((cursor, end, false));
    }
    pieces
}

/// Lowercase, without a leading `chr`
pub(crate) fn normalize_chrom_key(chrom: &str) -> String {
    let lower = chrom.to_lowercase();
    match lower.strip_prefix("chr") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chain::parse_chain_bytes;

    fn create_test_index() -> BlockIndex {
        let chain_data = b"\
chain 1000 chr1 1000 + 100 500 chr1 1000 + 100 500 1
100 50 50
100 50 50
100

chain 500 chr2 2000 + 0 200 chr2 2000 + 0 200 2
100 50 50
50
";
        BlockIndex::from_chain_data(parse_chain_bytes(chain_data).unwrap())
    }

    fn duplicated_index() -> BlockIndex {
        // chrS:100-200 aligns to chrA (score 900) and chrB (score 300);
        // the second chain also covers chrS:200-250 alone
        let chain_data = b"\
chain 300 chrS 1000 + 100 250 chrB 1000 + 0 150 2
150

chain 900 chrS 1000 + 100 200 chrA 1000 + 500 600 1
100
";
        BlockIndex::from_chain_data(parse_chain_bytes(chain_data).unwrap())
    }

    #[test]
    fn test_index_creation() {
        let index = create_test_index();
        assert!(index.has_chrom("chr1"));
        assert!(index.has_chrom("chr2"));
        assert!(!index.has_chrom("chr3"));
        assert_eq!(index.total_intervals(), 5);
        assert_eq!(index.duplicate_count(), 0);
    }

    #[test]
    fn test_query_basic() {
        let index = create_test_index();
        let results = index.query("chr1", 150, 160);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].val.target_start, 100);
        assert_eq!(results[0].val.target_end, 200);
        assert!(index.query("chr1", 50, 60).is_empty());
        assert_eq!(index.query("chr1", 100, 500).len(), 3);
    }

    #[test]
    fn test_chrom_name_variants() {
        let index = create_test_index();
        assert!(index.has_chrom("1"));
        assert!(index.has_chrom("CHR1"));
        assert!(index.has_chrom("Chr1"));
        assert_eq!(index.query("1", 150, 160).len(), 1);
        assert_eq!(index.canonical_chrom("1"), Some("chr1"));
        assert_eq!(index.canonical_chrom("chr3"), None);
    }

    #[test]
    fn test_interval_count() {
        let index = create_test_index();
        assert_eq!(index.interval_count("chr1"), 3);
        assert_eq!(index.interval_count("chr2"), 2);
        assert_eq!(index.interval_count("chr3"), 0);
        let mut chroms: Vec<&str> = index.source_chroms().collect();
        chroms.sort();
        assert_eq!(chroms, vec!["chr1", "chr2"]);
    }

    #[test]
    fn test_higher_score_is_primary() {
        let index = duplicated_index();
        let hits = index.query("chrS", 120, 130);
        assert_eq!(hits.len(), 2);

        let primary: Vec<_> = hits.iter().filter(|iv| !iv.val.duplicate).collect();
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].val.target_chrom, "chrA");
        assert_eq!(index.duplicate_count(), 1);
    }

    #[test]
    fn test_partial_overlap_splits_block() {
        let index = duplicated_index();
        assert_eq!(index.interval_count("chrS"), 3);
        assert_eq!(index.duplicate_count(), 1);

        let hits = index.query("chrS", 220, 230);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].val.target_chrom, "chrB");
        assert!(!hits[0].val.duplicate);
        assert_eq!((hits[0].start, hits[0].stop), (200, 250));
        assert_eq!((hits[0].val.target_start, hits[0].val.target_end), (100, 150));
    }

    #[test]
    fn test_split_minus_strand_piece() {
        let chain_data = b"\
chain 900 chrS 1000 + 0 50 chrA 1000 + 0 50 1
50

chain 100 chrS 1000 + 0 100 chrB 1000 - 0 100 2
100
";
        let index = BlockIndex::from_chain_data(parse_chain_bytes(chain_data).unwrap());
        let hits = index.query("chrS", 60, 70);
        assert_eq!(hits.len(), 1);
        assert!(!hits[0].val.duplicate);
        // chrB minus block covers forward 900..1000; source 50..100 maps to 900..950
        assert_eq!((hits[0].val.target_start, hits[0].val.target_end), (900, 950));
    }

    #[test]
    fn test_split_at_primary_pieces() {
        let mut primary = BTreeMap::new();
        primary.insert(10, 20);
        primary.insert(30, 40);
        assert_eq!(
            split_at_primary(&primary, 15, 50),
            vec![(15, 20, true), (20, 30, false), (30, 40, true), (40, 50, false)]
        );
        assert_eq!(split_at_primary(&primary, 0, 5), vec![(0, 5, false)]);
        assert_eq!(split_at_primary(&primary, 12, 18), vec![(12, 18, true)]);
    }

    #[test]
    fn test_from_chain_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("test.chain");
        std::fs::write(&path, "chain 100 chr1 100 + 0 10 chr2 100 + 0 10 1\n10\n").unwrap();
        let index = BlockIndex::from_chain_file(&path).unwrap();
        assert_eq!(index.total_intervals(), 1);
        assert!(BlockIndex::from_chain_file(dir.path().join("missing.chain")).is_err());
    }

    #[test]
    fn test_normalize_chrom_key() {
        assert_eq!(normalize_chrom_key("chrX"), "x");
        assert_eq!(normalize_chrom_key("CHR10"), "10");
        assert_eq!(normalize_chrom_key("scaffold_1"), "scaffold_1");
    }
}
