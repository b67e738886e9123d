//! Property-based tests for the liftover engine
//!
//! **Property 12: output tiles on a target sequence are sorted and disjoint**
//! **Property 13: a preloaded track covers every target base exactly once**

use fast_hal::core::error::LiftoverError;
use fast_hal::core::{
    parse_chain_bytes, Alignment, ChainSegmentMapper, IntervalRecord, LiftoverOptions,
    WiggleLiftover,
};
use proptest::prelude::*;

fn setup(chain_text: &str) -> (Alignment, ChainSegmentMapper) {
    let chain = parse_chain_bytes(chain_text.as_bytes()).unwrap();
    let alignment = Alignment::from_chain(&chain, "src", "tgt");
    let mut mapper = ChainSegmentMapper::new();
    mapper.add_chain("src", "tgt", chain);
    (alignment, mapper)
}

fn rec(chrom: &str, start: u64, end: u64, value: f64, line: usize) -> Result<IntervalRecord, LiftoverError> {
    Ok(IntervalRecord {
        chrom: chrom.to_string(),
        start,
        end,
        value,
        line,
    })
}

const ONE_TO_ONE: &str = "chain 100 chr1 1000 + 0 1000 chrT 1000 + 0 1000 1\n1000\n";

const DUPLICATED: &str = "\
chain 900 chr1 1000 + 100 200 chrA 1000 + 500 600 1
100

chain 300 chr1 1000 + 100 200 chrB 1000 + 0 100 2
100
";

/// Gapped chain onto two target sequences, one of them reversed
const GAPPED: &str = "\
chain 900 chr1 5000 + 0 1500 chrA 3000 + 100 1650 1
500 100 200
400 50 0
450

chain 400 chr1 5000 + 2000 3000 chrB 2000 - 0 1000 2
1000
";

#[test]
fn test_one_to_one_single_tile() {
    let (alignment, mapper) = setup(ONE_TO_ONE);
    let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
    let (tracks, stats) = engine.convert("src", &["tgt"], vec![rec("chr1", 10, 20, 3.5, 1)]).unwrap();

    assert_eq!(stats.mapped, 1);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].genome, "tgt");
    let tiles = &tracks[0].tiles;
    assert_eq!(tiles.len(), 1);
    assert_eq!((tiles[0].sequence.as_str(), tiles[0].start, tiles[0].end, tiles[0].value), ("chrT", 10, 20, 3.5));
}

#[test]
fn test_shifted_block_single_tile() {
    let (alignment, mapper) = setup("chain 100 chr1 1000 + 100 200 chr1 1000 + 300 400 1\n100\n");
    let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
    let records = vec![rec("chr1", 100, 150, 5.0, 1), rec("chr1", 150, 200, 5.0, 2)];
    let (tracks, _) = engine.convert("src", &["tgt"], records).unwrap();
    let tiles = &tracks[0].tiles;
    assert_eq!(tiles.len(), 1);
    assert_eq!((tiles[0].sequence.as_str(), tiles[0].start, tiles[0].end, tiles[0].value), ("chr1", 300, 400, 5.0));
}

#[test]
fn test_duplicated_source_maps_twice() {
    let (alignment, mapper) = setup(DUPLICATED);
    let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
    let (tracks, stats) = engine.convert("src", &["tgt"], vec![rec("chr1", 100, 150, 2.0, 1)]).unwrap();

    assert_eq!(stats.fragments, 2);
    let spans: Vec<(&str, u64, u64)> = tracks[0]
        .tiles
        .iter()
        .map(|t| (t.sequence.as_str(), t.start, t.end))
        .collect();
    assert_eq!(spans, vec![("chrA", 500, 550), ("chrB", 0, 50)]);
}

#[test]
fn test_unique_drops_duplicated_records() {
    let (alignment, mapper) = setup(DUPLICATED);
    let options = LiftoverOptions {
        unique: true,
        ..LiftoverOptions::default()
    };
    let engine = WiggleLiftover::new(&alignment, &mapper, options);
    let (tracks, stats) = engine.convert("src", &["tgt"], vec![rec("chr1", 100, 150, 2.0, 1)]).unwrap();
    assert_eq!(stats.ambiguous, 1);
    assert!(tracks[0].tiles.is_empty());
}

/// Bases aligned only by a lower-scoring chain still map without dupes
#[test]
fn test_no_dupes_maps_bases_with_single_path() {
    let (alignment, mapper) = setup(
        "chain 300 chr1 1000 + 100 250 chrB 1000 + 0 150 2\n150\n\nchain 900 chr1 1000 + 100 200 chrA 1000 + 500 600 1\n100\n",
    );
    let options = LiftoverOptions {
        traverse_dupes: false,
        ..LiftoverOptions::default()
    };
    let engine = WiggleLiftover::new(&alignment, &mapper, options);
    let records = vec![rec("chr1", 150, 160, 1.0, 1), rec("chr1", 210, 240, 4.0, 2)];
    let (tracks, stats) = engine.convert("src", &["tgt"], records).unwrap();

    assert_eq!(stats.mapped, 2);
    assert_eq!(stats.unmapped, 0);
    let spans: Vec<(&str, u64, u64, f64)> = tracks[0]
        .tiles
        .iter()
        .map(|t| (t.sequence.as_str(), t.start, t.end, t.value))
        .collect();
    assert_eq!(spans, vec![("chrA", 550, 560, 1.0), ("chrB", 110, 140, 4.0)]);
}

#[test]
fn test_no_dupes_keeps_primary_path() {
    let (alignment, mapper) = setup(DUPLICATED);
    let options = LiftoverOptions {
        traverse_dupes: false,
        unique: true,
        ..LiftoverOptions::default()
    };
    let engine = WiggleLiftover::new(&alignment, &mapper, options);
    let (tracks, stats) = engine.convert("src", &["tgt"], vec![rec("chr1", 100, 150, 2.0, 1)]).unwrap();
    assert_eq!(stats.ambiguous, 0);
    assert_eq!(tracks[0].tiles.len(), 1);
    assert_eq!(tracks[0].tiles[0].sequence, "chrA");
}

#[test]
fn test_adjacent_equal_records_merge() {
    let (alignment, mapper) = setup(ONE_TO_ONE);
    let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
    let records = vec![
        rec("chr1", 0, 10, 1.0, 1),
        rec("chr1", 10, 20, 1.0, 2),
        rec("chr1", 20, 30, 2.0, 3),
    ];
    let (tracks, stats) = engine.convert("src", &["tgt"], records).unwrap();
    assert_eq!(stats.tiles, 2);
    assert_eq!((tracks[0].tiles[0].start, tracks[0].tiles[0].end), (0, 20));
}

#[test]
fn test_empty_interval_is_malformed() {
    let (alignment, mapper) = setup(ONE_TO_ONE);
    let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
    let err = engine
        .convert("src", &["tgt"], vec![rec("chr1", 0, 10, 1.0, 1), rec("chr1", 30, 30, 1.0, 2)])
        .unwrap_err();
    assert!(matches!(err, LiftoverError::MalformedInput { line: 2, .. }));
}

#[test]
fn test_unaligned_record_counted() {
    let (alignment, mapper) = setup(GAPPED);
    let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
    let (_, stats) = engine.convert("src", &["tgt"], vec![rec("chr1", 4000, 4100, 1.0, 1)]).unwrap();
    assert_eq!(stats.unmapped, 1);
    assert_eq!(stats.mapped, 0);
}

#[test]
fn test_minus_strand_record() {
    let (alignment, mapper) = setup(GAPPED);
    let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
    let (tracks, _) = engine.convert("src", &["tgt"], vec![rec("chr1", 2000, 2010, 5.0, 1)]).unwrap();
    let tile = &tracks[0].tiles[0];
    assert_eq!((tile.sequence.as_str(), tile.start, tile.end), ("chrB", 1990, 2000));
}

/// Sorted, non-overlapping records on chr1 of the gapped alignment
fn arb_records() -> impl Strategy<Value = Vec<(u64, u64, i32)>> {
    prop::collection::vec((0u64..200, 1u64..200, -5i32..5), 1..40).prop_map(|raw| {
        let mut pos = 0;
        raw.into_iter()
            .filter_map(|(gap, len, value)| {
                let start = pos + gap;
                let end = (start + len).min(5000);
                pos = end;
                (start < end).then_some((start, end, value))
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 12: tile ordering**
    #[test]
    fn prop_tiles_sorted_and_disjoint(records in arb_records(), tile_size in 1u64..2000) {
        let (alignment, mapper) = setup(GAPPED);
        let options = LiftoverOptions { tile_size, ..LiftoverOptions::default() };
        let engine = WiggleLiftover::new(&alignment, &mapper, options);
        let input: Vec<_> = records
            .iter()
            .enumerate()
            .map(|(i, &(s, e, v))| rec("chr1", s, e, v as f64, i + 1))
            .collect();
        let (tracks, stats) = engine.convert("src", &["tgt"], input).unwrap();
        prop_assert_eq!(stats.total, records.len());
        prop_assert_eq!(stats.mapped + stats.unmapped, records.len());

        let tgt = alignment.genome("tgt").unwrap();
        let tiles = &tracks[0].tiles;
        for pair in tiles.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let ia = tgt.sequence_index(&a.sequence).unwrap();
            let ib = tgt.sequence_index(&b.sequence).unwrap();
            prop_assert!(ia < ib || (ia == ib && a.end <= b.start));
            if ia == ib && a.end == b.start {
                prop_assert!(a.value != b.value, "adjacent equal tiles were not merged");
            }
        }
        for tile in tiles {
            prop_assert!(tile.start < tile.end);
            prop_assert!(tile.end <= tgt.sequence(&tile.sequence).unwrap().length());
        }
    }

    /// **Property 13: preload coverage**
    #[test]
    fn prop_preload_covers_target(records in arb_records(), default_value in -3i32..3) {
        let (alignment, mapper) = setup(GAPPED);
        let options = LiftoverOptions {
            preload_output: true,
            default_value: default_value as f64,
            tile_size: 700,
            ..LiftoverOptions::default()
        };
        let engine = WiggleLiftover::new(&alignment, &mapper, options);
        let input: Vec<_> = records
            .iter()
            .enumerate()
            .map(|(i, &(s, e, v))| rec("chr1", s, e, v as f64, i + 1))
            .collect();
        let (tracks, _) = engine.convert("src", &["tgt"], input).unwrap();

        let covered: u64 = tracks[0].tiles.iter().map(|t| t.len()).sum();
        prop_assert_eq!(covered, alignment.genome("tgt").unwrap().total_length());
    }

    /// Identity liftover reproduces the input values base for base
    #[test]
    fn prop_identity_liftover(records in arb_records()) {
        let (alignment, mapper) = setup(GAPPED);
        let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
        let input: Vec<_> = records
            .iter()
            .enumerate()
            .map(|(i, &(s, e, v))| rec("chr1", s, e, v as f64, i + 1))
            .collect();
        let (tracks, _) = engine.convert("src", &["src"], input).unwrap();

        let mut expected = vec![None; 5000];
        for &(s, e, v) in &records {
            for slot in &mut expected[s as usize..e as usize] {
                *slot = Some(v as f64);
            }
        }
        let mut actual = vec![None; 5000];
        for tile in &tracks[0].tiles {
            for slot in &mut actual[tile.start as usize..tile.end as usize] {
                *slot = Some(tile.value);
            }
        }
        prop_assert_eq!(actual, expected);
    }
}
