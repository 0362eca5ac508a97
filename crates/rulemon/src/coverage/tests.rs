//! Tests for the coverage lattice, restriction arithmetic and persistence.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use super::*;
use crate::assertion::RuleId;
use crate::result::RulemonError;
use std::collections::BTreeSet;

fn small_space() -> CoverageSpace {
    CoverageSpace::new(&[
        VariableDecl::symbolic(CoverageVariable::Rain),
        VariableDecl::count(CoverageVariable::NumVehicles, 2),
        VariableDecl::symbolic(CoverageVariable::TimeOfDay),
        VariableDecl::symbolic(CoverageVariable::RoadGraph),
    ])
    .unwrap()
}

fn rule(rule: u32, subcase: u32) -> RuleId {
    RuleId::new(rule, subcase)
}

fn night_only() -> ValidityRequirement {
    ValidityRequirement::new()
        .allow(
            CoverageVariable::TimeOfDay,
            [
                CoverageValue::TimeOfDay(TimeOfDay::Dusk),
                CoverageValue::TimeOfDay(TimeOfDay::Night),
            ],
        )
        .unwrap()
}

fn wet_junction() -> ValidityRequirement {
    ValidityRequirement::in_junction()
        .allow(
            CoverageVariable::Rain,
            [
                CoverageValue::Rain(WeatherLevel::Mid),
                CoverageValue::Rain(WeatherLevel::Heavy),
            ],
        )
        .unwrap()
}

fn bins() -> Vec<(RuleId, Option<ValidityRequirement>)> {
    vec![
        (rule(124, 0), None),
        (rule(113, 0), Some(night_only())),
        (rule(170, 0), Some(wet_junction())),
    ]
}

fn tracker() -> CoverageTracker {
    CoverageTracker::new(small_space(), bins(), Box::new(MemoryCoverageStore::new())).unwrap()
}

fn key(rain: WeatherLevel, vehicles: u32, time: TimeOfDay, graph: RoadGraph) -> CoverageKey {
    small_space()
        .key(
            &CoverageSample::new()
                .with(CoverageValue::Rain(rain))
                .with(CoverageValue::NumVehicles(vehicles))
                .with(CoverageValue::TimeOfDay(time))
                .with(CoverageValue::RoadGraph(graph)),
        )
        .unwrap()
}

fn set(ids: &[RuleId]) -> BTreeSet<RuleId> {
    ids.iter().copied().collect()
}

// ============================================================================
// Coverage space
// ============================================================================

mod space_tests {
    use super::*;

    #[test]
    fn test_space_size_is_product() {
        // 5 rain levels * 3 counts * 3 times * 15 graphs
        assert_eq!(small_space().size(), 5 * 3 * 3 * 15);
    }

    #[test]
    fn test_space_rejects_duplicates() {
        let err = CoverageSpace::new(&[
            VariableDecl::symbolic(CoverageVariable::Rain),
            VariableDecl::symbolic(CoverageVariable::Rain),
        ])
        .unwrap_err();
        assert!(matches!(err, RulemonError::Config { .. }));
    }

    #[test]
    fn test_count_needs_max() {
        assert!(CoverageSpace::new(&[VariableDecl::symbolic(CoverageVariable::NumVehicles)]).is_err());
        assert!(CoverageSpace::new(&[VariableDecl::count(CoverageVariable::Rain, 3)]).is_err());
    }

    #[test]
    fn test_key_follows_declared_order() {
        let k = key(WeatherLevel::Light, 1, TimeOfDay::Day, RoadGraph::Tftf);
        let vars: Vec<_> = k.values().iter().map(CoverageValue::variable).collect();
        assert_eq!(
            vars,
            vec![
                CoverageVariable::Rain,
                CoverageVariable::NumVehicles,
                CoverageVariable::TimeOfDay,
                CoverageVariable::RoadGraph,
            ]
        );
    }

    #[test]
    fn test_key_rejects_out_of_domain_count() {
        let sample = CoverageSample::new()
            .with(CoverageValue::Rain(WeatherLevel::None))
            .with(CoverageValue::NumVehicles(3))
            .with(CoverageValue::TimeOfDay(TimeOfDay::Day))
            .with(CoverageValue::RoadGraph(RoadGraph::Tftf));
        let err = small_space().key(&sample).unwrap_err();
        assert!(matches!(err, RulemonError::DomainMismatch { .. }));
    }

    #[test]
    fn test_key_rejects_missing_variable() {
        let sample = CoverageSample::new().with(CoverageValue::Rain(WeatherLevel::None));
        assert!(small_space().key(&sample).is_err());
    }

    #[test]
    fn test_keys_enumerates_whole_space() {
        let space = small_space();
        let keys: BTreeSet<_> = space.keys().collect();
        assert_eq!(keys.len() as u64, space.size());
    }
}

// ============================================================================
// Restriction arithmetic
// ============================================================================

mod restriction_tests {
    use super::*;

    #[test]
    fn test_reachable_size_matches_full_sweep() {
        let space = small_space();
        let mut t = tracker();
        let all = set(&[rule(124, 0), rule(113, 0), rule(170, 0)]);
        for k in space.keys() {
            t.update(&k, &all, &set(&[]), &set(&[])).unwrap();
        }

        // 405 keys: 124.0 everywhere, 113.0 at dusk or night, 170.0 in a
        // wet junction
        let expected = 405 + 405 * 2 / 3 + 405 * 2 / 5 * 5 / 15;
        assert_eq!(t.reachable_size(), expected);

        let s = t.summary();
        assert_eq!(s.macro_cases as u64, space.size());
        assert_eq!(s.uncovered as u64, t.reachable_size());
        assert_eq!(s.invalid as u64, space.size() * 3 - t.reachable_size());
    }

    #[test]
    fn test_valid_outside_requirement_stays_invalid() {
        let mut t = tracker();
        let k = key(WeatherLevel::None, 0, TimeOfDay::Day, RoadGraph::Tftf);
        let all = set(&[rule(124, 0), rule(113, 0), rule(170, 0)]);
        t.update(&k, &all, &all, &all).unwrap();
        assert_eq!(
            t.row(&k).unwrap(),
            &[CellState::Bug, CellState::Invalid, CellState::Invalid]
        );
    }

    #[test]
    fn test_restriction_scales_by_k_over_n() {
        let space = small_space();
        let full = space.size();
        // time of day: 2 of 3
        assert_eq!(night_only().reachable_size(&space) * 3, full * 2);
        // road graph: 5 of 15, rain: 2 of 5
        assert_eq!(wet_junction().reachable_size(&space) * 15 * 5, full * 5 * 2);
    }

    #[test]
    fn test_restriction_on_undeclared_variable_is_ignored() {
        let space = small_space();
        let req = ValidityRequirement::new()
            .allow(
                CoverageVariable::EmergencyVehicle,
                [CoverageValue::EmergencyVehicle(EmergencyStatus::Active)],
            )
            .unwrap();
        assert_eq!(req.reachable_size(&space), space.size());
        assert!(req.is_valid(&key(WeatherLevel::None, 0, TimeOfDay::Day, RoadGraph::Tftf)));
    }

    #[test]
    fn test_summary_reports_reachable() {
        let t = tracker();
        let s = t.summary();
        assert_eq!(s.reachable, t.reachable_size());
        assert_eq!(s.unrestricted, small_space().size() * 3);
        assert_eq!(s.percentage(), 0.0);
    }
}

// ============================================================================
// Tracker lattice
// ============================================================================

mod tracker_tests {
    use super::*;

    #[test]
    fn test_new_key_flags_macro_case() {
        let mut t = tracker();
        let k = key(WeatherLevel::None, 0, TimeOfDay::Day, RoadGraph::Tftf);
        let update = t.update(&k, &set(&[rule(124, 0)]), &set(&[]), &set(&[])).unwrap();
        assert!(update.new_macro_case);
        assert_eq!(update.newly_covered, 0);
        assert_eq!(
            t.row(&k).unwrap(),
            &[CellState::Uncovered, CellState::Invalid, CellState::Invalid]
        );

        let again = t.update(&k, &set(&[rule(124, 0)]), &set(&[]), &set(&[])).unwrap();
        assert!(!again.new_macro_case);
        assert!(!again.changed);
    }

    #[test]
    fn test_covered_then_bug() {
        let mut t = tracker();
        let k = key(WeatherLevel::Heavy, 1, TimeOfDay::Night, RoadGraph::Tttf);
        let all = set(&[rule(124, 0), rule(113, 0), rule(170, 0)]);

        let u = t.update(&k, &all, &set(&[rule(113, 0)]), &set(&[])).unwrap();
        assert_eq!(u.newly_covered, 1);
        assert_eq!(t.cell(&k, rule(113, 0)), Some(CellState::Covered));

        let u = t.update(&k, &all, &set(&[]), &set(&[rule(113, 0), rule(170, 0)])).unwrap();
        assert_eq!(u.newly_covered, 2);
        assert_eq!(u.new_bugs, 2);
        assert_eq!(t.cell(&k, rule(113, 0)), Some(CellState::Bug));
        assert_eq!(t.cell(&k, rule(170, 0)), Some(CellState::Bug));

        // coverage never pulls a bug back down
        t.update(&k, &all, &all, &set(&[])).unwrap();
        assert_eq!(t.cell(&k, rule(113, 0)), Some(CellState::Bug));
    }

    #[test]
    fn test_invalid_bins_ignore_events() {
        let mut t = tracker();
        let k = key(WeatherLevel::None, 0, TimeOfDay::Day, RoadGraph::Tftf);
        let valid = set(&[rule(124, 0)]);
        t.update(&k, &valid, &set(&[rule(113, 0)]), &set(&[rule(170, 0)])).unwrap();
        assert_eq!(t.cell(&k, rule(113, 0)), Some(CellState::Invalid));
        assert_eq!(t.cell(&k, rule(170, 0)), Some(CellState::Invalid));
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let err = CoverageTracker::new(
            small_space(),
            vec![(rule(1, 0), None), (rule(1, 0), None)],
            Box::new(MemoryCoverageStore::new()),
        )
        .unwrap_err();
        assert!(matches!(err, RulemonError::Config { .. }));
    }

    #[test]
    fn test_summary_counts() {
        let mut t = tracker();
        let k1 = key(WeatherLevel::None, 0, TimeOfDay::Day, RoadGraph::Tftf);
        let k2 = key(WeatherLevel::Mid, 2, TimeOfDay::Dusk, RoadGraph::Tttt);
        t.update(&k1, &set(&[rule(124, 0)]), &set(&[rule(124, 0)]), &set(&[])).unwrap();
        t.update(
            &k2,
            &set(&[rule(124, 0), rule(113, 0), rule(170, 0)]),
            &set(&[]),
            &set(&[rule(170, 0)]),
        )
        .unwrap();

        let s = t.summary();
        assert_eq!(s.macro_cases, 2);
        assert_eq!(s.new_macro_cases, 2);
        assert_eq!(s.covered, 1);
        assert_eq!(s.bugs, 1);
        assert_eq!(s.uncovered, 2);
        assert_eq!(s.invalid, 2);
    }
}

// ============================================================================
// Persistence
// ============================================================================

mod store_tests {
    use super::*;
    use tempfile::TempDir;

    fn populated() -> CoverageTracker {
        let mut t = tracker();
        let all = set(&[rule(124, 0), rule(113, 0), rule(170, 0)]);
        t.update(
            &key(WeatherLevel::Heavy, 2, TimeOfDay::Night, RoadGraph::Tttt),
            &all,
            &set(&[rule(124, 0)]),
            &set(&[rule(170, 0)]),
        )
        .unwrap();
        t.update(
            &key(WeatherLevel::None, 0, TimeOfDay::Day, RoadGraph::Tftf),
            &set(&[rule(124, 0)]),
            &set(&[]),
            &set(&[]),
        )
        .unwrap();
        t
    }

    #[test]
    fn test_round_trip_is_identical() {
        let t = populated();
        let ids: Vec<RuleId> = bins().into_iter().map(|(id, _)| id).collect();
        let text = encode_table(t.space(), &ids, t.rows());
        let rows = decode_table(&text, t.space(), &ids).unwrap();
        assert_eq!(&rows, t.rows());
        assert_eq!(encode_table(t.space(), &ids, &rows), text);
    }

    #[test]
    fn test_header_carries_types_and_bins() {
        let t = populated();
        let ids: Vec<RuleId> = bins().into_iter().map(|(id, _)| id).collect();
        let text = encode_table(t.space(), &ids, t.rows());
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("#rulemon-coverage,v1"));
        assert_eq!(
            lines.next(),
            Some("RAIN:enum,NUM_VEHICLES:count,TIME_OF_DAY:enum,ROAD_GRAPH:enum,124.0,113.0,170.0")
        );
        assert!(text.contains("HEAVY,2,NIGHT,TTTT,COVERED,UNCOVERED,BUG"));
    }

    #[test]
    fn test_file_store_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("coverage.csv");
        {
            let mut t = CoverageTracker::new(
                small_space(),
                bins(),
                Box::new(CsvCoverageFile::new(&path)),
            )
            .unwrap();
            assert!(path.exists());
            t.update(
                &key(WeatherLevel::Light, 1, TimeOfDay::Dusk, RoadGraph::Ttft),
                &set(&[rule(124, 0), rule(113, 0)]),
                &set(&[rule(113, 0)]),
                &set(&[]),
            )
            .unwrap();
        }
        let reloaded =
            CoverageTracker::new(small_space(), bins(), Box::new(CsvCoverageFile::new(&path)))
                .unwrap();
        let k = key(WeatherLevel::Light, 1, TimeOfDay::Dusk, RoadGraph::Ttft);
        assert_eq!(reloaded.cell(&k, rule(113, 0)), Some(CellState::Covered));
        assert_eq!(reloaded.summary().new_macro_cases, 0);
    }

    #[test]
    fn test_saves_only_on_change() {
        let mut t = tracker();
        let k = key(WeatherLevel::None, 0, TimeOfDay::Day, RoadGraph::Tftf);
        t.update(&k, &set(&[rule(124, 0)]), &set(&[]), &set(&[])).unwrap();
        let u = t.update(&k, &set(&[rule(124, 0)]), &set(&[]), &set(&[])).unwrap();
        assert!(!u.changed);
    }

    #[test]
    fn test_wrong_column_count_fails() {
        let text = "#rulemon-coverage,v1\n\
                    RAIN:enum,NUM_VEHICLES:count,TIME_OF_DAY:enum,ROAD_GRAPH:enum,124.0,113.0,170.0\n\
                    NONE,0,DAY,TFTF,COVERED,INVALID\n";
        let ids: Vec<RuleId> = bins().into_iter().map(|(id, _)| id).collect();
        let err = decode_table(text, &small_space(), &ids).unwrap_err();
        assert!(matches!(err, RulemonError::MalformedRow { line: 3, .. }));
    }

    #[test]
    fn test_unknown_label_fails() {
        let text = "#rulemon-coverage,v1\n\
                    RAIN:enum,NUM_VEHICLES:count,TIME_OF_DAY:enum,ROAD_GRAPH:enum,124.0,113.0,170.0\n\
                    DRIZZLE,0,DAY,TFTF,COVERED,INVALID,INVALID\n";
        let ids: Vec<RuleId> = bins().into_iter().map(|(id, _)| id).collect();
        let err = decode_table(text, &small_space(), &ids).unwrap_err();
        assert!(matches!(err, RulemonError::UnknownLabel { line: 3, .. }));

        let text = text.replace("DRIZZLE", "NONE").replace("COVERED", "DONE");
        let err = decode_table(&text, &small_space(), &ids).unwrap_err();
        assert!(matches!(err, RulemonError::UnknownLabel { .. }));
    }

    #[test]
    fn test_count_column_must_be_integer() {
        let text = "#rulemon-coverage,v1\n\
                    RAIN:enum,NUM_VEHICLES:count,TIME_OF_DAY:enum,ROAD_GRAPH:enum,124.0,113.0,170.0\n\
                    NONE,LOW,DAY,TFTF,COVERED,INVALID,INVALID\n";
        let ids: Vec<RuleId> = bins().into_iter().map(|(id, _)| id).collect();
        assert!(decode_table(text, &small_space(), &ids).is_err());
    }

    #[test]
    fn test_untagged_file_fails() {
        let text = "RAIN,NUM_VEHICLES,TIME_OF_DAY,ROAD_GRAPH,124.0,113.0,170.0\n";
        let ids: Vec<RuleId> = bins().into_iter().map(|(id, _)| id).collect();
        let err = decode_table(text, &small_space(), &ids).unwrap_err();
        assert!(matches!(err, RulemonError::Schema { .. }));
    }

    #[test]
    fn test_bin_mismatch_fails() {
        let store = MemoryCoverageStore::with_text(
            "#rulemon-coverage,v1\n\
             RAIN:enum,NUM_VEHICLES:count,TIME_OF_DAY:enum,ROAD_GRAPH:enum,124.0,113.0,999.0\n",
        );
        let err = CoverageTracker::new(small_space(), bins(), Box::new(store)).unwrap_err();
        assert!(matches!(err, RulemonError::Schema { .. }));
    }

    #[test]
    fn test_column_type_mismatch_fails() {
        let store = MemoryCoverageStore::with_text(
            "#rulemon-coverage,v1\n\
             RAIN:enum,NUM_VEHICLES:enum,TIME_OF_DAY:enum,ROAD_GRAPH:enum,124.0,113.0,170.0\n",
        );
        assert!(CoverageTracker::new(small_space(), bins(), Box::new(store)).is_err());
    }
}

// ============================================================================
// Property tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn tick_strategy() -> impl Strategy<Value = (usize, [bool; 3], [bool; 3], [bool; 3])> {
        (
            0usize..4,
            any::<[bool; 3]>(),
            any::<[bool; 3]>(),
            any::<[bool; 3]>(),
        )
    }

    fn pick(ids: &[RuleId], flags: [bool; 3]) -> BTreeSet<RuleId> {
        ids.iter()
            .zip(flags)
            .filter(|(_, on)| *on)
            .map(|(id, _)| *id)
            .collect()
    }

    proptest! {
        /// Cells never move down the lattice under any event sequence
        #[test]
        fn prop_cells_are_monotone(ticks in proptest::collection::vec(tick_strategy(), 1..60)) {
            let keys = [
                key(WeatherLevel::None, 0, TimeOfDay::Day, RoadGraph::Tftf),
                key(WeatherLevel::Heavy, 1, TimeOfDay::Night, RoadGraph::Tttt),
                key(WeatherLevel::Mid, 2, TimeOfDay::Dusk, RoadGraph::Ttft),
                key(WeatherLevel::Light, 0, TimeOfDay::Night, RoadGraph::Ffft),
            ];
            let ids: Vec<RuleId> = bins().into_iter().map(|(id, _)| id).collect();
            let mut t = tracker();

            for (k, valid, covered, violated) in ticks {
                let key = &keys[k];
                let before: Vec<CellState> = t
                    .row(key)
                    .map_or_else(|| vec![CellState::Invalid; ids.len()], <[CellState]>::to_vec);
                t.update(key, &pick(&ids, valid), &pick(&ids, covered), &pick(&ids, violated))
                    .unwrap();
                let after = t.row(key).unwrap();
                for (b, a) in before.iter().zip(after) {
                    prop_assert!(a >= b, "cell moved from {} to {}", b, a);
                }
            }
        }

        /// Newly covered counts equal the cells that entered COVERED or BUG
        #[test]
        fn prop_newly_covered_matches_summary(ticks in proptest::collection::vec(tick_strategy(), 1..40)) {
            let ids: Vec<RuleId> = bins().into_iter().map(|(id, _)| id).collect();
            let k = key(WeatherLevel::Heavy, 1, TimeOfDay::Night, RoadGraph::Tttt);
            let mut t = tracker();
            let mut total = 0;
            for (_, valid, covered, violated) in ticks {
                total += t
                    .update(&k, &pick(&ids, valid), &pick(&ids, covered), &pick(&ids, violated))
                    .unwrap()
                    .newly_covered;
            }
            let s = t.summary();
            // a COVERED -> BUG step counts twice across the run
            prop_assert!(total >= s.covered + s.bugs);
        }
    }
}
