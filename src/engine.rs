//! Value-change engine: streams the simulation section of a VCD file,
//! maintaining bit-level state for every tracked signal while accumulating a
//! leakage counter and draining timestamp-triggered extraction requests.
//!
//! Grounded in `original_source/.../parser.cc`'s `ParseValueChangeSection`.
//! `CHECK`/`DCHECK`/`UNIMPLEMENTED` call sites there become `Result` errors
//! here, each carrying the cursor offset at the point of failure.

use std::collections::VecDeque;

use crate::config::{EngineConfig, LeakageModel};
use crate::cursor::Cursor;
use crate::error::{malformed, Error};
use crate::extraction::{sort_by_time, ExtractionRequest, ExtractionResults};
use crate::identifier::IdentifierCode;
use crate::variable_state::VariableState;

/// Streams the value-change section starting at `cursor` (positioned right
/// after `$enddefinitions $end\n`) until end of file, then finalizes the
/// leakage buffer. `extract_only` names identifiers that are tracked for
/// snapshotting but must not contribute to the leakage counter.
pub fn run(
    cursor: &mut Cursor<'_>,
    variable_state: &mut VariableState,
    extract_only: &[IdentifierCode],
    config: &EngineConfig,
    mut extraction_batch: Vec<ExtractionRequest>,
) -> Result<(Vec<i64>, ExtractionResults), Error> {
    for request in &extraction_batch {
        for id in &request.ids {
            if !variable_state.contains(id) {
                return Err(Error::UnknownIdentifier { id: id.clone() });
            }
        }
    }
    sort_by_time(&mut extraction_batch);
    let mut results = ExtractionResults::new(extraction_batch.len());
    let mut pending: VecDeque<ExtractionRequest> = extraction_batch.into();

    let mut leakage: Vec<i64> = Vec::new();
    let mut current_leakage: i64 = 0;
    let mut last_index: i64 = -1;
    let mut last_simulation_time: i64 = -1;

    while !cursor.is_at_end() {
        if cursor.try_consume(b"#") {
            let simulation_time = cursor.parse_unsigned_decimal()? as i64;

            if config.align {
                let new_index = simulation_time / config.downsample as i64;
                if new_index > last_index + 1 {
                    let gap = (new_index - last_index - 1) as usize;
                    leakage.resize(leakage.len() + gap, current_leakage);
                }
                if new_index != last_index {
                    leakage.push(current_leakage);
                    if config.model == LeakageModel::HammingDistance {
                        current_leakage = 0;
                    }
                    last_index = new_index;
                }
            } else {
                leakage.push(current_leakage);
                if config.model == LeakageModel::HammingDistance {
                    current_leakage = 0;
                }
            }

            drain_due(simulation_time, &mut pending, variable_state, &mut results);
            last_simulation_time = simulation_time;

            cursor.take_until(b"\n")?;
            cursor.try_consume(b"\n");
        } else if cursor.try_consume(b"$dumpvars\n") || cursor.try_consume(b"$end\n") {
            // Skip: these bracket the initial dump but carry no extra state.
        } else if cursor.try_consume(b"$dumpall") {
            return Err(Error::Unsupported { offset: cursor.position(), feature: "$dumpall" });
        } else if cursor.try_consume(b"$dumpoff") {
            return Err(Error::Unsupported { offset: cursor.position(), feature: "$dumpoff" });
        } else if cursor.try_consume(b"$dumpon") {
            return Err(Error::Unsupported { offset: cursor.position(), feature: "$dumpon" });
        } else if cursor.try_consume(b"$comment") {
            return Err(Error::Unsupported { offset: cursor.position(), feature: "$comment" });
        } else {
            parse_value_change(cursor, variable_state, extract_only, config.model, &mut current_leakage)?;
        }
    }

    drain_due(last_simulation_time, &mut pending, variable_state, &mut results);
    if !pending.is_empty() {
        return Err(Error::MissingExtraction { remaining: pending.len() });
    }

    if !config.align {
        leakage.push(current_leakage);
    }
    if !leakage.is_empty() {
        leakage.remove(0);
    }
    if config.model == LeakageModel::HammingDistance && !leakage.is_empty() {
        leakage.remove(0);
    }

    Ok((leakage, results))
}

/// Hands off every request whose timestamp has now been reached to
/// `results`, in the order queued (earliest timestamp first, since `pending`
/// was sorted before streaming began).
fn drain_due(
    last_simulation_time: i64,
    pending: &mut VecDeque<ExtractionRequest>,
    variable_state: &VariableState,
    results: &mut ExtractionResults,
) {
    while let Some(front) = pending.front() {
        if front.time > last_simulation_time {
            break;
        }
        let request = pending.pop_front().expect("front just checked");
        let bits = variable_state.read_bits(&request.ids);
        results.fill(request.index, bits);
    }
}

fn accumulate_leakage(current_leakage: &mut i64, model: LeakageModel, old_bit: bool, new_bit: bool) {
    if old_bit == new_bit {
        return;
    }
    match model {
        LeakageModel::HammingDistance => *current_leakage += 1,
        LeakageModel::HammingWeight => *current_leakage += if new_bit { 1 } else { -1 },
    }
}

fn parse_value_change(
    cursor: &mut Cursor<'_>,
    variable_state: &mut VariableState,
    extract_only: &[IdentifierCode],
    model: LeakageModel,
    current_leakage: &mut i64,
) -> Result<(), Error> {
    let offset = cursor.position();
    let first_char = cursor
        .read_byte()
        .ok_or_else(|| malformed(offset, "unexpected end of value-change section"))?;

    match first_char {
        b'0' | b'1' | b'x' | b'X' | b'z' | b'Z' => {
            let new_bit = first_char == b'1';
            let id_offset = cursor.position();
            let id_bytes = cursor.take_until(b"\n")?;
            let identifier_code = IdentifierCode::encode_at(&id_bytes, id_offset)?;

            if !variable_state.contains(&identifier_code) {
                cursor.try_consume(b"\n");
                return Ok(());
            }
            if variable_state.width(&identifier_code) != 1 {
                return Err(malformed(id_offset, "scalar value change targets a multi-bit signal"));
            }

            if !extract_only.contains(&identifier_code) {
                let old_bit = variable_state.get_bit(&identifier_code, 0);
                accumulate_leakage(current_leakage, model, old_bit, new_bit);
            }
            variable_state.set_bit(&identifier_code, 0, new_bit);
            cursor.try_consume(b"\n");
            Ok(())
        }
        b'b' | b'B' => parse_vector_value_change(cursor, variable_state, extract_only, model, current_leakage),
        b'r' | b'R' => Err(Error::Unsupported {
            offset,
            feature: "real-valued ('r'/'R') value change",
        }),
        _ => Err(malformed(offset, "unrecognized value-change token")),
    }
}

fn parse_vector_value_change(
    cursor: &mut Cursor<'_>,
    variable_state: &mut VariableState,
    extract_only: &[IdentifierCode],
    model: LeakageModel,
    current_leakage: &mut i64,
) -> Result<(), Error> {
    let nr_of_bits = cursor.distance_to(b" ")?;
    let total_to_newline = cursor.distance_to(b"\n")?;
    if total_to_newline < nr_of_bits + 1 {
        return Err(malformed(cursor.position(), "vector value change missing identifier code"));
    }
    let id_len = total_to_newline - nr_of_bits - 1;

    let mut id_cursor = cursor.clone();
    id_cursor.advance(nr_of_bits + 1);
    let id_offset = id_cursor.position();
    let id_bytes = id_cursor.take_fixed(id_len)?;
    let identifier_code = IdentifierCode::encode_at(&id_bytes, id_offset)?;

    if !variable_state.contains(&identifier_code) {
        cursor.take_until(b"\n")?;
        cursor.try_consume(b"\n");
        return Ok(());
    }

    let width = variable_state.width(&identifier_code);
    if nr_of_bits > width {
        return Err(malformed(cursor.position(), "vector value change wider than declared signal"));
    }

    let accumulate = !extract_only.contains(&identifier_code);
    for i in (0..width).rev() {
        // Bits beyond the supplied run are left-justify zero-padded.
        let bit_char = if i >= nr_of_bits {
            b'0'
        } else {
            cursor
                .read_byte()
                .ok_or_else(|| malformed(cursor.position(), "truncated vector value change"))?
        };
        let new_bit = bit_char == b'1';
        if accumulate {
            let old_bit = variable_state.get_bit(&identifier_code, i);
            accumulate_leakage(current_leakage, model, old_bit, new_bit);
        }
        variable_state.set_bit(&identifier_code, i, new_bit);
    }
    cursor.advance(2 + id_len); // separating space + identifier code + newline
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: LeakageModel, align: bool, downsample: u64) -> EngineConfig {
        EngineConfig::new(model == LeakageModel::HammingWeight, align, downsample).unwrap()
    }

    #[test]
    fn scalar_toggles_accumulate_hamming_distance_and_drop_two_leading_samples() {
        let mut cursor = Cursor::new(b"#0\n1!\n#10\n0!\n#20\n");
        let mut state = VariableState::new();
        let bang = IdentifierCode::encode(b"!").unwrap();
        state.insert(&bang, 1);

        let (leakage, results) =
            run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![]).unwrap();

        assert_eq!(leakage, vec![1, 0]);
        assert!(results.is_empty());
    }

    #[test]
    fn alignment_fills_gaps_and_drops_one_leading_sample_under_hamming_weight() {
        let mut cursor = Cursor::new(b"#0\n1!\n#20\n");
        let mut state = VariableState::new();
        let bang = IdentifierCode::encode(b"!").unwrap();
        state.insert(&bang, 1);

        let (leakage, _) =
            run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingWeight, true, 5), vec![]).unwrap();

        assert_eq!(leakage, vec![1, 1, 1, 1]);
    }

    #[test]
    fn vector_value_change_left_justify_zero_pads_missing_high_bits() {
        let mut cursor = Cursor::new(b"b101 #\n#0\n");
        let mut state = VariableState::new();
        let hash = IdentifierCode::encode(b"#").unwrap();
        state.insert(&hash, 4);

        run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![]).unwrap();

        assert!(!state.get_bit(&hash, 3)); // zero-padded
        assert!(state.get_bit(&hash, 2));
        assert!(!state.get_bit(&hash, 1));
        assert!(state.get_bit(&hash, 0));
    }

    #[test]
    fn untracked_identifiers_are_skipped_without_affecting_leakage() {
        let mut cursor = Cursor::new(b"#0\n1$\n#10\n");
        let mut state = VariableState::new();
        // "$" was never declared, so it is absent from the variable table.
        let (leakage, _) =
            run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![]).unwrap();
        assert_eq!(leakage, vec![0]);
    }

    #[test]
    fn extraction_requests_snapshot_state_at_their_timestamp() {
        let mut cursor = Cursor::new(b"#0\n1!\n#10\n0!\n#20\n");
        let mut state = VariableState::new();
        let bang = IdentifierCode::encode(b"!").unwrap();
        state.insert(&bang, 1);
        let batch = vec![ExtractionRequest { time: 10, ids: vec![bang.clone()], index: 0 }];

        let (_, results) =
            run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), batch).unwrap();

        assert_eq!(results.get(0), Some(&b"1\0"[..]));
    }

    #[test]
    fn extraction_request_for_unknown_identifier_is_rejected_up_front() {
        let mut cursor = Cursor::new(b"#0\n");
        let mut state = VariableState::new();
        let batch = vec![ExtractionRequest {
            time: 0,
            ids: vec![IdentifierCode::encode(b"!").unwrap()],
            index: 0,
        }];

        let err = run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), batch)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownIdentifier { .. }));
    }

    #[test]
    fn unsatisfied_extraction_request_past_end_of_stream_is_an_error() {
        let mut cursor = Cursor::new(b"#0\n");
        let mut state = VariableState::new();
        let bang = IdentifierCode::encode(b"!").unwrap();
        state.insert(&bang, 1);
        let batch = vec![ExtractionRequest { time: 100, ids: vec![bang], index: 0 }];

        let err = run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), batch)
            .unwrap_err();
        assert!(matches!(err, Error::MissingExtraction { remaining: 1 }));
    }

    #[test]
    fn real_valued_change_is_unsupported() {
        let mut cursor = Cursor::new(b"#0\nr3.14 !\n");
        let mut state = VariableState::new();
        state.insert(&IdentifierCode::encode(b"!").unwrap(), 1);
        let err = run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { feature: "real-valued ('r'/'R') value change", .. }));
    }

    #[test]
    fn negative_timestamp_is_malformed_not_silently_negative() {
        let mut cursor = Cursor::new(b"#-5\n");
        let mut state = VariableState::new();
        let err = run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedTrace { .. }));
    }

    #[test]
    fn dumpall_is_unsupported() {
        let mut cursor = Cursor::new(b"#0\n$dumpall\n");
        let mut state = VariableState::new();
        let err = run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { feature: "$dumpall", .. }));
    }

    #[test]
    fn dumpoff_is_unsupported() {
        let mut cursor = Cursor::new(b"#0\n$dumpoff\n");
        let mut state = VariableState::new();
        let err = run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { feature: "$dumpoff", .. }));
    }

    #[test]
    fn dumpon_is_unsupported() {
        let mut cursor = Cursor::new(b"#0\n$dumpon\n");
        let mut state = VariableState::new();
        let err = run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { feature: "$dumpon", .. }));
    }

    #[test]
    fn mid_stream_comment_is_unsupported() {
        let mut cursor = Cursor::new(b"#0\n$comment whoops $end\n");
        let mut state = VariableState::new();
        let err = run(&mut cursor, &mut state, &[], &config(LeakageModel::HammingDistance, false, 1), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { feature: "$comment", .. }));
    }
}
