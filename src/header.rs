//! Header parser: walks the declaration section of a VCD file, builds scope
//! paths, and populates the variable state table.
//!
//! Grounded in `original_source/.../parser.cc`'s `ParseHeader`. A bare `\n`
//! between commands is tolerated by looping back into the dispatch rather
//! than by a dedicated grammar production, matching the original. An
//! unrecognized leading `$`-directive is `MalformedTrace` at the cursor's
//! current offset — the original aborts the process here with an
//! unreachable-code macro; this port surfaces a diagnosable error instead.

use crate::cursor::Cursor;
use crate::error::{malformed, Error};
use crate::identifier::IdentifierCode;
use crate::spec_files::{InspectionSpec, VarDefSet};
use crate::variable_state::VariableState;

/// Runs the declaration-command loop until `$enddefinitions $end` closes it.
/// On success, `variable_state` holds every tracked signal and the returned
/// vector names identifiers that are extract-only: tracked for snapshotting
/// but never folded into the leakage counter.
pub fn parse_header(
    cursor: &mut Cursor<'_>,
    variable_state: &mut VariableState,
    inspection_spec: &InspectionSpec,
    ids_to_extract: &[IdentifierCode],
    var_def_set: &mut VarDefSet,
) -> Result<Vec<IdentifierCode>, Error> {
    let should_filter_signals = !inspection_spec.is_empty();
    let should_insert_var_defs = var_def_set.is_empty();
    let mut current_scope = String::new();
    let mut extract_only = Vec::new();

    loop {
        if cursor.try_consume(b"$var ") {
            parse_var_declaration(
                cursor,
                variable_state,
                inspection_spec,
                ids_to_extract,
                var_def_set,
                &current_scope,
                should_filter_signals,
                should_insert_var_defs,
                &mut extract_only,
            )?;
        } else if cursor.try_consume(b"$scope ") {
            if should_filter_signals {
                let name = cursor.take_until(b" $end")?;
                let name = String::from_utf8_lossy(&name);
                if current_scope.is_empty() {
                    current_scope.push_str(&name);
                } else {
                    current_scope.push_str("->");
                    current_scope.push_str(&name);
                }
            }
            cursor.skip_past_end_marker()?;
        } else if cursor.try_consume(b"$upscope $end\n") {
            if should_filter_signals {
                match current_scope.rfind("->") {
                    Some(pos) => current_scope.truncate(pos),
                    None => current_scope.clear(),
                }
            }
        } else if cursor.try_consume(b"$enddefinitions $end\n") {
            break;
        } else if cursor.try_consume(b"$date") {
            log::debug!("skipping $date declaration");
            cursor.skip_past_end_marker()?;
        } else if cursor.try_consume(b"$version") {
            log::debug!("skipping $version declaration");
            cursor.skip_past_end_marker()?;
        } else if cursor.try_consume(b"$timescale") {
            log::debug!("skipping $timescale declaration");
            cursor.skip_past_end_marker()?;
        } else if cursor.try_consume(b"$comment") {
            log::debug!("skipping $comment declaration");
            cursor.skip_past_end_marker()?;
        } else if cursor.try_consume(b"\n") {
            log::trace!("tolerated bare newline at byte {}", cursor.position());
            continue;
        } else {
            return Err(malformed(cursor.position(), "unrecognized declaration command"));
        }
    }

    Ok(extract_only)
}

#[allow(clippy::too_many_arguments)]
fn parse_var_declaration(
    cursor: &mut Cursor<'_>,
    variable_state: &mut VariableState,
    inspection_spec: &InspectionSpec,
    ids_to_extract: &[IdentifierCode],
    var_def_set: &mut VarDefSet,
    current_scope: &str,
    should_filter_signals: bool,
    should_insert_var_defs: bool,
    extract_only: &mut Vec<IdentifierCode>,
) -> Result<(), Error> {
    // Cursor position right after "$var " — the declaration substring used
    // for cross-file consistency checking starts here and runs to " $end".
    let declaration_start = cursor.clone();

    cursor.take_until(b" ")?; // var_type, discarded: tri-state fidelity is out of scope
    cursor.try_consume(b" ");
    let size = cursor.parse_unsigned_decimal()? as usize;
    cursor.try_consume(b" ");

    let id_offset = cursor.position();
    let id_bytes = cursor.take_until(b" ")?;
    let identifier_code = IdentifierCode::encode_at(&id_bytes, id_offset)?;
    cursor.try_consume(b" ");

    if should_filter_signals {
        let reference = cursor.take_until(b" $end")?;
        let reference = String::from_utf8_lossy(&reference);
        // Matches the original exactly: the scope+reference lookup key always
        // joins with "->", even for top-level variables with an empty scope.
        let fully_qualified = format!("{current_scope}->{reference}");

        if inspection_spec.contains(current_scope) || inspection_spec.contains(&fully_qualified) {
            variable_state.insert(&identifier_code, size);
        } else if ids_to_extract.contains(&identifier_code) {
            extract_only.push(identifier_code.clone());
            variable_state.insert(&identifier_code, size);
        }
    } else {
        variable_state.insert(&identifier_code, size);
    }

    let mut declaration_cursor = declaration_start.clone();
    let declaration = declaration_cursor.take_until(b" $end")?;
    let declaration = String::from_utf8_lossy(&declaration).into_owned();
    if should_insert_var_defs {
        var_def_set.insert(declaration);
    } else if !var_def_set.contains(&declaration) {
        return Err(Error::InconsistentVars {
            offset: declaration_start.position(),
            declaration,
        });
    }
    declaration_cursor.skip_past_end_marker()?;
    *cursor = declaration_cursor;

    Ok(())
}
