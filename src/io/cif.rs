use crate::error::{Error, Result};
use crate::model::{CoordinateMode, LatticeSpec, StructureModel, StructureParameters};
use std::path::Path;

/// Read a CIF block into [`StructureParameters`]: cell lengths and angles,
/// the asymmetric unit and the listed symmetry operations, or the space
/// group number when no operations are listed.
pub fn parse_parameters(text: &str, path: &Path) -> Result<StructureParameters> {
    let bad = |reason: String| Error::input_format(path, reason);

    let mut cell: [Option<f64>; 6] = [None; 6];
    let mut symmetry_ops = Vec::new();
    let mut spacegroup = None;
    let mut species = Vec::new();
    let mut coordinates = Vec::new();

    let mut in_loop = false;
    let mut loop_has_rows = false;
    let mut headers: Vec<String> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        // 1. Loop Detection
        if trimmed.starts_with("loop_") {
            in_loop = true;
            loop_has_rows = false;
            headers.clear();
            continue;
        }
        if trimmed.starts_with("data_") {
            in_loop = false;
            continue;
        }

        if trimmed.starts_with('_') {
            // 2. Headers come before the first row of a loop
            if in_loop && !loop_has_rows {
                headers.push(trimmed.to_lowercase());
                continue;
            }
            in_loop = false;

            // 3. Cell Parameters
            let mut tokens = tokenize(trimmed).into_iter();
            let tag = tokens.next().unwrap_or_default().to_lowercase();
            let slot = match tag.as_str() {
                "_cell_length_a" => Some(0),
                "_cell_length_b" => Some(1),
                "_cell_length_c" => Some(2),
                "_cell_angle_alpha" => Some(3),
                "_cell_angle_beta" => Some(4),
                "_cell_angle_gamma" => Some(5),
                _ => None,
            };
            if let Some(slot) = slot {
                let value = tokens.next().and_then(|v| parse_cif_float(&v)).ok_or_else(|| {
                    bad(format!("line {}: invalid value for {}", line_no + 1, tag))
                })?;
                cell[slot] = Some(value);
            } else if tag == "_symmetry_int_tables_number" || tag == "_space_group_it_number" {
                let number = tokens.next().and_then(|v| v.parse::<i32>().ok()).ok_or_else(|| {
                    bad(format!("line {}: invalid value for {}", line_no + 1, tag))
                })?;
                spacegroup = Some(number);
            }
            continue;
        }

        // 4. Data rows
        if in_loop {
            loop_has_rows = true;
            let values = tokenize(trimmed);
            if let Some(col) = headers.iter().position(|h| {
                h.contains("_symmetry_equiv_pos_as_xyz") || h.contains("_space_group_symop_operation_xyz")
            }) {
                if let Some(op) = values.get(col) {
                    symmetry_ops.push(op.clone());
                }
            } else if headers.iter().any(|h| h.contains("_atom_site_fract_x")) {
                let (element, frac) = parse_atom_row(&headers, &values)
                    .ok_or_else(|| bad(format!("line {}: malformed atom site row", line_no + 1)))?;
                species.push(element);
                coordinates.push(frac);
            }
        }
    }

    let names = ["a", "b", "c", "alpha", "beta", "gamma"];
    let mut resolved = [0.0; 6];
    for (k, value) in cell.iter().enumerate() {
        resolved[k] = match value {
            Some(v) => *v,
            // Angles default to 90 degrees when omitted
            None if k >= 3 => 90.0,
            None => return Err(bad(format!("missing _cell_length_{}", names[k]))),
        };
    }
    if coordinates.is_empty() {
        return Err(bad("no atom sites with fractional coordinates".into()));
    }

    Ok(StructureParameters {
        lattice: LatticeSpec::LengthsAndAngles {
            abc: [resolved[0], resolved[1], resolved[2]],
            angles: [resolved[3], resolved[4], resolved[5]],
        },
        coordinates,
        coordinate_mode: CoordinateMode::Fractional,
        species,
        subspecies: None,
        symmetry_operations: symmetry_ops,
        spacegroup,
        periodic: [true; 3],
    })
}

/// Parse a CIF file into a structure, expanding symmetry images.
pub fn parse_str(text: &str, path: &Path) -> Result<StructureModel> {
    let params = parse_parameters(text, path)?;
    StructureModel::from_parameters(&params).map_err(|e| Error::input_format(path, e.to_string()))
}

fn parse_atom_row(headers: &[String], values: &[String]) -> Option<(String, [f64; 3])> {
    if values.len() < headers.len() {
        return None;
    }
    let column = |name: &str| headers.iter().position(|h| h == name);

    let element_source = column("_atom_site_type_symbol").or_else(|| column("_atom_site_label"))?;
    let element: String = values[element_source]
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect();
    if element.is_empty() {
        return None;
    }

    let mut frac = [0.0; 3];
    for (k, axis) in ["x", "y", "z"].iter().enumerate() {
        let col = column(&format!("_atom_site_fract_{}", axis))?;
        frac[k] = parse_cif_float(&values[col])?;
    }
    Some((element, frac))
}

/// Split on whitespace, keeping quoted strings together.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' || c == '"' {
            chars.next();
            let token: String = chars.by_ref().take_while(|&ch| ch != c).collect();
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
            tokens.push(token);
        }
    }
    tokens
}

/// Numbers may carry a standard uncertainty, e.g. `5.4307(2)`.
fn parse_cif_float(s: &str) -> Option<f64> {
    let clean: String = s.chars().take_while(|c| *c != '(').collect();
    clean.parse().ok()
}
