use crate::error::{Error, Result};
use crate::model::{SiteInput, StructureModel};
use std::path::Path;

/// Box used for plain XYZ files, which carry no cell.
const DEFAULT_BOX: f64 = 20.0;

/// Parse (extended) XYZ. A `Lattice="ax ay az bx by bz cx cy cz"` comment
/// makes the structure periodic on the axes named by `pbc="T T T"` (all
/// axes when `pbc` is absent). Plain XYZ is treated as an isolated cluster.
pub fn parse_str(text: &str, path: &Path) -> Result<StructureModel> {
    let bad = |reason: &str| Error::input_format(path, reason);
    let mut lines = text.lines();

    // 1. Number of Atoms
    let n_atoms: usize = lines
        .next()
        .ok_or_else(|| bad("empty XYZ file"))?
        .trim()
        .parse()
        .map_err(|_| bad("invalid atom count"))?;

    // 2. Comment Line (Try to find "Lattice=...")
    let comment = lines.next().unwrap_or("");
    let lattice_values = quoted_value(comment, "Lattice=");
    let (lattice, periodic) = match lattice_values {
        Some(values) => {
            let parts: Vec<f64> = values
                .split_whitespace()
                .map(|s| s.parse())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| bad("invalid Lattice entry"))?;
            if parts.len() != 9 {
                return Err(bad("Lattice entry needs nine numbers"));
            }
            let lattice = [
                [parts[0], parts[1], parts[2]],
                [parts[3], parts[4], parts[5]],
                [parts[6], parts[7], parts[8]],
            ];
            let periodic = match quoted_value(comment, "pbc=") {
                Some(flags) => parse_pbc(&flags).ok_or_else(|| bad("invalid pbc entry"))?,
                None => [true; 3],
            };
            (lattice, periodic)
        }
        None => (
            [
                [DEFAULT_BOX, 0.0, 0.0],
                [0.0, DEFAULT_BOX, 0.0],
                [0.0, 0.0, DEFAULT_BOX],
            ],
            [false; 3],
        ),
    };

    // 3. Atoms
    let mut sites: Vec<SiteInput> = Vec::with_capacity(n_atoms);
    for line in lines.filter(|l| !l.trim().is_empty()).take(n_atoms) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(bad("atom line needs species and three coordinates"));
        }
        let mut position = [0.0; 3];
        for k in 0..3 {
            position[k] = parts[k + 1].parse().map_err(|_| bad("invalid coordinate"))?;
        }
        sites.push((parts[0].to_string(), None, position));
    }
    if sites.len() != n_atoms {
        return Err(bad(&format!("expected {} atoms, found {}", n_atoms, sites.len())));
    }

    StructureModel::new(lattice, sites, periodic).map_err(|e| bad(&e.to_string()))
}

fn quoted_value(comment: &str, key: &str) -> Option<String> {
    let start = comment.find(key)? + key.len();
    let remainder = comment[start..].strip_prefix('"')?;
    let end = remainder.find('"')?;
    Some(remainder[..end].to_string())
}

fn parse_pbc(flags: &str) -> Option<[bool; 3]> {
    let parsed: Vec<bool> = flags
        .split_whitespace()
        .map(|f| match f {
            "T" | "t" | "1" | "True" | "true" => Some(true),
            "F" | "f" | "0" | "False" | "false" => Some(false),
            _ => None,
        })
        .collect::<Option<_>>()?;
    parsed.try_into().ok()
}
