// src/io/poscar.rs

use crate::error::{Error, Result};
use crate::model::{SiteInput, StructureModel};
use crate::utils::linalg::{determinant, frac_to_cart};
use std::path::Path;

/// Parse VASP POSCAR/CONTCAR text. VASP 4 files without a species line take
/// species names from the comment line when the counts line up.
pub fn parse_str(text: &str, path: &Path) -> Result<StructureModel> {
    let bad = |reason: &str| Error::input_format(path, reason);
    let mut lines = text.lines();

    let comment = lines.next().ok_or_else(|| bad("empty file"))?;

    // Scale (negative means target volume)
    let scale_line = lines.next().ok_or_else(|| bad("missing scale line"))?;
    let scale: f64 = first_token(scale_line)
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| bad("invalid scale factor"))?;

    // Lattice
    let mut lattice = [[0.0; 3]; 3];
    for row in lattice.iter_mut() {
        let line = lines.next().ok_or_else(|| bad("missing lattice vector"))?;
        *row = parse_triplet(line).ok_or_else(|| bad("invalid lattice vector"))?;
    }
    let factor = if scale < 0.0 {
        let volume = determinant(&lattice).abs();
        if volume == 0.0 {
            return Err(bad("zero cell volume with volume scaling"));
        }
        (scale.abs() / volume).cbrt()
    } else {
        scale
    };
    for row in lattice.iter_mut() {
        for x in row.iter_mut() {
            *x *= factor;
        }
    }

    // Elements & Counts
    let line6 = lines.next().ok_or_else(|| bad("missing species or counts line"))?;
    let starts_alpha = line6.trim().chars().next().map_or(false, |c| c.is_alphabetic());
    let (element_names, counts_line): (Vec<String>, &str) = if starts_alpha {
        let counts = lines.next().ok_or_else(|| bad("missing counts line"))?;
        (line6.split_whitespace().map(clean_species).collect(), counts)
    } else {
        (comment.split_whitespace().map(clean_species).collect(), line6)
    };
    let counts: Vec<usize> = counts_line
        .split_whitespace()
        .map(|x| x.parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| bad("invalid species counts"))?;
    let element_names = if element_names.len() == counts.len() {
        element_names
    } else {
        log::warn!(
            "{}: no species names for {} species, using placeholders",
            path.display(),
            counts.len()
        );
        (1..=counts.len()).map(|i| format!("X{}", i)).collect()
    };

    // Mode (optional selective dynamics line first)
    let mut mode_line = lines.next().ok_or_else(|| bad("missing coordinate mode"))?;
    if mode_line.trim().to_lowercase().starts_with('s') {
        mode_line = lines.next().ok_or_else(|| bad("missing coordinate mode"))?;
    }
    let mode = mode_line.trim().to_lowercase();
    let is_direct = !(mode.starts_with('c') || mode.starts_with('k'));

    // Atoms
    let mut sites: Vec<SiteInput> = Vec::with_capacity(counts.iter().sum());
    for (name, &count) in element_names.iter().zip(&counts) {
        for _ in 0..count {
            let line = lines.next().ok_or_else(|| bad("missing atom position"))?;
            let p = parse_triplet(line).ok_or_else(|| bad("invalid atom position"))?;
            let position = if is_direct {
                frac_to_cart(p, &lattice)
            } else {
                [p[0] * factor, p[1] * factor, p[2] * factor]
            };
            sites.push((name.clone(), None, position));
        }
    }

    StructureModel::new(lattice, sites, [true; 3]).map_err(|e| bad(&e.to_string()))
}

fn first_token(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

fn parse_triplet(line: &str) -> Option<[f64; 3]> {
    let mut parts = line.split_whitespace().map(|t| t.parse::<f64>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    Some([x, y, z])
}

/// POTCAR-style names like `Fe_pv` or `Mn/abc` reduce to the element.
fn clean_species(token: &str) -> String {
    token
        .split(|c| c == '_' || c == '/')
        .next()
        .unwrap_or(token)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FE_BCC: &str = "\
bcc Fe
2.87
 1.0 0.0 0.0
 0.0 1.0 0.0
 0.0 0.0 1.0
Fe
2
Direct
 0.0 0.0 0.0
 0.5 0.5 0.5
";

    #[test]
    fn test_parse_direct() {
        let s = parse_str(FE_BCC, Path::new("POSCAR")).unwrap();
        assert_eq!(s.num_sites(), 2);
        assert!((s.lattice()[0][0] - 2.87).abs() < 1e-12);
        assert!((s.sites()[1].position()[2] - 1.435).abs() < 1e-12);
        assert_eq!(s.sites()[0].species(), "Fe");
    }

    #[test]
    fn test_direct_and_cartesian_agree() {
        // Cartesian positions are multiplied by the scale factor too, so on a
        // unit-vector lattice both modes read the same numbers.
        let cart = FE_BCC.replace("Direct", "Cartesian");
        let s_direct = parse_str(FE_BCC, Path::new("POSCAR")).unwrap();
        let s_cart = parse_str(&cart, Path::new("POSCAR")).unwrap();
        for (a, b) in s_direct.sites().iter().zip(s_cart.sites()) {
            for k in 0..3 {
                assert!((a.position()[k] - b.position()[k]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_vasp4_species_from_comment() {
        let text = "Mn O\n1.0\n4 0 0\n0 4 0\n0 0 4\n1 1\nSelective dynamics\nDirect\n0 0 0 T T T\n0.5 0.5 0.5 T T T\n";
        let s = parse_str(text, Path::new("CONTCAR")).unwrap();
        assert_eq!(s.sites()[0].species(), "Mn");
        assert_eq!(s.sites()[1].species(), "O");
    }

    #[test]
    fn test_potcar_suffix_stripped() {
        let text = FE_BCC.replace("\nFe\n", "\nFe_pv\n");
        let s = parse_str(&text, Path::new("POSCAR")).unwrap();
        assert_eq!(s.sites()[0].species(), "Fe");
    }

    #[test]
    fn test_truncated_file_is_input_format_error() {
        let truncated: String = FE_BCC.lines().take(8).collect::<Vec<_>>().join("\n");
        let err = parse_str(&truncated, Path::new("POSCAR")).unwrap_err();
        assert!(matches!(err, Error::InputFormat { .. }));
    }

    #[test]
    fn test_garbage_scale() {
        let text = FE_BCC.replace("2.87", "abc");
        assert!(matches!(
            parse_str(&text, Path::new("POSCAR")),
            Err(Error::InputFormat { .. })
        ));
    }
}
