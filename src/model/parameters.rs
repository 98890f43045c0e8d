// src/model/parameters.rs

use super::structure::{SiteInput, StructureModel};
use super::subspecies::Subspecies;
use crate::error::{Error, Result};
use crate::utils::linalg::{frac_to_cart, lattice_from_lengths_and_angles};
use moyo::data::{HallSymbol, Setting};
use serde::{Deserialize, Serialize};

/// Fractional distance under which two symmetry images count as one site.
const DUPLICATE_EPS: f64 = 1e-3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatticeSpec {
    /// Rows are the lattice vectors a, b, c.
    Vectors([[f64; 3]; 3]),
    /// Lengths in Angstroms and angles (alpha, beta, gamma) in degrees.
    LengthsAndAngles { abc: [f64; 3], angles: [f64; 3] },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateMode {
    #[default]
    Fractional,
    Cartesian,
}

/// Explicit description of a crystal: what a structure file would otherwise
/// provide.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureParameters {
    pub lattice: LatticeSpec,
    pub coordinates: Vec<[f64; 3]>,
    #[serde(default)]
    pub coordinate_mode: CoordinateMode,
    pub species: Vec<String>,
    /// Optional label per coordinate; symmetry images inherit it.
    #[serde(default)]
    pub subspecies: Option<Vec<String>>,
    /// General positions in `x,y,z` notation. Empty means the space group's
    /// operations, or identity only if no space group is given.
    #[serde(default)]
    pub symmetry_operations: Vec<String>,
    /// International Tables number (1-230) in its standard setting. Ignored
    /// when `symmetry_operations` is non-empty.
    #[serde(default)]
    pub spacegroup: Option<i32>,
    #[serde(default = "all_periodic")]
    pub periodic: [bool; 3],
}

fn all_periodic() -> [bool; 3] {
    [true; 3]
}

impl StructureParameters {
    /// Parameters with an explicit lattice and fractional coordinates.
    pub fn new(lattice: [[f64; 3]; 3], species: Vec<String>, coordinates: Vec<[f64; 3]>) -> Self {
        StructureParameters {
            lattice: LatticeSpec::Vectors(lattice),
            coordinates,
            coordinate_mode: CoordinateMode::Fractional,
            species,
            subspecies: None,
            symmetry_operations: Vec::new(),
            spacegroup: None,
            periodic: all_periodic(),
        }
    }
}

impl StructureModel {
    /// Build a structure from explicit parameters, expanding the listed
    /// coordinates by the symmetry operations.
    pub fn from_parameters(params: &StructureParameters) -> Result<StructureModel> {
        if params.coordinates.len() != params.species.len() {
            return Err(Error::Configuration(format!(
                "{} coordinates but {} species",
                params.coordinates.len(),
                params.species.len()
            )));
        }
        if let Some(labels) = &params.subspecies {
            if labels.len() != params.coordinates.len() {
                return Err(Error::Configuration(format!(
                    "{} coordinates but {} subspecies labels",
                    params.coordinates.len(),
                    labels.len()
                )));
            }
        }

        let lattice = match &params.lattice {
            LatticeSpec::Vectors(rows) => *rows,
            LatticeSpec::LengthsAndAngles { abc, angles } => {
                if abc.iter().any(|&l| !(l > 0.0) || !l.is_finite()) {
                    return Err(Error::Configuration(format!(
                        "lattice lengths must be positive, got {:?}",
                        abc
                    )));
                }
                lattice_from_lengths_and_angles(*abc, *angles).ok_or_else(|| {
                    Error::Configuration(format!("lattice angles {:?} do not form a cell", angles))
                })?
            }
        };
        // Degenerate lattices are rejected before any coordinate conversion.
        let cell = StructureModel::new(lattice, Vec::new(), params.periodic)?;

        let operations = match (params.symmetry_operations.is_empty(), params.spacegroup) {
            (false, _) => params
                .symmetry_operations
                .iter()
                .map(|op| SymmetryOperation::parse(op))
                .collect::<Result<Vec<_>>>()?,
            (true, Some(number)) => SymmetryOperation::from_space_group(number)?,
            (true, None) => vec![SymmetryOperation::identity()],
        };

        let mut expanded: Vec<([f64; 3], usize)> = Vec::new();
        let mut merged = 0usize;
        for (source, coord) in params.coordinates.iter().enumerate() {
            let frac = match params.coordinate_mode {
                CoordinateMode::Fractional => *coord,
                CoordinateMode::Cartesian => cell.cartesian_to_fractional(*coord)?,
            };
            for op in &operations {
                let mut image = op.apply(frac);
                for k in 0..3 {
                    if params.periodic[k] {
                        image[k] = image[k].rem_euclid(1.0);
                    }
                }
                let duplicate = expanded
                    .iter()
                    .any(|(existing, _)| same_position(existing, &image, params.periodic));
                if duplicate {
                    merged += 1;
                } else {
                    expanded.push((image, source));
                }
            }
        }
        if operations.len() > 1 {
            log::debug!(
                "symmetry expansion: {} coordinates x {} operations -> {} sites ({} duplicates merged)",
                params.coordinates.len(),
                operations.len(),
                expanded.len(),
                merged
            );
        }

        let sites: Vec<SiteInput> = expanded
            .into_iter()
            .map(|(frac, source)| {
                let subspecies = params
                    .subspecies
                    .as_ref()
                    .map(|labels| Subspecies::new(labels[source].trim()));
                (
                    params.species[source].clone(),
                    subspecies,
                    frac_to_cart(frac, &lattice),
                )
            })
            .collect();

        StructureModel::new(lattice, sites, params.periodic)
    }

    fn cartesian_to_fractional(&self, cart: [f64; 3]) -> Result<[f64; 3]> {
        crate::utils::linalg::cart_to_frac(cart, self.lattice())
            .ok_or_else(|| Error::Configuration("lattice is not invertible".into()))
    }
}

fn same_position(a: &[f64; 3], b: &[f64; 3], periodic: [bool; 3]) -> bool {
    (0..3).all(|k| {
        let d = (a[k] - b[k]).abs();
        d < DUPLICATE_EPS || (periodic[k] && (1.0 - d) < DUPLICATE_EPS)
    })
}

/// Affine operation on fractional coordinates, parsed from `x,y,z` notation
/// such as `-y+1/2, x, z+0.25`.
#[derive(Clone, Debug, PartialEq)]
pub struct SymmetryOperation {
    rotation: [[f64; 3]; 3],
    translation: [f64; 3],
}

impl SymmetryOperation {
    pub fn identity() -> Self {
        SymmetryOperation {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// All operations of a space group modulo lattice translations, centering
    /// included, in the standard setting of the International Tables.
    pub fn from_space_group(number: i32) -> Result<Vec<Self>> {
        let hall = (1..=230)
            .contains(&number)
            .then(|| Setting::Standard.hall_number(number))
            .flatten()
            .and_then(HallSymbol::from_hall_number)
            .ok_or_else(|| Error::Configuration(format!("no space group with number {}", number)))?;

        let mut centerings = vec![[0.0; 3]];
        for t in &hall.centering_translations {
            let t = [t[0], t[1], t[2]];
            if t.iter().any(|v| v.abs() > DUPLICATE_EPS) {
                centerings.push(t);
            }
        }

        let mut operations = Vec::new();
        for op in hall.traverse() {
            let mut rotation = [[0.0; 3]; 3];
            for (r, row) in rotation.iter_mut().enumerate() {
                for (c, value) in row.iter_mut().enumerate() {
                    *value = op.rotation[(r, c)] as f64;
                }
            }
            for centering in &centerings {
                let translation = [
                    op.translation[0] + centering[0],
                    op.translation[1] + centering[1],
                    op.translation[2] + centering[2],
                ];
                operations.push(SymmetryOperation { rotation, translation });
            }
        }
        log::debug!("space group {}: {} operations", number, operations.len());
        Ok(operations)
    }

    pub fn parse(op: &str) -> Result<Self> {
        let cleaned: String = op
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '"')
            .collect::<String>()
            .to_lowercase();
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() != 3 {
            return Err(Error::Configuration(format!(
                "symmetry operation '{}' must have three components",
                op
            )));
        }

        let mut rotation = [[0.0; 3]; 3];
        let mut translation = [0.0; 3];
        for (row, expr) in parts.iter().enumerate() {
            let (coeffs, constant) = parse_component(expr)
                .ok_or_else(|| Error::Configuration(format!("cannot parse symmetry operation '{}'", op)))?;
            rotation[row] = coeffs;
            translation[row] = constant;
        }
        Ok(SymmetryOperation {
            rotation,
            translation,
        })
    }

    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let mut out = self.translation;
        for (row, value) in out.iter_mut().enumerate() {
            for col in 0..3 {
                *value += self.rotation[row][col] * p[col];
            }
        }
        out
    }
}

/// Splits one component into signed terms and accumulates variable
/// coefficients and the constant shift.
fn parse_component(expr: &str) -> Option<([f64; 3], f64)> {
    if expr.is_empty() {
        return None;
    }
    let mut coeffs = [0.0; 3];
    let mut constant = 0.0;

    let mut terms = Vec::new();
    let mut current = String::new();
    for c in expr.chars() {
        if (c == '+' || c == '-') && !current.is_empty() {
            terms.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    terms.push(current);

    for term in terms {
        let (sign, body) = match term.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, term.strip_prefix('+').unwrap_or(&term)),
        };
        if body.is_empty() {
            return None;
        }
        let axis = match body.chars().last() {
            Some('x') => Some(0),
            Some('y') => Some(1),
            Some('z') => Some(2),
            _ => None,
        };
        match axis {
            Some(k) => {
                let factor = &body[..body.len() - 1];
                let factor = factor.strip_suffix('*').unwrap_or(factor);
                let value = if factor.is_empty() { 1.0 } else { parse_number(factor)? };
                coeffs[k] += sign * value;
            }
            None => constant += sign * parse_number(body)?,
        }
    }
    Some((coeffs, constant))
}

fn parse_number(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num.parse::<f64>().ok()? / den)
        }
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bcc_params() -> StructureParameters {
        StructureParameters {
            lattice: LatticeSpec::LengthsAndAngles {
                abc: [2.87, 2.87, 2.87],
                angles: [90.0, 90.0, 90.0],
            },
            coordinates: vec![[0.0, 0.0, 0.0]],
            coordinate_mode: CoordinateMode::Fractional,
            species: vec!["Fe".into()],
            subspecies: None,
            symmetry_operations: vec!["x,y,z".into(), "x+1/2,y+1/2,z+1/2".into()],
            spacegroup: None,
            periodic: [true; 3],
        }
    }

    #[test]
    fn test_parse_operation() {
        let op = SymmetryOperation::parse("-y+1/2, x, z+0.25").unwrap();
        let p = op.apply([0.1, 0.2, 0.3]);
        assert!((p[0] - 0.3).abs() < 1e-12);
        assert!((p[1] - 0.1).abs() < 1e-12);
        assert!((p[2] - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_parse_operation_leading_constant() {
        let op = SymmetryOperation::parse("1/2-x,'y',2*z").unwrap();
        let p = op.apply([0.1, 0.2, 0.3]);
        assert!((p[0] - 0.4).abs() < 1e-12);
        assert!((p[1] - 0.2).abs() < 1e-12);
        assert!((p[2] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_operation() {
        assert!(SymmetryOperation::parse("x,y").is_err());
        assert!(SymmetryOperation::parse("x,y,q").is_err());
        assert!(SymmetryOperation::parse("x,y,1/0").is_err());
    }

    #[test]
    fn test_bcc_expansion() {
        let s = StructureModel::from_parameters(&bcc_params()).unwrap();
        assert_eq!(s.num_sites(), 2);
        let body = s.sites()[1].position();
        assert!((body[0] - 1.435).abs() < 1e-9);
    }

    #[test]
    fn test_space_group_generates_operations() {
        let mut params = bcc_params();
        params.symmetry_operations.clear();
        params.spacegroup = Some(229);
        let s = StructureModel::from_parameters(&params).unwrap();
        assert_eq!(s.num_sites(), 2);
        assert_eq!(SymmetryOperation::from_space_group(229).unwrap().len(), 96);

        let mut rocksalt = StructureParameters::new(
            [[5.64, 0.0, 0.0], [0.0, 5.64, 0.0], [0.0, 0.0, 5.64]],
            vec!["Na".into(), "Cl".into()],
            vec![[0.0; 3], [0.5; 3]],
        );
        rocksalt.spacegroup = Some(225);
        let s = StructureModel::from_parameters(&rocksalt).unwrap();
        assert_eq!(s.num_sites(), 8);
        assert_eq!(s.sites().iter().filter(|x| x.species() == "Cl").count(), 4);
    }

    #[test]
    fn test_explicit_operations_override_space_group() {
        let mut params = bcc_params();
        params.symmetry_operations = vec!["x,y,z".into()];
        params.spacegroup = Some(229);
        let s = StructureModel::from_parameters(&params).unwrap();
        assert_eq!(s.num_sites(), 1);
    }

    #[test]
    fn test_unknown_space_group() {
        for number in [0, 231, -5] {
            assert!(matches!(
                SymmetryOperation::from_space_group(number),
                Err(Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_duplicate_images_merge() {
        let mut params = bcc_params();
        params.symmetry_operations.push("-x,-y,-z".into());
        let s = StructureModel::from_parameters(&params).unwrap();
        assert_eq!(s.num_sites(), 2);
    }

    #[test]
    fn test_subspecies_inherited_by_images() {
        let mut params = bcc_params();
        params.subspecies = Some(vec!["Fe_up".into()]);
        let s = StructureModel::from_parameters(&params).unwrap();
        assert!(s.sites().iter().all(|site| site.subspecies().as_str() == "Fe_up"));
    }

    #[test]
    fn test_count_mismatch() {
        let mut params = bcc_params();
        params.species.push("O".into());
        assert!(matches!(
            StructureModel::from_parameters(&params),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_degenerate_lattice() {
        let params = StructureParameters::new(
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1e-12]],
            vec!["Fe".into()],
            vec![[0.0; 3]],
        );
        assert!(matches!(
            StructureModel::from_parameters(&params),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_cartesian_mode() {
        let mut params = StructureParameters::new(
            [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]],
            vec!["O".into()],
            vec![[1.0, 2.0, 3.0]],
        );
        params.coordinate_mode = CoordinateMode::Cartesian;
        let s = StructureModel::from_parameters(&params).unwrap();
        let p = s.sites()[0].position();
        assert!((p[0] - 1.0).abs() < 1e-12 && (p[1] - 2.0).abs() < 1e-12 && (p[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_parameters_deserialize_with_defaults() {
        let json = r#"{
            "lattice": {"vectors": [[3,0,0],[0,3,0],[0,0,3]]},
            "coordinates": [[0,0,0]],
            "species": ["Ni"]
        }"#;
        let params: StructureParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.periodic, [true; 3]);
        assert!(params.symmetry_operations.is_empty());
        assert_eq!(params.spacegroup, None);
        assert_eq!(StructureModel::from_parameters(&params).unwrap().num_sites(), 1);
    }
}
