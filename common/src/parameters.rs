use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::CommonError,
    waves::{DetectorParameters, WaveParameters},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TomlParameters {
    /// Name of run (used for output directory)
    pub sim_name: String,
    /// Kinetic energy of the beam [eV]
    pub energy: f64,
    /// Lateral extent of the grid [Å]
    pub extent: Option<PerAxis<f64>>,
    /// Number of grid points
    pub gpts: Option<PerAxis<usize>>,
    /// Real space sampling [Å]
    pub sampling: Option<PerAxis<f64>>,
    /// Which wave builder to run
    pub waves: WaveParameters,
    /// Optional annular detector applied to the built waves
    pub detector: Option<DetectorParameters>,
}

/// A per-axis quantity, given either once for both axes or as an `[x, y]` pair.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum PerAxis<T> {
    Uniform(T),
    Axes([T; 2]),
}

impl<T: Copy> PerAxis<T> {
    pub fn to_array(self) -> [T; 2] {
        match self {
            PerAxis::Uniform(value) => [value; 2],
            PerAxis::Axes(values) => values,
        }
    }
}

impl From<f64> for PerAxis<f64> {
    fn from(value: f64) -> Self {
        PerAxis::Uniform(value)
    }
}

impl From<[f64; 2]> for PerAxis<f64> {
    fn from(values: [f64; 2]) -> Self {
        PerAxis::Axes(values)
    }
}

impl From<usize> for PerAxis<usize> {
    fn from(value: usize) -> Self {
        PerAxis::Uniform(value)
    }
}

impl From<[usize; 2]> for PerAxis<usize> {
    fn from(values: [usize; 2]) -> Self {
        PerAxis::Axes(values)
    }
}

/// This function reads toml files
pub fn read_toml(path: &str) -> Result<TomlParameters, CommonError> {
    // Read toml config file
    let toml_contents: &str =
        &std::fs::read_to_string(path).map_err(|_| CommonError::TomlReadError {
            path: path.to_string(),
        })?;

    parse_toml(toml_contents)
}

pub fn parse_toml(toml_contents: &str) -> Result<TomlParameters, CommonError> {
    toml::from_str(toml_contents).map_err(|e| CommonError::TomlParseError {
        msg: format!("{e:?}"),
    })
}

pub(crate) fn deserialize_positions<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<[f64; 2]>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let parsed_string = String::deserialize(deserializer)?;
    parse_positions(&parsed_string)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

pub(crate) fn serialize_positions<S>(
    positions: &Option<Vec<[f64; 2]>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match positions {
        Some(positions) => serializer.serialize_str(&format_positions(positions)),
        None => serializer.serialize_none(),
    }
}

/// Parses a list of probe positions written as `(x, y)` pairs, e.g.
/// `"(0, 0), (2.5, 2.5), [5, 5]"`. Pairs may also use square brackets and
/// the whole list may be wrapped in brackets.
///
/// NOTE: this compiles the regex internally, so it should not be called in a loop.
pub fn parse_positions(s: &str) -> Result<Vec<[f64; 2]>, CommonError> {
    let pair = Regex::new(r"[(\[]\s*([^,()\[\]\s]+)\s*,\s*([^,()\[\]\s]+)\s*[)\]]").map_err(
        |e| CommonError::PositionParseError {
            msg: e.to_string(),
        },
    )?;

    let mut positions = vec![];
    for captures in pair.captures_iter(s) {
        let coordinate = |i: usize| -> Result<f64, CommonError> {
            let text = captures.get(i).map(|m| m.as_str()).unwrap_or_default();
            text.parse::<f64>()
                .map_err(|_| CommonError::PositionParseError {
                    msg: format!("`{text}` is not a number"),
                })
        };
        positions.push([coordinate(1)?, coordinate(2)?]);
    }

    // Anything left over besides separators is malformed
    let leftover = pair.replace_all(s, "");
    if let Some(c) = leftover
        .chars()
        .find(|c| !(c.is_whitespace() || matches!(c, ',' | '[' | ']')))
    {
        return Err(CommonError::PositionParseError {
            msg: format!("unexpected character `{c}` in `{s}`"),
        });
    }

    if positions.is_empty() {
        return Err(CommonError::PositionParseError {
            msg: "expected at least one position: (x1, y1), (x2, y2), ...".to_string(),
        });
    }

    Ok(positions)
}

pub fn format_positions(positions: &[[f64; 2]]) -> String {
    positions
        .iter()
        .map(|[x, y]| format!("({x:?}, {y:?})"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[test]
fn test_regex_parenthesized_pairs() {
    let sample = "(0, 0), (2.5, 2.5), (5, 5)";
    let positions = parse_positions(sample).unwrap();
    assert_eq!(positions, vec![[0.0, 0.0], [2.5, 2.5], [5.0, 5.0]]);
}

#[test]
fn test_regex_bracketed_pairs() {
    let sample = "[[1, -3.5e-1], [2e1, 4]]";
    let positions = parse_positions(sample).unwrap();
    assert_eq!(positions, vec![[1.0, -0.35], [20.0, 4.0]]);
}

#[test]
fn test_regex_rejects_garbage() {
    assert!(parse_positions("(1, 2), oops").is_err());
    assert!(parse_positions("(1, a)").is_err());
    assert!(parse_positions("").is_err());
}

#[test]
fn test_format_positions_parses_back() {
    let positions = vec![[0.0, 1.25], [-3.0, 4.5]];
    assert_eq!(
        parse_positions(&format_positions(&positions)).unwrap(),
        positions
    );
}

#[test]
fn test_parse_probe_toml() {
    let contents = r#"
        sim_name = "probe-scan"
        energy = 300e3
        extent = 10.0
        gpts = [256, 128]

        [waves]
        type = "Probe"
        semiangle_cutoff = 20.0
        focal_spread = 30.0
        defocus = 50.0
        positions = "(0, 0), (2.5, 2.5), (5, 5)"
        aberrations = { Cs = -1e4, C12 = 20.0 }

        [detector]
        inner = 50.0
        outer = 150.0
    "#;
    let toml = parse_toml(contents).unwrap();

    assert_eq!(toml.extent, Some(PerAxis::Uniform(10.0)));
    assert_eq!(toml.gpts.map(PerAxis::to_array), Some([256, 128]));
    assert_eq!(toml.sampling, None);
    match toml.waves {
        WaveParameters::Probe {
            semiangle_cutoff,
            ref positions,
            ref aberrations,
            ..
        } => {
            assert_eq!(semiangle_cutoff, Some(20.0));
            assert_eq!(positions.as_ref().map(Vec::len), Some(3));
            assert_eq!(aberrations.get("Cs"), Some(&-1e4));
        }
        _ => panic!("expected a probe"),
    }
    assert_eq!(toml.detector.map(|d| d.outer), Some(150.0));
}

#[test]
fn test_parse_plane_wave_toml() {
    let contents = r#"
        sim_name = "plane"
        energy = 200000.0
        sampling = 0.05
        gpts = 64

        [waves]
        type = "PlaneWave"
    "#;
    let toml = parse_toml(contents).unwrap();

    assert_eq!(toml.waves, WaveParameters::PlaneWave);
    assert_eq!(toml.sampling.map(PerAxis::to_array), Some([0.05, 0.05]));
    assert!(toml.detector.is_none());
}
