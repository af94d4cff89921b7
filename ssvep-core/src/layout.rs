//! Textual patch layout: rows separated by `;`, fields by `,`,
//! columns `index, name, x, y, w, h, omega, phi`.

use crate::error::{DisplayError, Result};
use crate::stimulus::PatchSpec;
use std::collections::HashSet;

const FIELD_COUNT: usize = 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    patches: Vec<PatchSpec>,
}

pub fn parse_layout(text: &str) -> Result<Layout> {
    let mut patches = Vec::new();
    let mut seen = HashSet::new();

    for (row_no, row) in text.split(';').enumerate() {
        if row.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() != FIELD_COUNT {
            return Err(DisplayError::format(format!(
                "row {row_no} has {} fields, expected {FIELD_COUNT}: `{}`",
                fields.len(),
                row.trim()
            )));
        }

        let name = fields[1];
        if name.is_empty() {
            return Err(DisplayError::format(format!("row {row_no} has an empty name")));
        }
        if !seen.insert(name.to_string()) {
            return Err(DisplayError::format(format!(
                "row {row_no} repeats patch name `{name}`"
            )));
        }

        let num = |col: usize, label: &str| -> Result<f64> {
            fields[col].parse::<f64>().map_err(|_| {
                DisplayError::format(format!(
                    "row {row_no} column `{label}` is not a number: `{}`",
                    fields[col]
                ))
            })
        };

        patches.push(PatchSpec {
            id: fields[0].to_string(),
            name: name.to_string(),
            center_x: num(2, "x")?,
            center_y: num(3, "y")?,
            width: num(4, "w")?,
            height: num(5, "h")?,
            omega: num(6, "omega")?,
            phi: num(7, "phi")?,
        });
    }

    if patches.is_empty() {
        return Err(DisplayError::format("layout text contains no patches"));
    }
    Ok(Layout { patches })
}

impl Layout {
    pub fn patches(&self) -> &[PatchSpec] {
        &self.patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patches.iter().map(|p| p.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&PatchSpec> {
        self.patches.iter().find(|p| p.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// Serializes back to layout text. `f64` display is shortest-roundtrip,
    /// so parsing the output restores every number exactly.
    pub fn to_text(&self) -> String {
        self.patches
            .iter()
            .map(|p| {
                format!(
                    "{},{},{},{},{},{},{},{}",
                    p.id, p.name, p.center_x, p.center_y, p.width, p.height, p.omega, p.phi
                )
            })
            .collect::<Vec<_>>()
            .join(";\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row() {
        let layout = parse_layout("0,A,100,100,50,50,1.0,0.0").unwrap();
        assert_eq!(layout.len(), 1);
        let a = layout.get("A").unwrap();
        assert_eq!(a.id, "0");
        assert_eq!((a.center_x, a.center_y, a.width, a.height), (100.0, 100.0, 50.0, 50.0));
        assert_eq!((a.omega, a.phi), (1.0, 0.0));
    }

    #[test]
    fn test_whitespace_and_trailing_separator() {
        let text = " 0 , A , 1 , 2 , 3 , 4 , 5 , 6 ;\n 1,B,7,8,9,10,11.5,-0.25 ;\n";
        let layout = parse_layout(text).unwrap();
        assert_eq!(layout.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(layout.get("B").unwrap().phi, -0.25);
        assert_eq!(layout.index_of("B"), Some(1));
    }

    #[test]
    fn test_wrong_field_count_is_format_error() {
        let err = parse_layout("0,A,100,100,50").unwrap_err();
        assert!(matches!(err, DisplayError::Format(_)));
        assert!(err.to_string().contains("5 fields"));
    }

    #[test]
    fn test_non_numeric_field() {
        let err = parse_layout("0,A,100,abc,50,50,1,0").unwrap_err();
        assert!(matches!(err, DisplayError::Format(ref m) if m.contains("`y`")));
    }

    #[test]
    fn test_duplicate_and_empty() {
        assert!(parse_layout("0,A,1,1,1,1,1,1;1,A,2,2,2,2,2,2").is_err());
        assert!(parse_layout(" ; ").is_err());
        assert!(parse_layout("0,,1,1,1,1,1,1").is_err());
    }

    #[test]
    fn test_text_round_trip_preserves_numbers() {
        let text = "0,p-0,960.5,540.125,120,80,62.83185307179586,0.1;\
                    1,p-1,0.1,0.2,0.3,1e-7,-3.3333333333333335,1.5707963267948966";
        let layout = parse_layout(text).unwrap();
        let again = parse_layout(&layout.to_text()).unwrap();
        assert_eq!(layout, again);
    }
}
