//! One plate followed over several time points.

use super::{LayoutTarget, SampleDefaults, SampleDesc};
use crate::error::IngestError;
use crate::well::{TimePoint, WellLabel};
use anyhow::Result;
use lab_sheet::read_first_worksheet;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::path::Path;

/// Rows E-H hold the induced copies of rows A-D.
const IPTG_ROW_SHIFT: u8 = 4;

lazy_static! {
    /// `<time>h` token of a lower-cased file stem: `4p5h`, `24h`, or `seed`.
    static ref FILE_TIME: Regex =
        Regex::new(r"(?:^|[_\s-])(seed|\d+(?:[.p]\d+)?h)(?:[_\s-]|$)").unwrap();
    /// `[<time>[h]] <well>`, where time may be `seed` or use `p` as decimal point.
    static ref SAMPLE_NAME: Regex =
        Regex::new(r"(?i)^(?:(seed|\d+(?:[.p]\d+)?)\s*h?\s+)?([a-z]\d+)$").unwrap();
}

/// Layout spreadsheet `layout<plate>.xlsx` listing `(well, strain)` rows for
/// rows A-D, mirrored under induction to rows E-H.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePlate;

/// Hours of a time token: `seed` is 0, `p` stands for the decimal point.
fn parse_time_token(token: &str) -> Option<f64> {
    let token = token.to_ascii_lowercase();
    if token == "seed" {
        return Some(0.0);
    }
    token.trim_end_matches('h').replace('p', ".").parse().ok()
}

pub(super) fn file_time_point(stem: &str) -> Option<TimePoint> {
    let token = FILE_TIME.captures(stem)?.get(1)?.as_str();
    parse_time_token(token).map(TimePoint::new)
}

/// Plate ID embedded in a layout file name: the stem after `layout`, without separators.
fn plate_from_file_name(path: &Path) -> Result<String, IngestError> {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let unrecognised = || IngestError::UnrecognisedLayoutName(stem.clone());
    let rest = match stem.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("layout") => &stem[6..],
        _ => return Err(unrecognised()),
    };
    let plate: String = rest
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect();
    if plate.is_empty() {
        return Err(unrecognised());
    }
    Ok(plate)
}

pub(super) fn read_layout_file(path: &Path, target: &mut LayoutTarget<'_>) -> Result<usize> {
    let plate = plate_from_file_name(path)?;
    let sheet = read_first_worksheet(path)?;
    let mut wells = Vec::new();
    for row in sheet.rows() {
        let Ok(well) = row.text(0).parse::<WellLabel>() else {
            continue;
        };
        let strain = row.text(1);
        if strain.is_empty() {
            debug!("{plate} {well} has no strain");
            continue;
        }
        let mirror = well
            .shifted(IPTG_ROW_SHIFT)
            .filter(|_| well.row() <= 'D')
            .ok_or_else(|| IngestError::CannotMirror {
                well: well.to_string(),
            })?;
        wells.push((well, mirror, strain));
    }

    let mut stored = 0;
    for (well, mirror, strain) in wells {
        stored += target.store_well(&plate, well, &strain, false);
        stored += target.store_well(&plate, mirror, &strain, true);
    }
    Ok(stored)
}

pub(super) fn parse_sample_name(text: &str, defaults: &SampleDefaults<'_>) -> Option<SampleDesc> {
    let captures = SAMPLE_NAME.captures(text.trim())?;
    let time = match captures.get(1) {
        Some(token) => TimePoint::new(parse_time_token(token.as_str())?),
        None => defaults.time,
    };
    let well = captures[2].to_ascii_uppercase().parse().ok()?;
    Some(SampleDesc {
        plate: defaults.plate?.to_string(),
        well,
        time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResultStore;
    use lab_sheet::testing::write_xlsx;
    use lab_sheet::Cell;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    const DEFAULTS: SampleDefaults<'static> = SampleDefaults {
        id_prefix: "",
        plate: Some("P3"),
        time: TimePoint::new(24.0),
    };

    fn sample(text: &str) -> Option<(String, f64)> {
        parse_sample_name(text, &DEFAULTS)
            .map(|desc| (desc.well.to_string(), desc.time.hours()))
    }

    #[test]
    fn test_parse_sample_name() {
        assert_eq!(sample("  4.5h A1"), Some(("A1".to_string(), 4.5)));
        assert_eq!(sample("24h H16  "), Some(("H16".to_string(), 24.0)));
        assert_eq!(sample("4P5H B2"), Some(("B2".to_string(), 4.5)));
        assert_eq!(sample("SEED C3"), Some(("C3".to_string(), 0.0)));
        assert_eq!(sample("12 D4"), Some(("D4".to_string(), 12.0)));
        assert_eq!(sample("E5"), Some(("E5".to_string(), 24.0)));
        assert_eq!(sample(""), None);
        assert_eq!(sample("BLANK"), None);
        assert_eq!(sample("4.5h"), None);
    }

    #[test]
    fn test_sample_needs_plate() {
        let defaults = SampleDefaults {
            plate: None,
            ..DEFAULTS
        };
        assert_eq!(parse_sample_name("4h A1", &defaults), None);
    }

    #[test]
    fn test_plate_from_file_name() {
        let plate = |name: &str| plate_from_file_name(Path::new(name));
        assert_eq!(plate("dir/layout_P3.xlsx"), Ok("P3".to_string()));
        assert_eq!(plate("Layout P-3.xlsx"), Ok("P3".to_string()));
        assert_eq!(
            plate("layout.xlsx"),
            Err(IngestError::UnrecognisedLayoutName("layout".to_string()))
        );
        assert!(plate("plan.xlsx").is_err());
    }

    #[test]
    fn test_read_layout_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("layout_P3.xlsx");
        write_xlsx(
            &path,
            "Layout",
            &[
                vec![text("Well"), text("Strain")],
                vec![text("A12"), text("1017  DlysA")],
                vec![text("D7"), text("1017 DthrC")],
                vec![text("B1")],
            ],
        )?;
        let mut store = ResultStore::new("");
        let times = [TimePoint::new(0.0), TimePoint::new(24.0)];
        let mut target = LayoutTarget {
            store: &mut store,
            time_points: &times,
        };
        assert_eq!(read_layout_file(&path, &mut target)?, 8);

        let experiment = store.experiment("P3").unwrap();
        assert_eq!(experiment.len(), 8);
        let a12 = experiment.get("A12".parse()?, TimePoint::new(0.0)).unwrap();
        assert_eq!(a12.strain(), "1017 DlysA");
        assert!(!a12.iptg());
        let e12 = experiment.get("E12".parse()?, TimePoint::new(24.0)).unwrap();
        assert_eq!(e12.strain(), "1017 DlysA");
        assert!(e12.iptg());
        assert_eq!(
            experiment.strain_for_well("H7".parse()?),
            Some("1017 DthrC +IPTG")
        );
        assert!(experiment.get("B1".parse()?, TimePoint::new(24.0)).is_none());
        Ok(())
    }

    #[test]
    fn test_layout_outside_mirrored_rows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("layoutP1.xlsx");
        write_xlsx(
            &path,
            "Layout",
            &[
                vec![text("A1"), text("1017")],
                vec![text("E1"), text("1017")],
            ],
        )?;
        let mut store = ResultStore::new("");
        let times = [TimePoint::new(24.0)];
        let mut target = LayoutTarget {
            store: &mut store,
            time_points: &times,
        };
        let err = read_layout_file(&path, &mut target).unwrap_err();
        assert_eq!(
            err.downcast_ref::<IngestError>(),
            Some(&IngestError::CannotMirror {
                well: "E1".to_string()
            })
        );
        assert!(store.is_empty());
        Ok(())
    }
}
