use std::collections::HashMap;

use super::domain::CatalogEntry;

/// Width of the trend window attached to every candidate.
pub const TREND_WINDOW: usize = 3;

/// Most recent rows for a university/department, newest first. Rows sharing a
/// year keep their catalog order.
pub fn group_history(
    catalog: &[CatalogEntry],
    university: &str,
    department: &str,
) -> Vec<CatalogEntry> {
    let mut rows: Vec<&CatalogEntry> = catalog
        .iter()
        .filter(|entry| entry.matches(university, department))
        .collect();
    newest_first(&mut rows);
    rows.into_iter().take(TREND_WINDOW).cloned().collect()
}

fn newest_first(rows: &mut [&CatalogEntry]) {
    rows.sort_by(|a, b| b.year.cmp(&a.year));
}

/// Catalog pre-grouped by university/department so a full ranking pass does
/// not rescan the catalog once per entry.
#[derive(Debug)]
pub struct HistoryIndex<'a> {
    groups: HashMap<(&'a str, &'a str), Vec<&'a CatalogEntry>>,
}

impl<'a> HistoryIndex<'a> {
    pub fn build(catalog: &'a [CatalogEntry]) -> Self {
        let mut groups: HashMap<(&'a str, &'a str), Vec<&'a CatalogEntry>> = HashMap::new();
        for entry in catalog {
            groups
                .entry((entry.university.as_str(), entry.department.as_str()))
                .or_default()
                .push(entry);
        }
        for rows in groups.values_mut() {
            newest_first(rows);
        }
        Self { groups }
    }

    pub fn recent(&self, university: &str, department: &str) -> Vec<CatalogEntry> {
        self.groups
            .get(&(university, department))
            .map(|rows| rows.iter().take(TREND_WINDOW).map(|row| (*row).clone()).collect())
            .unwrap_or_default()
    }

    /// Newest row of the group, if any.
    pub fn latest(&self, university: &str, department: &str) -> Option<&'a CatalogEntry> {
        self.groups
            .get(&(university, department))
            .and_then(|rows| rows.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admissions::domain::AdmissionTrack;

    fn row(university: &str, department: &str, year: i32, cutoff: f64) -> CatalogEntry {
        CatalogEntry {
            university: university.to_string(),
            department: department.to_string(),
            track: AdmissionTrack::Rolling,
            sub_group: None,
            year,
            cutoff_at_50pct: cutoff,
            cutoff_at_70pct: cutoff,
            recruitment_count: 20,
            competition_rate: 8.0,
            real_competition_rate: 8.0,
            region: None,
            category: None,
            admission_type: None,
            subject_scores: None,
        }
    }

    fn sample() -> Vec<CatalogEntry> {
        vec![
            row("연세대학교", "경제학부", 2021, 1.9),
            row("연세대학교", "경제학부", 2024, 1.8),
            row("고려대학교", "경제학과", 2024, 1.7),
            row("연세대학교", "경제학부", 2022, 2.0),
            row("연세대학교", "경제학부", 2023, 1.6),
        ]
    }

    #[test]
    fn keeps_three_newest_years_descending() {
        let history = group_history(&sample(), "연세대학교", "경제학부");
        let years: Vec<i32> = history.iter().map(|entry| entry.year).collect();
        assert_eq!(years, vec![2024, 2023, 2022]);
    }

    #[test]
    fn unknown_department_yields_empty_window() {
        assert!(group_history(&sample(), "연세대학교", "의예과").is_empty());
    }

    #[test]
    fn duplicate_years_preserve_input_order() {
        let catalog = vec![
            row("서울대학교", "경영학과", 2024, 1.1),
            row("서울대학교", "경영학과", 2023, 1.4),
            row("서울대학교", "경영학과", 2024, 1.2),
            row("서울대학교", "경영학과", 2024, 1.3),
        ];
        let history = group_history(&catalog, "서울대학교", "경영학과");
        let cutoffs: Vec<f64> = history.iter().map(|entry| entry.cutoff_at_70pct).collect();
        assert_eq!(cutoffs, vec![1.1, 1.2, 1.3]);
    }

    #[test]
    fn index_matches_linear_grouping() {
        let catalog = sample();
        let index = HistoryIndex::build(&catalog);
        assert_eq!(
            index.recent("연세대학교", "경제학부"),
            group_history(&catalog, "연세대학교", "경제학부")
        );
        assert_eq!(
            index.latest("고려대학교", "경제학과").map(|entry| entry.year),
            Some(2024)
        );
        assert!(index.recent("없는대학교", "경제학과").is_empty());
    }
}
