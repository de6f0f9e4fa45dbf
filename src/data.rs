// =============================================================================
// Data Loader / Filter
// =============================================================================
//
// Survey tables come in "wide" format: one row per population, metadata
// columns (genus, species, country) plus one column per survey year.
// The models want "long" format: one (year, population) pair per row.
//
// This module does the reshape and the filtering:
//
//   1. Parse the header, locating the metadata columns and every column
//      whose label contains a survey year (labels like "1974" or "X1974"
//      both work - some exports prefix year columns to keep them from
//      being valid identifiers).
//   2. Keep only rows matching the species/country selector
//      (case-insensitive).
//   3. Melt the year columns of the kept rows into observations,
//      dropping cells that are empty, non-numeric, or exactly zero.
//
// ZERO IS NOT A COUNT
// -------------------
// In these tables a population of 0 means "not surveyed that year", not
// "locally extinct". Zero cells are therefore excluded exactly like
// nulls. This is a deliberate, documented policy of the source data.
//
// The independent variable handed to the models is the scaled year,
// year − 1974, so the intercept is interpretable as the expected
// population in the first survey year rather than in year 0 AD.
//
// =============================================================================

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::error::{PopTrendError, Result};

/// Base year subtracted from calendar years to form `scaled_year`.
pub const BASE_YEAR: i32 = 1974;

// =============================================================================
// Types
// =============================================================================

/// One surveyed (year, population) pair for the selected population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Calendar year of the survey.
    pub year: i32,
    /// `year − BASE_YEAR`; the model's independent variable.
    pub scaled_year: i32,
    /// Surveyed population count. Always strictly positive: zero and
    /// missing cells are excluded during loading.
    pub population: f64,
}

impl Observation {
    /// Build an observation, deriving `scaled_year` from the calendar year.
    pub fn new(year: i32, population: f64) -> Self {
        Self {
            year,
            scaled_year: year - BASE_YEAR,
            population,
        }
    }
}

/// Which population to extract from the wide table.
///
/// All three fields match case-insensitively against the metadata
/// columns of the same name.
#[derive(Debug, Clone)]
pub struct SpeciesSelector {
    pub genus: String,
    pub species: String,
    pub country: String,
}

impl SpeciesSelector {
    pub fn new(
        genus: impl Into<String>,
        species: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            genus: genus.into(),
            species: species.into(),
            country: country.into(),
        }
    }

    fn matches(&self, genus: &str, species: &str, country: &str) -> bool {
        genus.eq_ignore_ascii_case(&self.genus)
            && species.eq_ignore_ascii_case(&self.species)
            && country.eq_ignore_ascii_case(&self.country)
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Load the observations for one species/country from a wide-format CSV
/// file.
///
/// # Errors
/// [`PopTrendError::DataNotFound`] if no usable observation survives the
/// filter; IO and CSV errors propagate.
pub fn load_observations(
    path: impl AsRef<Path>,
    selector: &SpeciesSelector,
) -> Result<Vec<Observation>> {
    let file = File::open(path)?;
    observations_from_reader(BufReader::new(file), selector)
}

/// Same as [`load_observations`] but over any reader, so tests can feed
/// in-memory CSV text.
pub fn observations_from_reader<R: io::Read>(
    reader: R,
    selector: &SpeciesSelector,
) -> Result<Vec<Observation>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();

    let mut genus_idx = None;
    let mut species_idx = None;
    let mut country_idx = None;
    let mut year_columns: Vec<(usize, i32)> = Vec::new();

    for (i, label) in headers.iter().enumerate() {
        match label.to_ascii_lowercase().as_str() {
            "genus" => genus_idx = Some(i),
            "species" => species_idx = Some(i),
            "country" => country_idx = Some(i),
            _ => {
                if let Some(year) = parse_year_label(label) {
                    year_columns.push((i, year));
                }
            }
        }
    }

    let genus_idx = require_column(genus_idx, "genus")?;
    let species_idx = require_column(species_idx, "species")?;
    let country_idx = require_column(country_idx, "country")?;
    if year_columns.is_empty() {
        return Err(PopTrendError::InvalidValue(
            "dataset has no survey-year columns".to_string(),
        ));
    }

    let mut observations = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let genus = record.get(genus_idx).unwrap_or("");
        let species = record.get(species_idx).unwrap_or("");
        let country = record.get(country_idx).unwrap_or("");
        if !selector.matches(genus, species, country) {
            continue;
        }
        for &(col, year) in &year_columns {
            if let Some(population) = parse_population(record.get(col)) {
                observations.push(Observation::new(year, population));
            }
        }
    }

    observations.sort_by_key(|o| o.year);

    if observations.is_empty() {
        return Err(PopTrendError::DataNotFound {
            genus: selector.genus.clone(),
            species: selector.species.clone(),
            country: selector.country.clone(),
        });
    }

    log::debug!(
        "loaded {} observations spanning {}-{}",
        observations.len(),
        observations.first().map(|o| o.year).unwrap_or_default(),
        observations.last().map(|o| o.year).unwrap_or_default(),
    );

    Ok(observations)
}

fn require_column(idx: Option<usize>, name: &str) -> Result<usize> {
    idx.ok_or_else(|| PopTrendError::InvalidValue(format!("dataset has no '{name}' column")))
}

/// Extract a survey year from a column label, tolerating non-numeric
/// prefixes ("X1974", "yr_1974"). Labels without a plausible 4-digit
/// year are not year columns.
fn parse_year_label(label: &str) -> Option<i32> {
    let digits: String = label.chars().skip_while(|c| !c.is_ascii_digit()).collect();
    let year: i32 = digits.parse().ok()?;
    (1000..=2999).contains(&year).then_some(year)
}

/// Parse one population cell. Empty, non-numeric, NA/NULL markers and
/// zero all mean "no usable survey" and yield `None`.
fn parse_population(field: Option<&str>) -> Option<f64> {
    let text = field?.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("na") || text.eq_ignore_ascii_case("null") {
        return None;
    }
    let value: f64 = text.parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TABLE: &str = "\
genus,species,country,X1974,X1975,X1976,X1977
Gorilla,beringei,Rwanda,250,,240,0
Gorilla,beringei,Uganda,110,105,,98
Loxodonta,africana,Kenya,12000,11500,NA,10800
";

    fn selector(genus: &str, species: &str, country: &str) -> SpeciesSelector {
        SpeciesSelector::new(genus, species, country)
    }

    #[test]
    fn reshapes_wide_to_long_and_drops_missing() {
        let obs = observations_from_reader(
            TABLE.as_bytes(),
            &selector("Gorilla", "beringei", "Rwanda"),
        )
        .unwrap();

        // 4 year columns, one empty and one zero → 2 observations
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0], Observation::new(1974, 250.0));
        assert_eq!(obs[1], Observation::new(1976, 240.0));
    }

    #[test]
    fn zero_counts_are_excluded_not_retained() {
        let obs = observations_from_reader(
            TABLE.as_bytes(),
            &selector("Gorilla", "beringei", "Rwanda"),
        )
        .unwrap();
        assert!(obs.iter().all(|o| o.population > 0.0));
        assert!(!obs.iter().any(|o| o.year == 1977));
    }

    #[test]
    fn scaled_year_offsets_from_1974() {
        let obs = observations_from_reader(
            TABLE.as_bytes(),
            &selector("gorilla", "BERINGEI", "uganda"), // case-insensitive
        )
        .unwrap();
        for o in &obs {
            assert_eq!(o.scaled_year, o.year - 1974);
        }
        assert_eq!(obs[0].scaled_year, 0);
    }

    #[test]
    fn observations_are_sorted_by_year() {
        let obs = observations_from_reader(
            TABLE.as_bytes(),
            &selector("Loxodonta", "africana", "Kenya"),
        )
        .unwrap();
        for pair in obs.windows(2) {
            assert!(pair[0].year <= pair[1].year);
            assert!(pair[0].scaled_year <= pair[1].scaled_year);
        }
    }

    #[test]
    fn unmatched_selector_is_data_not_found() {
        let err = observations_from_reader(
            TABLE.as_bytes(),
            &selector("Panthera", "leo", "Kenya"),
        )
        .unwrap_err();
        assert!(matches!(err, PopTrendError::DataNotFound { .. }));
    }

    #[test]
    fn matching_row_with_only_null_cells_is_data_not_found() {
        let table = "genus,species,country,1990\nPanthera,leo,Kenya,0\n";
        let err = observations_from_reader(table.as_bytes(), &selector("Panthera", "leo", "Kenya"))
            .unwrap_err();
        assert!(matches!(err, PopTrendError::DataNotFound { .. }));
    }

    #[test]
    fn year_labels_with_and_without_prefix_parse() {
        assert_eq!(parse_year_label("1974"), Some(1974));
        assert_eq!(parse_year_label("X1974"), Some(1974));
        assert_eq!(parse_year_label("yr_2001"), Some(2001));
        assert_eq!(parse_year_label("region"), None);
        assert_eq!(parse_year_label("id9"), None);
    }

    #[test]
    fn missing_metadata_column_is_invalid() {
        let table = "genus,species,1990\nA,b,10\n";
        let err = observations_from_reader(table.as_bytes(), &selector("A", "b", "C"))
            .unwrap_err();
        assert!(matches!(err, PopTrendError::InvalidValue(_)));
    }

    proptest! {
        /// For any mix of missing/zero/positive cells, the output keeps
        /// exactly the positive ones, scaled against 1974.
        #[test]
        fn filter_keeps_exactly_the_positive_cells(
            cells in proptest::collection::vec(
                prop_oneof![
                    Just(None::<u32>),                // empty cell
                    Just(Some(0u32)),                 // "not surveyed"
                    (1u32..100_000).prop_map(Some),   // real count
                ],
                1..30,
            )
        ) {
            let years: Vec<i32> = (0..cells.len() as i32).map(|i| 1950 + i).collect();
            let header: String = std::iter::once("genus,species,country".to_string())
                .chain(years.iter().map(|y| y.to_string()))
                .collect::<Vec<_>>()
                .join(",");
            let row: String = std::iter::once("A,b,C".to_string())
                .chain(cells.iter().map(|c| match c {
                    None => String::new(),
                    Some(v) => v.to_string(),
                }))
                .collect::<Vec<_>>()
                .join(",");
            let table = format!("{header}\n{row}\n");

            let expected: Vec<(i32, f64)> = years
                .iter()
                .zip(cells.iter())
                .filter_map(|(&y, c)| match c {
                    Some(v) if *v > 0 => Some((y, f64::from(*v))),
                    _ => None,
                })
                .collect();

            let result = observations_from_reader(
                table.as_bytes(),
                &SpeciesSelector::new("A", "b", "C"),
            );

            if expected.is_empty() {
                prop_assert!(
                    matches!(result, Err(PopTrendError::DataNotFound { .. })),
                    "expected DataNotFound error"
                );
            } else {
                let obs = result.unwrap();
                prop_assert_eq!(obs.len(), expected.len());
                for (o, (y, p)) in obs.iter().zip(expected.iter()) {
                    prop_assert_eq!(o.year, *y);
                    prop_assert_eq!(o.scaled_year, *y - BASE_YEAR);
                    prop_assert!((o.population - p).abs() < 1e-9);
                }
            }
        }
    }
}
