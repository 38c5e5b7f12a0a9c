// Demographic and geographic selection of the voter universe.
//
// Request configs speak in human labels ("Female", "Hispanic/Latino"); the
// voter file speaks in single-letter codes. The mapping lives here, and an
// unknown label is a validation error rather than a silently empty list.

use log::info;

use crate::vrm::config_reader::RequestFilters;
use crate::vrm::io_csv::VoterRecord;
use crate::vrm::{ValidationSnafu, VrmResult};

/// Fields a request can filter or stratify on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Party,
    Age,
    Gender,
    Race,
    Ethnicity,
    County,
    CongressionalDistrict,
    StateSenateDistrict,
    StateHouseDistrict,
}

impl FilterField {
    pub fn parse(name: &str) -> VrmResult<FilterField> {
        let field = match name.trim().to_ascii_lowercase().as_str() {
            "party" => FilterField::Party,
            "age" => FilterField::Age,
            "gender" => FilterField::Gender,
            "race" => FilterField::Race,
            "ethnicity" => FilterField::Ethnicity,
            "county" => FilterField::County,
            "congressionaldistrict" | "congressional_district" => {
                FilterField::CongressionalDistrict
            }
            "statesenatedistrict" | "state_senate_district" => FilterField::StateSenateDistrict,
            "statehousedistrict" | "state_house_district" => FilterField::StateHouseDistrict,
            other => {
                return ValidationSnafu {
                    message: format!("unknown field name: {}", other),
                }
                .fail()
            }
        };
        Ok(field)
    }

    /// The raw value this field has for one record, as used for stratum keys.
    pub fn value_of(&self, v: &VoterRecord) -> String {
        match self {
            FilterField::Party => v.party_cd.clone(),
            FilterField::Age => v
                .age_at_year_end
                .map(|a| a.to_string())
                .unwrap_or_default(),
            FilterField::Gender => v.gender_code.clone(),
            FilterField::Race => v.race_code.clone(),
            FilterField::Ethnicity => v.ethnic_code.clone(),
            FilterField::County => v.county_desc.clone(),
            FilterField::CongressionalDistrict => v.cong_dist_abbrv.clone(),
            FilterField::StateSenateDistrict => v.nc_senate_abbrv.clone(),
            FilterField::StateHouseDistrict => v.nc_house_abbrv.clone(),
        }
    }
}

pub fn parse_stratify_fields(names: &[String]) -> VrmResult<Vec<FilterField>> {
    names.iter().map(|n| FilterField::parse(n)).collect()
}

/// Composite stratum key, one segment per stratification field.
pub fn stratum_key(fields: &[FilterField], v: &VoterRecord) -> String {
    let parts: Vec<String> = fields.iter().map(|f| f.value_of(v)).collect();
    parts.join("|")
}

// ********* Label to code mapping *********

const GENDER_LABELS: [(&str, &str); 3] =
    [("Male", "M"), ("Female", "F"), ("Undesignated", "U")];

const RACE_LABELS: [(&str, &str); 8] = [
    ("White", "W"),
    ("Black", "B"),
    ("Asian", "A"),
    ("Native American", "I"),
    ("Other", "O"),
    ("Unknown", "U"),
    ("Two or More Races", "M"),
    ("Native Hawaiian or Pacific Islander", "P"),
];

const ETHNICITY_LABELS: [(&str, &str); 3] = [
    ("Hispanic/Latino", "HL"),
    ("Non-Hispanic", "NL"),
    ("Unknown", "UN"),
];

fn map_label(kind: &str, table: &[(&str, &str)], label: &str) -> VrmResult<String> {
    for (name, code) in table {
        if name.eq_ignore_ascii_case(label.trim()) {
            return Ok((*code).to_string());
        }
    }
    ValidationSnafu {
        message: format!("unknown {} label: {:?}", kind, label),
    }
    .fail()
}

pub fn gender_code(label: &str) -> VrmResult<String> {
    map_label("gender", &GENDER_LABELS, label)
}

pub fn race_code(label: &str) -> VrmResult<String> {
    map_label("race", &RACE_LABELS, label)
}

pub fn ethnicity_code(label: &str) -> VrmResult<String> {
    map_label("ethnicity", &ETHNICITY_LABELS, label)
}

// ********* The filter itself *********

/// Conjunctive selection: every populated clause must match. Within one
/// clause the listed values are alternatives.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub party: Vec<String>,
    pub gender: Vec<String>,
    pub race: Vec<String>,
    pub ethnicity: Vec<String>,
    pub county: Vec<String>,
    /// Inclusive on both ends.
    pub age_range: Option<(u32, u32)>,
    pub congressional: Vec<u32>,
    pub state_senate: Vec<u32>,
    pub state_house: Vec<u32>,
}

impl FilterSpec {
    /// Translates the request's label-level filters into code-level clauses.
    pub fn from_request(filters: &RequestFilters) -> VrmResult<FilterSpec> {
        let mut spec = FilterSpec::default();
        if let Some(parties) = &filters.party {
            spec.party = parties.iter().map(|p| p.trim().to_uppercase()).collect();
        }
        if let Some(labels) = &filters.gender {
            spec.gender = labels
                .iter()
                .map(|l| gender_code(l))
                .collect::<VrmResult<_>>()?;
        }
        if let Some(labels) = &filters.race {
            spec.race = labels
                .iter()
                .map(|l| race_code(l))
                .collect::<VrmResult<_>>()?;
        }
        if let Some(labels) = &filters.ethnicity {
            spec.ethnicity = labels
                .iter()
                .map(|l| ethnicity_code(l))
                .collect::<VrmResult<_>>()?;
        }
        if let Some(counties) = &filters.county {
            spec.county = counties.iter().map(|c| c.trim().to_uppercase()).collect();
        }
        if let Some([lo, hi]) = filters.age_range {
            if lo > hi {
                return ValidationSnafu {
                    message: format!("age range [{}, {}] is reversed", lo, hi),
                }
                .fail();
            }
            spec.age_range = Some((lo, hi));
        }
        if let Some(ds) = &filters.congressional_district {
            spec.congressional = ds.clone();
        }
        if let Some(ds) = &filters.state_senate_district {
            spec.state_senate = ds.clone();
        }
        if let Some(ds) = &filters.state_house_district {
            spec.state_house = ds.clone();
        }
        Ok(spec)
    }

    pub fn matches(&self, v: &VoterRecord) -> bool {
        set_matches(&self.party, &v.party_cd)
            && set_matches(&self.gender, &v.gender_code)
            && set_matches(&self.race, &v.race_code)
            && set_matches(&self.ethnicity, &v.ethnic_code)
            && set_matches(&self.county, &v.county_desc.to_uppercase())
            && age_matches(self.age_range, v.age_at_year_end)
            && district_matches(&self.congressional, &v.cong_dist_abbrv)
            && district_matches(&self.state_senate, &v.nc_senate_abbrv)
            && district_matches(&self.state_house, &v.nc_house_abbrv)
    }

    pub fn apply(&self, voters: &[VoterRecord]) -> Vec<VoterRecord> {
        let selected: Vec<VoterRecord> =
            voters.iter().filter(|v| self.matches(v)).cloned().collect();
        info!(
            "filter selected {} of {} voter records",
            selected.len(),
            voters.len()
        );
        selected
    }
}

fn set_matches(allowed: &[String], value: &str) -> bool {
    allowed.is_empty() || allowed.iter().any(|a| a == value)
}

fn age_matches(range: Option<(u32, u32)>, age: Option<u32>) -> bool {
    match range {
        None => true,
        // Records without a usable age cannot satisfy an age clause.
        Some((lo, hi)) => match age {
            Some(a) => a >= lo && a <= hi,
            None => false,
        },
    }
}

fn district_matches(allowed: &[u32], value: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }
    // District columns come zero-padded ("02") or blank.
    match value.trim().parse::<u32>() {
        Ok(d) => allowed.contains(&d),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(party: &str, age: Option<u32>, gender: &str, race: &str, county: &str) -> VoterRecord {
        VoterRecord {
            ncid: "X".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            party_cd: party.to_string(),
            age_at_year_end: age,
            gender_code: gender.to_string(),
            race_code: race.to_string(),
            ethnic_code: "NL".to_string(),
            county_desc: county.to_string(),
            cong_dist_abbrv: "02".to_string(),
            nc_senate_abbrv: "".to_string(),
            nc_house_abbrv: "034".to_string(),
            mail_addr1: "1 MAIN ST".to_string(),
            mail_addr2: "".to_string(),
            mail_city: "RALEIGH".to_string(),
            mail_state: "NC".to_string(),
            mail_zipcode: "27601".to_string(),
        }
    }

    #[test]
    fn label_maps_are_case_insensitive() {
        assert_eq!(gender_code("female").unwrap(), "F");
        assert_eq!(race_code("Two or More Races").unwrap(), "M");
        assert_eq!(ethnicity_code("Hispanic/Latino").unwrap(), "HL");
        assert!(gender_code("Nonbinary").is_err());
        assert!(race_code("").is_err());
    }

    #[test]
    fn empty_spec_matches_everything() {
        let spec = FilterSpec::default();
        assert!(spec.matches(&voter("DEM", Some(40), "F", "W", "WAKE")));
        assert!(spec.matches(&voter("", None, "", "", "")));
    }

    #[test]
    fn clauses_are_conjunctive() {
        let spec = FilterSpec {
            party: vec!["DEM".to_string()],
            gender: vec!["F".to_string()],
            age_range: Some((18, 49)),
            ..FilterSpec::default()
        };
        assert!(spec.matches(&voter("DEM", Some(49), "F", "W", "WAKE")));
        assert!(!spec.matches(&voter("REP", Some(49), "F", "W", "WAKE")));
        assert!(!spec.matches(&voter("DEM", Some(50), "F", "W", "WAKE")));
        assert!(!spec.matches(&voter("DEM", Some(30), "M", "W", "WAKE")));
        // Missing age never satisfies an age clause.
        assert!(!spec.matches(&voter("DEM", None, "F", "W", "WAKE")));
    }

    #[test]
    fn values_within_one_clause_are_alternatives() {
        let spec = FilterSpec {
            county: vec!["WAKE".to_string(), "DURHAM".to_string()],
            ..FilterSpec::default()
        };
        assert!(spec.matches(&voter("DEM", Some(40), "F", "W", "Wake")));
        assert!(spec.matches(&voter("DEM", Some(40), "F", "W", "DURHAM")));
        assert!(!spec.matches(&voter("DEM", Some(40), "F", "W", "ORANGE")));
    }

    #[test]
    fn zero_padded_districts_compare_numerically() {
        let spec = FilterSpec {
            congressional: vec![2],
            ..FilterSpec::default()
        };
        assert!(spec.matches(&voter("DEM", Some(40), "F", "W", "WAKE")));
        let spec = FilterSpec {
            state_senate: vec![14],
            ..FilterSpec::default()
        };
        // Blank district column fails a district clause.
        assert!(!spec.matches(&voter("DEM", Some(40), "F", "W", "WAKE")));
    }

    #[test]
    fn from_request_maps_labels_and_rejects_bad_ranges() {
        let filters = RequestFilters {
            party: Some(vec!["dem".to_string()]),
            gender: Some(vec!["Female".to_string()]),
            race: None,
            ethnicity: Some(vec!["Non-Hispanic".to_string()]),
            county: Some(vec!["wake".to_string()]),
            age_range: Some([18, 49]),
            congressional_district: None,
            state_senate_district: None,
            state_house_district: Some(vec![34]),
        };
        let spec = FilterSpec::from_request(&filters).unwrap();
        assert_eq!(spec.party, vec!["DEM"]);
        assert_eq!(spec.gender, vec!["F"]);
        assert_eq!(spec.ethnicity, vec!["NL"]);
        assert_eq!(spec.county, vec!["WAKE"]);
        assert_eq!(spec.age_range, Some((18, 49)));
        assert_eq!(spec.state_house, vec![34]);

        let reversed = RequestFilters {
            age_range: Some([49, 18]),
            ..RequestFilters::default()
        };
        assert!(FilterSpec::from_request(&reversed).is_err());
    }

    #[test]
    fn stratum_keys_follow_field_order() {
        let fields =
            parse_stratify_fields(&["Race".to_string(), "Gender".to_string()]).unwrap();
        let key = stratum_key(&fields, &voter("DEM", Some(40), "F", "W", "WAKE"));
        assert_eq!(key, "W|F");
        assert!(parse_stratify_fields(&["shoe_size".to_string()]).is_err());
    }
}
