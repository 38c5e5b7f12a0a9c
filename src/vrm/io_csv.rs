// Reader for the statewide voter file in its tab-less CSV export form.
// Only the columns the pipeline consumes are deserialized; everything else
// in the export is skipped.

use log::info;

use serde::Deserialize;

use snafu::prelude::*;

use std::io::Read;

use crate::vrm::{OpeningVoterFileSnafu, VoterLineSnafu, VrmResult};

/// One row of the voter universe.
///
/// District columns stay as strings: the export pads some of them and leaves
/// others blank, so parsing is deferred to the filter that needs integers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoterRecord {
    pub ncid: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub party_cd: String,
    #[serde(default)]
    pub age_at_year_end: Option<u32>,
    #[serde(default)]
    pub gender_code: String,
    #[serde(default)]
    pub race_code: String,
    #[serde(default)]
    pub ethnic_code: String,
    #[serde(default)]
    pub county_desc: String,
    #[serde(default)]
    pub cong_dist_abbrv: String,
    #[serde(default)]
    pub nc_senate_abbrv: String,
    #[serde(default)]
    pub nc_house_abbrv: String,
    #[serde(default)]
    pub mail_addr1: String,
    #[serde(default)]
    pub mail_addr2: String,
    #[serde(default)]
    pub mail_city: String,
    #[serde(default)]
    pub mail_state: String,
    #[serde(default)]
    pub mail_zipcode: String,
}

impl VoterRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

pub fn read_voter_file(path: &str) -> VrmResult<Vec<VoterRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|_| OpeningVoterFileSnafu { path })?;
    let records = parse_voter_csv(file)?;
    info!("read {} voter records from {}", records.len(), path);
    Ok(records)
}

pub fn parse_voter_csv<R: Read>(input: R) -> VrmResult<Vec<VoterRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        let record: VoterRecord = row.context(VoterLineSnafu)?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ncid,first_name,last_name,party_cd,age_at_year_end,gender_code,race_code,ethnic_code,county_desc,cong_dist_abbrv,nc_senate_abbrv,nc_house_abbrv,mail_addr1,mail_addr2,mail_city,mail_state,mail_zipcode
AA1,ADA,SMITH,DEM,42,F,W,NL,WAKE,02,14,034,12 ELM ST,APT 3,RALEIGH,NC,27601
AA2,BEN,JONES,UNA,,M,B,UN,DURHAM,04,,,,,,,
";

    #[test]
    fn parses_all_columns() {
        let records = parse_voter_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        let ada = &records[0];
        assert_eq!(ada.ncid, "AA1");
        assert_eq!(ada.age_at_year_end, Some(42));
        assert_eq!(ada.cong_dist_abbrv, "02");
        assert_eq!(ada.mail_addr2, "APT 3");
        assert_eq!(ada.full_name(), "ADA SMITH");
    }

    #[test]
    fn blank_numeric_and_address_fields_are_tolerated() {
        let records = parse_voter_csv(SAMPLE.as_bytes()).unwrap();
        let ben = &records[1];
        assert_eq!(ben.age_at_year_end, None);
        assert_eq!(ben.nc_senate_abbrv, "");
        assert_eq!(ben.mail_addr1, "");
    }

    #[test]
    fn malformed_row_is_an_error() {
        let bad = "ncid,first_name,last_name,party_cd,age_at_year_end,gender_code,race_code,ethnic_code,county_desc,cong_dist_abbrv,nc_senate_abbrv,nc_house_abbrv,mail_addr1,mail_addr2,mail_city,mail_state,mail_zipcode\nAA1,ADA\n";
        assert!(parse_voter_csv(bad.as_bytes()).is_err());
    }
}
