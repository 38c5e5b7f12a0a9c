use log::{info, warn};

use rct_engine::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use rand::rngs::StdRng;
use rand::SeedableRng;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::vrm::config_reader::*;
use crate::vrm::filter::FilterSpec;
use crate::vrm::io_csv::VoterRecord;
use crate::vrm::notify::Notifier;
use crate::vrm::store::{with_retry, BlobStore, LocalDirStore};

pub mod filter;
pub mod io_csv;
pub mod notify;
pub mod store;

#[derive(Debug, Snafu)]
pub enum VrmError {
    #[snafu(display("Error opening voter file {path}"))]
    OpeningVoterFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing voter file row"))]
    VoterLine { source: csv::Error },
    #[snafu(display(""))]
    OpeningJson { source: std::io::Error },
    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error reading group file {path}"))]
    GroupCsv { source: csv::Error, path: String },
    #[snafu(display("Error encoding CSV output"))]
    WritingCsv { source: csv::Error },

    #[snafu(display("Invalid request: {message}"))]
    Validation { message: String },
    #[snafu(display("The engine rejected the request"))]
    Engine { source: EngineError },
    #[snafu(display("Store access failed for {path}"))]
    StoreAccess {
        source: store::StoreError,
        path: String,
    },
    #[snafu(display("Artifact uploads failed for {slug}: {failed:?}"))]
    ArtifactUpload { slug: String, failed: Vec<String> },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type VrmResult<T> = Result<T, VrmError>;

// ********* Request configuration *********

pub mod config_reader {
    use crate::vrm::*;

    #[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RequestFilters {
        pub county: Option<Vec<String>>,
        pub party: Option<Vec<String>>,
        pub race: Option<Vec<String>>,
        pub ethnicity: Option<Vec<String>>,
        pub gender: Option<Vec<String>>,
        #[serde(rename = "ageRange")]
        pub age_range: Option<[u32; 2]>,
        #[serde(rename = "congressionalDistrict")]
        pub congressional_district: Option<Vec<u32>>,
        #[serde(rename = "stateSenateDistrict")]
        pub state_senate_district: Option<Vec<u32>>,
        #[serde(rename = "stateHouseDistrict")]
        pub state_house_district: Option<Vec<u32>>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct RequestConfig {
        #[serde(rename = "requestName")]
        pub request_name: String,
        #[serde(rename = "requestorName")]
        pub requestor_name: String,
        #[serde(rename = "requestorEmail")]
        pub requestor_email: String,
        #[serde(rename = "voterFile")]
        pub voter_file: String,
        #[serde(default)]
        pub filters: RequestFilters,
        #[serde(rename = "stratifyBy")]
        pub stratify_by: Option<Vec<String>>,
        #[serde(rename = "controlFraction")]
        pub control_fraction: Option<f64>,
        #[serde(rename = "controlSize")]
        pub control_size: Option<u64>,
        #[serde(rename = "randomSeed")]
        pub random_seed: Option<u64>,
        #[serde(rename = "reviewerEmail")]
        pub reviewer_email: Option<String>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct PowerConfig {
        #[serde(rename = "baselineRate")]
        pub baseline_rate: f64,
        #[serde(rename = "minLift")]
        pub min_lift: f64,
        #[serde(rename = "controlProportion")]
        pub control_proportion: Option<f64>,
        pub power: Option<f64>,
        pub alpha: Option<f64>,
        #[serde(rename = "candidateSize")]
        pub candidate_size: Option<u64>,
        #[serde(rename = "subgroupSizes")]
        pub subgroup_sizes: Option<std::collections::BTreeMap<String, u64>>,
    }

    pub fn read_request_config(path: &str) -> VrmResult<RequestConfig> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        let config: RequestConfig =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(config)
    }

    pub fn read_power_config(path: &str) -> VrmResult<PowerConfig> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        let config: PowerConfig =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(config)
    }

    pub fn read_summary(path: &str) -> VrmResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

// ********* Request namespace *********

pub const LISTS_PREFIX: &str = "lists";
const REQUEST_FALLBACK_SLUG: &str = "request";
const STORE_ATTEMPTS: u32 = 3;

const CONTROL_GROUP_FILE: &str = "control_group.csv";
const TREATMENT_GROUP_FILE: &str = "treatment_group.csv";
const CONTROL_MAILING_FILE: &str = "control_mailing_list.csv";
const TREATMENT_MAILING_FILE: &str = "treatment_mailing_list.csv";
const GENERATED_CONTROL_FILE: &str = "sample_results/generated_control.csv";
const GENERATED_TREATMENT_FILE: &str = "sample_results/generated_treatment.csv";
const TREATMENT_LIFT_FILE: &str = "sample_results/treatment_lift.json";

/// Lowercases the request name and collapses every run of non-alphanumeric
/// characters into a single underscore. A name with nothing salvageable
/// falls back to "request" rather than an empty path segment.
pub fn clean_request_name(name: &str) -> String {
    let mut slug = String::new();
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        REQUEST_FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Probes the store for an unused request namespace, suffixing -1, -2, ...
/// until one is free. Names are only reserved once an artifact is written,
/// so two racing requests with the same name are not defended against here.
pub fn ensure_unique_slug(store: &dyn BlobStore, slug: &str) -> VrmResult<String> {
    let mut candidate = slug.to_string();
    let mut n = 0u32;
    loop {
        let prefix = format!("{}/{}/", LISTS_PREFIX, candidate);
        let existing = with_retry(STORE_ATTEMPTS, || store.list(&prefix))
            .context(StoreAccessSnafu { path: prefix })?;
        if existing.is_empty() {
            return Ok(candidate);
        }
        n += 1;
        candidate = format!("{}-{}", slug, n);
    }
}

fn object_path(slug: &str, file: &str) -> String {
    format!("{}/{}/{}", LISTS_PREFIX, slug, file)
}

// ********* CSV rendering *********

fn mail_person(v: &VoterRecord) -> MailPerson {
    MailPerson {
        full_name: v.full_name(),
        address_line1: v.mail_addr1.clone(),
        address_line2: v.mail_addr2.clone(),
        city: v.mail_city.clone(),
        state: v.mail_state.clone(),
        zip: v.mail_zipcode.clone(),
    }
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> VrmResult<Vec<u8>> {
    match wtr.into_inner() {
        Ok(bytes) => Ok(bytes),
        Err(e) => whatever!("Failed to flush CSV buffer: {}", e),
    }
}

fn person_csv(people: &[MailPerson]) -> VrmResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "Name",
        "MailingAddress",
        "MailingCity",
        "MailingState",
        "MailingZip",
    ])
    .context(WritingCsvSnafu {})?;
    for p in people {
        wtr.write_record([
            p.full_name.as_str(),
            p.display_address().as_str(),
            p.city.trim(),
            p.state.trim(),
            p.zip.trim(),
        ])
        .context(WritingCsvSnafu {})?;
    }
    finish_csv(wtr)
}

fn household_csv(households: &[Household]) -> VrmResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "MailingAddress",
        "MailingCity",
        "MailingState",
        "MailingZip",
        "Name",
    ])
    .context(WritingCsvSnafu {})?;
    for h in households {
        wtr.write_record([
            h.address_line1.as_str(),
            h.city.as_str(),
            h.state.as_str(),
            h.zip.as_str(),
            h.display_name.as_str(),
        ])
        .context(WritingCsvSnafu {})?;
    }
    finish_csv(wtr)
}

// ********* Request orchestration *********

#[derive(PartialEq, Debug, Clone)]
pub struct RequestOutcome {
    pub slug: String,
    pub selected: usize,
    pub control_count: usize,
    pub treatment_count: usize,
    pub control_households: usize,
    pub treatment_households: usize,
}

pub struct RequestRunner<'a> {
    store: &'a dyn BlobStore,
    notifier: &'a dyn Notifier,
}

impl<'a> RequestRunner<'a> {
    pub fn new(store: &'a dyn BlobStore, notifier: &'a dyn Notifier) -> RequestRunner<'a> {
        RequestRunner { store, notifier }
    }

    /// Runs one mailing-list request end to end: filter, split, household
    /// aggregation, artifact persistence, notifications.
    ///
    /// Nothing is persisted until filtering and splitting have succeeded.
    /// Once persistence starts, every artifact write is attempted even if an
    /// earlier one failed, and the error names the ones that failed.
    pub fn run_request(
        &self,
        voters: &[VoterRecord],
        config: &RequestConfig,
    ) -> VrmResult<RequestOutcome> {
        let spec = FilterSpec::from_request(&config.filters)?;
        let selected = spec.apply(voters);
        if selected.is_empty() {
            return ValidationSnafu {
                message: "no voter records match the requested filters".to_string(),
            }
            .fail();
        }

        let sizing = match (config.control_fraction, config.control_size) {
            (Some(_), Some(_)) => {
                return ValidationSnafu {
                    message: "specify controlFraction or controlSize, not both".to_string(),
                }
                .fail()
            }
            (Some(f), None) => ControlSizing::Fraction(f),
            (None, Some(n)) => ControlSizing::Count(n as usize),
            (None, None) => ControlSizing::DEFAULT,
        };
        let strata = match &config.stratify_by {
            Some(names) => filter::parse_stratify_fields(names)?,
            None => Vec::new(),
        };

        let mut rng = seeded_rng(config.random_seed);
        let split = if strata.is_empty() {
            split_groups(&selected, sizing, &mut rng).context(EngineSnafu {})?
        } else {
            split_stratified(
                &selected,
                sizing,
                |v| filter::stratum_key(&strata, v),
                &mut rng,
            )
            .context(EngineSnafu {})?
        };

        let slug = ensure_unique_slug(self.store, &clean_request_name(&config.request_name))?;
        info!(
            "request {:?} -> namespace {}/{}: {} selected, {} control / {} treatment",
            config.request_name,
            LISTS_PREFIX,
            slug,
            selected.len(),
            split.control.len(),
            split.treatment.len()
        );

        let recipients = self.recipients(config);
        self.notify_best_effort(
            &format!("Request received: {}", config.request_name),
            &format!(
                "Your mailing list request is being processed as {:?}. \
                 {} voter records matched the filters.",
                slug,
                selected.len()
            ),
            &recipients,
        );

        let control_people: Vec<MailPerson> = split.control.iter().map(mail_person).collect();
        let treatment_people: Vec<MailPerson> = split.treatment.iter().map(mail_person).collect();
        let control_households = group_households(&control_people);
        let treatment_households = group_households(&treatment_people);

        let undeliverable =
            invalid_address_count(&control_people) + invalid_address_count(&treatment_people);
        if undeliverable > 0 {
            warn!("{} selected records have no deliverable address", undeliverable);
        }

        let artifacts: [(String, Vec<u8>); 4] = [
            (object_path(&slug, CONTROL_GROUP_FILE), person_csv(&control_people)?),
            (
                object_path(&slug, TREATMENT_GROUP_FILE),
                person_csv(&treatment_people)?,
            ),
            (
                object_path(&slug, CONTROL_MAILING_FILE),
                household_csv(&control_households)?,
            ),
            (
                object_path(&slug, TREATMENT_MAILING_FILE),
                household_csv(&treatment_households)?,
            ),
        ];
        let mut failed: Vec<String> = Vec::new();
        for (path, bytes) in &artifacts {
            let res = with_retry(STORE_ATTEMPTS, || self.store.write(path, bytes, "text/csv"));
            if let Err(e) = res {
                warn!("giving up on artifact {}: {}", path, e);
                failed.push(path.clone());
            }
        }
        if !failed.is_empty() {
            return ArtifactUploadSnafu { slug, failed }.fail();
        }

        self.notify_best_effort(
            &format!("Mailing lists ready: {}", config.request_name),
            &format!(
                "Lists for {:?} are available under {}/{}: \
                 {} control households, {} treatment households.",
                config.request_name,
                LISTS_PREFIX,
                slug,
                control_households.len(),
                treatment_households.len()
            ),
            &recipients,
        );

        Ok(RequestOutcome {
            slug,
            selected: selected.len(),
            control_count: split.control.len(),
            treatment_count: split.treatment.len(),
            control_households: control_households.len(),
            treatment_households: treatment_households.len(),
        })
    }

    fn recipients(&self, config: &RequestConfig) -> Vec<String> {
        let mut r = vec![config.requestor_email.clone()];
        if let Some(reviewer) = &config.reviewer_email {
            r.push(reviewer.clone());
        }
        r
    }

    fn notify_best_effort(&self, subject: &str, body: &str, recipients: &[String]) {
        if let Err(e) = self.notifier.send(subject, body, recipients) {
            warn!("dropping notification {:?}: {}", subject, e);
        }
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

// ********* Outcome simulation *********

pub const DEFAULT_BASE_RATE: f64 = 0.1;

#[derive(PartialEq, Debug, Clone)]
pub struct SimulationSettings {
    pub base_rate: f64,
    pub lift_range: (f64, f64),
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> SimulationSettings {
        SimulationSettings {
            base_rate: DEFAULT_BASE_RATE,
            lift_range: DEFAULT_LIFT_RANGE,
            seed: None,
        }
    }
}

fn read_group_rows(
    store: &dyn BlobStore,
    path: &str,
) -> VrmResult<(csv::StringRecord, Vec<csv::StringRecord>)> {
    let bytes = with_retry(STORE_ATTEMPTS, || store.read(path))
        .context(StoreAccessSnafu { path })?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes.as_slice());
    let header = rdr.headers().context(GroupCsvSnafu { path })?.clone();
    let mut rows = Vec::new();
    for row in rdr.records() {
        rows.push(row.context(GroupCsvSnafu { path })?);
    }
    Ok((header, rows))
}

fn outcome_csv(
    header: &csv::StringRecord,
    rows: &[csv::StringRecord],
    outcomes: &[u8],
) -> VrmResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    let mut h = header.clone();
    h.push_field("behavior");
    wtr.write_record(&h).context(WritingCsvSnafu {})?;
    for (row, outcome) in rows.iter().zip(outcomes) {
        let mut r = row.clone();
        r.push_field(if *outcome == 1 { "1" } else { "0" });
        wtr.write_record(&r).context(WritingCsvSnafu {})?;
    }
    finish_csv(wtr)
}

/// Generates synthetic outcomes for an existing request namespace.
///
/// Reads both person-level group files, draws a treatment lift from the
/// configured range, assigns a block-randomized 0/1 behavior to every
/// record and writes the augmented files plus the injected-lift record
/// under `sample_results/`.
pub fn run_simulation(
    store: &dyn BlobStore,
    slug: &str,
    settings: &SimulationSettings,
) -> VrmResult<JSValue> {
    let mut rng = seeded_rng(settings.seed);
    let lift = draw_lift(settings.lift_range, &mut rng).context(EngineSnafu {})?;
    let control_rate = arm_rate(settings.base_rate, None).context(EngineSnafu {})?;
    let treatment_rate = arm_rate(settings.base_rate, Some(lift)).context(EngineSnafu {})?;
    info!(
        "simulating {}: control rate {}, treatment rate {}",
        slug, control_rate, treatment_rate
    );

    let arms = [
        (CONTROL_GROUP_FILE, GENERATED_CONTROL_FILE, control_rate),
        (TREATMENT_GROUP_FILE, GENERATED_TREATMENT_FILE, treatment_rate),
    ];
    for (source_file, target_file, rate) in arms {
        let source_path = object_path(slug, source_file);
        let (header, rows) = read_group_rows(store, &source_path)?;
        let outcomes = block_outcomes(rows.len(), rate, &mut rng).context(EngineSnafu {})?;
        let bytes = outcome_csv(&header, &rows, &outcomes)?;
        let target_path = object_path(slug, target_file);
        with_retry(STORE_ATTEMPTS, || store.write(&target_path, &bytes, "text/csv"))
            .context(StoreAccessSnafu { path: target_path.clone() })?;
    }

    let lift_js = json!({
        "experiment_id": slug,
        "treatment_lift": lift,
        "base_behavior_rate": settings.base_rate,
    });
    let lift_path = object_path(slug, TREATMENT_LIFT_FILE);
    let lift_bytes = serde_json::to_vec_pretty(&lift_js).context(ParsingJsonSnafu {})?;
    with_retry(STORE_ATTEMPTS, || {
        store.write(&lift_path, &lift_bytes, "application/json")
    })
    .context(StoreAccessSnafu { path: lift_path })?;
    Ok(lift_js)
}

// ********* Outcome analysis *********

pub const DEFAULT_ALPHA: f64 = 0.05;

fn count_behavior(store: &dyn BlobStore, path: &str) -> VrmResult<(u64, u64)> {
    let (header, rows) = read_group_rows(store, path)?;
    let behavior_idx = match header.iter().position(|h| h == "behavior") {
        Some(idx) => idx,
        None => {
            return ValidationSnafu {
                message: format!("{} has no behavior column", path),
            }
            .fail()
        }
    };
    let positives = rows
        .iter()
        .filter(|r| r.get(behavior_idx) == Some("1"))
        .count() as u64;
    Ok((positives, rows.len() as u64))
}

/// Runs the two-proportion significance analysis over the generated outcome
/// files of a request namespace. The injected lift is echoed back into the
/// report when the simulator left its record behind.
pub fn run_analysis(store: &dyn BlobStore, slug: &str, alpha: f64) -> VrmResult<JSValue> {
    let (x_c, n_c) = count_behavior(store, &object_path(slug, GENERATED_CONTROL_FILE))?;
    let (x_t, n_t) = count_behavior(store, &object_path(slug, GENERATED_TREATMENT_FILE))?;
    let report = ab_test(x_t, n_t, x_c, n_c, alpha).context(EngineSnafu {})?;

    let mut js: JSMap<String, JSValue> = JSMap::new();
    js.insert("experiment_id".to_string(), json!(slug));
    js.insert("n_treat".to_string(), json!(n_t));
    js.insert("n_control".to_string(), json!(n_c));
    js.insert("p_treat".to_string(), json!(report.p_treat));
    js.insert("p_control".to_string(), json!(report.p_control));
    js.insert("lift".to_string(), json!(report.lift));
    js.insert(
        "ci_lift".to_string(),
        json!([report.ci_lift.0, report.ci_lift.1]),
    );
    js.insert("alpha".to_string(), json!(report.alpha));
    js.insert("z".to_string(), json!(report.z));
    js.insert("p_pos_one_sided".to_string(), json!(report.p_one_sided));
    js.insert("p_two_sided".to_string(), json!(report.p_two_sided));

    let lift_path = object_path(slug, TREATMENT_LIFT_FILE);
    let has_lift = with_retry(STORE_ATTEMPTS, || store.exists(&lift_path))
        .context(StoreAccessSnafu { path: lift_path.clone() })?;
    if has_lift {
        let bytes = with_retry(STORE_ATTEMPTS, || store.read(&lift_path))
            .context(StoreAccessSnafu { path: lift_path })?;
        let lift_js: JSValue =
            serde_json::from_slice(&bytes).context(ParsingJsonSnafu {})?;
        js.insert("true_lift".to_string(), lift_js["treatment_lift"].clone());
        js.insert(
            "base_behavior_rate".to_string(),
            lift_js["base_behavior_rate"].clone(),
        );
    }
    Ok(JSValue::Object(js))
}

// ********* Power analysis *********

pub const DEFAULT_CONTROL_PROPORTION: f64 = 0.5;
pub const DEFAULT_POWER: f64 = 0.8;

fn size_check_js(check: &SizeCheck) -> JSValue {
    json!({
        "required": check.required,
        "available": check.available,
        "shortfall": check.shortfall,
        "sufficient": check.shortfall.is_none(),
    })
}

/// Answers "how large must the list be" before any list is generated.
pub fn run_power(config: &PowerConfig) -> VrmResult<JSValue> {
    let control_proportion = config
        .control_proportion
        .unwrap_or(DEFAULT_CONTROL_PROPORTION);
    let power = config.power.unwrap_or(DEFAULT_POWER);
    let alpha = config.alpha.unwrap_or(DEFAULT_ALPHA);
    let requirement = power_analysis(
        config.baseline_rate,
        config.min_lift,
        control_proportion,
        power,
        alpha,
    )
    .context(EngineSnafu {})?;

    let mut js: JSMap<String, JSValue> = JSMap::new();
    js.insert("baseline_rate".to_string(), json!(config.baseline_rate));
    js.insert("min_lift".to_string(), json!(config.min_lift));
    js.insert("cohen_h".to_string(), json!(requirement.cohen_h));
    js.insert("alpha".to_string(), json!(requirement.alpha));
    js.insert("power".to_string(), json!(requirement.power));
    js.insert(
        "required".to_string(),
        json!({
            "control": requirement.control,
            "treatment": requirement.treatment,
            "total": requirement.total,
        }),
    );
    js.insert(
        "required_rounded".to_string(),
        json!({
            "control": requirement.control_rounded,
            "treatment": requirement.treatment_rounded,
            "total": requirement.total_rounded,
        }),
    );
    if let Some(available) = config.candidate_size {
        let check = check_candidate(&requirement, available);
        js.insert("candidate".to_string(), size_check_js(&check));
    }
    if let Some(subgroups) = &config.subgroup_sizes {
        let counts: Vec<(String, u64)> = subgroups
            .iter()
            .map(|(name, n)| (name.clone(), *n))
            .collect();
        let mut checks: JSMap<String, JSValue> = JSMap::new();
        for (name, check) in check_subgroups(&requirement, &counts) {
            checks.insert(name, size_check_js(&check));
        }
        js.insert("subgroups".to_string(), JSValue::Object(checks));
    }
    Ok(JSValue::Object(js))
}

// ********* Command dispatch *********

fn emit_report(js: &JSValue, reference: &Option<String>, out: &Option<String>) -> VrmResult<()> {
    let pretty = serde_json::to_string_pretty(js).context(ParsingJsonSnafu {})?;
    if let Some(reference_path) = reference {
        let reference_js = read_summary(reference_path)?;
        let pretty_ref =
            serde_json::to_string_pretty(&reference_js).context(ParsingJsonSnafu {})?;
        if pretty_ref != pretty {
            warn!("Found differences with the reference report");
            print_diff(pretty_ref.as_str(), pretty.as_str(), "\n");
            whatever!("Difference detected between calculated report and reference report");
        }
    }
    match out {
        Some(path) if path != "stdout" => {
            fs::write(path, pretty).context(OpeningJsonSnafu {})?;
        }
        _ => println!("{}", pretty),
    }
    Ok(())
}

pub fn run(args: &crate::args::Args) -> VrmResult<()> {
    let store = LocalDirStore::new(args.store.clone().unwrap_or_else(|| ".".to_string()));
    let notifier = notify::LogNotifier;
    if let Some(config_path) = &args.config {
        let config = read_request_config(config_path)?;
        let voters = io_csv::read_voter_file(&config.voter_file)?;
        let runner = RequestRunner::new(&store, &notifier);
        let outcome = runner.run_request(&voters, &config)?;
        let js = json!({
            "experiment_id": outcome.slug,
            "selected": outcome.selected,
            "control": outcome.control_count,
            "treatment": outcome.treatment_count,
            "control_households": outcome.control_households,
            "treatment_households": outcome.treatment_households,
        });
        emit_report(&js, &args.reference, &args.out)
    } else if let Some(slug) = &args.simulate {
        let defaults = SimulationSettings::default();
        let settings = SimulationSettings {
            base_rate: args.base_rate.unwrap_or(defaults.base_rate),
            lift_range: (
                args.lift_min.unwrap_or(defaults.lift_range.0),
                args.lift_max.unwrap_or(defaults.lift_range.1),
            ),
            seed: args.seed,
        };
        let js = run_simulation(&store, slug, &settings)?;
        emit_report(&js, &args.reference, &args.out)
    } else if let Some(slug) = &args.analyze {
        let js = run_analysis(&store, slug, args.alpha.unwrap_or(DEFAULT_ALPHA))?;
        emit_report(&js, &args.reference, &args.out)
    } else if let Some(power_path) = &args.power {
        let config = read_power_config(power_path)?;
        let js = run_power(&config)?;
        emit_report(&js, &args.reference, &args.out)
    } else {
        whatever!("Nothing to do: pass --config, --simulate, --analyze or --power")
    }
}
