use clap::Parser;

/// Generates randomized control and treatment mailing lists from a voter file.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A mailing-list request in JSON format. Running a
    /// request filters the voter file, splits it into control and treatment
    /// groups and writes the four list files into the store.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory path) The root of the list store. Request namespaces are
    /// created under lists/ inside it. Defaults to the current directory.
    #[clap(short, long, value_parser)]
    pub store: Option<String>,

    /// (experiment id, optional) Generates synthetic outcomes for an existing
    /// request namespace and writes them under its sample_results/ directory.
    #[clap(long, value_parser)]
    pub simulate: Option<String>,

    /// (default 0.1) The base behavior rate used by --simulate.
    #[clap(long, value_parser)]
    pub base_rate: Option<f64>,

    /// (default 0.0) Lower bound of the range the simulated treatment lift is
    /// drawn from.
    #[clap(long, value_parser)]
    pub lift_min: Option<f64>,

    /// (default 0.05) Upper bound of the range the simulated treatment lift is
    /// drawn from.
    #[clap(long, value_parser)]
    pub lift_max: Option<f64>,

    /// (experiment id, optional) Runs the two-proportion significance analysis
    /// over the generated outcomes of an existing request namespace.
    #[clap(long, value_parser)]
    pub analyze: Option<String>,

    /// (default 0.05) The significance level used by --analyze.
    #[clap(long, value_parser)]
    pub alpha: Option<f64>,

    /// (file path, optional) A power-analysis question in JSON format: the
    /// baseline rate and minimum lift to detect, plus optional candidate and
    /// subgroup sizes to check against the requirement.
    #[clap(long, value_parser)]
    pub power: Option<String>,

    /// (file path) A reference report in JSON format. If provided, vrmail will
    /// check that the computed report matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the report will be written
    /// in JSON format to the given location instead of the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (optional) Seed for the random number generator. Splits and simulations
    /// are reproducible when set.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
