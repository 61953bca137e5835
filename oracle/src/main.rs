use anyhow::Context;
use objsize_oracle::{Config, Harness, Report, suites};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = Config::from_lookup(|key| std::env::var(key).ok()).context("reading configuration")?;
    tracing::info!(?config, "starting conformance run");

    let harness = Harness::new(config);
    let mut total = Report { suite: "total".to_string(), ..Report::default() };
    for suite in suites::all() {
        suite.check().with_context(|| format!("suite '{}' is malformed", suite.name))?;
        let report = harness.run(&suite);
        println!("{report}");
        total.merge(report);
    }
    println!("{total}");

    std::process::exit(total.exit_code());
}
