use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use keystone_core::{Config, LogEntry, Severity};
use keystone_logging::{Filter, LogWriter, WriteOutcome};
use keystone_validation::{
    validate_subject, AndCompositeValidator, DomainValidator, NotNullValidator,
    ObjectValidator, OrCompositeValidator, RangeValidator, RegexValidator,
    RelativeDateTimeValidator, SelfValidatable, StringLengthValidator, ValidationResult,
    ValidationResults, Validator,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Keystone - logging pipeline and validation engine examples
#[derive(Parser, Debug)]
#[command(name = "keystone")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Which demo to run: logging, validation, or all
    #[arg(short, long, default_value = "all")]
    demo: String,

    /// Enable verbose diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        let config = Config::default();
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    if args.verbose {
        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = if let Some(ref config_path) = args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    if args.demo == "logging" || args.demo == "all" {
        run_logging_demo(&config)?;
    }
    if args.demo == "validation" || args.demo == "all" {
        run_validation_demo()?;
    }

    Ok(())
}

fn run_logging_demo(config: &Config) -> Result<()> {
    println!("=== Logging pipeline ===");
    let writer = LogWriter::from_config(config)?;
    info!("log writer built from configuration");

    if !writer.is_logging_enabled() {
        println!("logging is disabled in the configuration");
        return Ok(());
    }

    // Simplest possible write: default category, priority, and severity
    let outcome = writer.write(&LogEntry::new("Log entry created using the simplest overload."));
    println!("simple entry: {}", describe(&outcome));

    // Fully specified entry
    let entry = LogEntry::new("Log entry with a category, priority, event ID, severity, and title.")
        .with_category("General")
        .with_priority(8)
        .with_event_id(9003)
        .with_severity(Severity::Warning)
        .with_title("Logging Examples");
    println!("full entry: {}", describe(&writer.write(&entry)));

    // One entry fanned out to two sources
    let entry = LogEntry::new("Log entry with multiple categories.")
        .with_categories(["DiskFiles", "Important"])
        .with_priority(7)
        .with_event_id(9004);
    println!("multi-category entry: {}", describe(&writer.write(&entry)));

    // A category no source claims lands on the unprocessed fallback
    let entry = LogEntry::new("Entry with a category not defined in the configuration.")
        .with_category("InvalidCategory");
    println!("unmatched category: {}", describe(&writer.write(&entry)));

    // Dynamic reconfiguration: priority 106 is blocked, then allowed
    let high = LogEntry::new("Log entry with priority 106.")
        .with_category("General")
        .with_priority(106)
        .with_event_id(9001);
    println!("priority 106: {}", describe(&writer.write(&high)));

    writer.reconfigure_filters(vec![Filter::Priority { min: 2, max: 199 }]);
    println!("raised the priority filter ceiling to 199");
    println!("priority 106 again: {}", describe(&writer.write(&high)));

    let report = writer.shutdown();
    println!(
        "shutdown: {} flush failure(s), {} dropped entr(ies)",
        report.flush_failures.len(),
        report.dropped_entries
    );
    println!();
    Ok(())
}

fn describe(outcome: &WriteOutcome) -> String {
    match outcome {
        WriteOutcome::Delivered(report) => {
            let mut text = format!("delivered to {} sink(s)", report.delivered);
            if !report.rejected_sources.is_empty() {
                text.push_str(&format!(
                    ", skipped sources {:?}",
                    report.rejected_sources
                ));
            }
            if !report.unmatched_categories.is_empty() {
                text.push_str(&format!(
                    ", unmatched categories {:?}",
                    report.unmatched_categories
                ));
            }
            if !report.sink_failures.is_empty() {
                text.push_str(&format!(", {} sink failure(s)", report.sink_failures.len()));
            }
            text
        }
        WriteOutcome::Filtered => "rejected by the filter chain".to_string(),
        WriteOutcome::NoMatchingSource => "no matching source".to_string(),
        WriteOutcome::ShuttingDown => "writer is shutting down".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct Product {
    id: String,
    name: String,
    description: Option<String>,
    product_type: String,
    in_stock: i32,
    on_order: i32,
    date_due: Option<String>,
}

impl SelfValidatable for Product {
    fn self_validate(&self, results: &mut ValidationResults) {
        match self.date_due {
            None => {
                if self.on_order > 0 {
                    results.add(ValidationResult::new(
                        "must provide a delivery due date for stock on back order",
                        "ProductSelfValidation",
                    ));
                }
            }
            Some(_) => {
                if self.on_order == 0 {
                    results.add(ValidationResult::new(
                        "can specify a delivery due date only when stock is on back order",
                        "ProductSelfValidation",
                    ));
                }
            }
        }
        if self.in_stock + self.on_order > 100 {
            results.add(ValidationResult::new(
                "total inventory (in stock and on order) cannot exceed 100 items",
                "ProductSelfValidation",
            ));
        }
    }
}

fn product_rules() -> Result<ObjectValidator> {
    Ok(ObjectValidator::builder()
        .field(
            "id",
            vec![Box::new(AndCompositeValidator::new(vec![
                Box::new(NotNullValidator::new().with_message("you must specify a product id")),
                Box::new(
                    StringLengthValidator::new(6, 6)
                        .with_message("product id must be {min} characters"),
                ),
                Box::new(
                    RegexValidator::new("^[A-Z]{2}[0-9]{4}$")?
                        .with_message("product id must be 2 capital letters and 4 numbers"),
                ),
            ])
            .with_message("product id is invalid"))],
        )
        .field(
            "name",
            vec![Box::new(
                StringLengthValidator::new(3, 50)
                    .with_message("name must be between {min} and {max} characters"),
            )],
        )
        .field(
            "description",
            vec![Box::new(
                OrCompositeValidator::new(vec![
                    Box::new(NotNullValidator::negated()),
                    Box::new(StringLengthValidator::new(5, 100)),
                ])
                .with_message("description can be null or 5 to 100 characters"),
            )],
        )
        .field(
            "product_type",
            vec![Box::new(
                DomainValidator::new(["FunThings", "UsefulThings", "BoringThings"])
                    .with_message("product type '{value}' must be one of [{list}]"),
            )],
        )
        .field(
            "in_stock",
            vec![Box::new(
                RangeValidator::at_least(0.0)
                    .with_message("quantity in stock cannot be less than {min}"),
            )],
        )
        .field(
            "on_order",
            vec![Box::new(
                RangeValidator::at_least(0.0)
                    .with_message("quantity on order cannot be less than {min}"),
            )],
        )
        .field(
            "date_due",
            vec![Box::new(
                OrCompositeValidator::new(vec![
                    Box::new(NotNullValidator::negated()),
                    Box::new(RelativeDateTimeValidator::days_from_now(0, 183)),
                ])
                .with_message("date due must be null or within six months from now"),
            )],
        )
        .build())
}

fn run_validation_demo() -> Result<()> {
    println!("=== Validation engine ===");
    let rules = product_rules()?;

    let valid = Product {
        id: "AA1234".to_string(),
        name: "A Valid Product".to_string(),
        description: Some("Something to keep the grandchildren quiet".to_string()),
        product_type: "FunThings".to_string(),
        in_stock: 3,
        on_order: 12,
        date_due: Some((Utc::now() + Duration::days(60)).to_rfc3339()),
    };
    println!("validating a well-formed product:");
    print!("{}", validate_subject(&rules, &valid));

    let invalid = Product {
        id: "42".to_string(),
        name: "An Invalid Product".to_string(),
        description: Some("-".to_string()),
        product_type: "FurryThings".to_string(),
        in_stock: -3,
        on_order: 9000,
        date_due: Some((Utc::now() + Duration::days(270)).to_rfc3339()),
    };
    println!("validating a product full of bad values:");
    let results = validate_subject(&rules, &invalid);
    print!("{}", results);

    // The flat representation that would cross a service boundary
    println!(
        "as faults: {}",
        serde_json::to_string_pretty(&results.faults())?
    );

    // Standalone validator usage
    let domain = DomainValidator::new([1, 3, 7, 11, 13]);
    let results = domain.validate(&serde_json::json!(42));
    println!("domain check of 42:");
    print!("{}", results);

    Ok(())
}
