use crate::cli::OutputFormat;
use crate::scenario::StepOutcome;
use colored::Colorize;
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_outcomes(outcomes: &[StepOutcome], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let steps: Vec<Value> = outcomes.iter().map(outcome_json).collect();
            println!("{}", serde_json::to_string_pretty(&steps)?);
        }
        OutputFormat::Table => print_as_table(outcomes),
    }
    Ok(())
}

fn outcome_json(outcome: &StepOutcome) -> Value {
    let (result, error) = match &outcome.result {
        Ok(value) => (value.clone(), Value::Null),
        Err(e) => (Value::Null, json!(e.to_string())),
    };
    json!({
        "step": outcome.index,
        "caller": outcome.caller,
        "channel": outcome.channel,
        "timestamp": outcome.timestamp,
        "function": outcome.function,
        "outcome": outcome.outcome(),
        "expected": outcome.expected,
        "matched": outcome.matched(),
        "result": result,
        "error": error,
    })
}

fn print_as_table(outcomes: &[StepOutcome]) {
    if outcomes.is_empty() {
        println!("No steps replayed.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["#", "Time", "Caller", "Channel", "Function", "Outcome", "Detail"]);
    for outcome in outcomes {
        let detail = match &outcome.result {
            Ok(_) => String::new(),
            Err(e) => e.to_string(),
        };
        let status = if outcome.matched() {
            outcome.outcome().green().to_string()
        } else {
            format!(
                "{} (expected {})",
                outcome.outcome(),
                outcome.expected.as_deref().unwrap_or("-")
            )
            .red()
            .to_string()
        };
        builder.push_record([
            outcome.index.to_string(),
            outcome.time(),
            outcome.caller.clone(),
            outcome.channel.clone(),
            outcome.function.clone(),
            status,
            detail,
        ]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}
