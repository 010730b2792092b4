use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ehrgate_auth::{AuthError, AuthResult};
use ehrgate_core::{format_timestamp, parse_timestamp};
use ehrgate_db_memory::{InMemoryLedger, StaticIdentity, TransactionOptions};
use ehrgate_server::Gateway;
use ehrgate_storage::Invocation;
use serde::Deserialize;
use serde_json::Value;

/// A scripted sequence of invocations by named callers.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub callers: BTreeMap<String, CallerSpec>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct CallerSpec {
    pub id: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub caller: String,
    pub channel: String,
    pub timestamp: StepTime,
    #[serde(default)]
    pub tx_id: Option<String>,
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// `"ok"` or an error kind such as `"access_denied"`.
    #[serde(default)]
    pub expect: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StepTime {
    Unix(i64),
    Text(String),
}

impl StepTime {
    fn seconds(&self) -> Result<i64> {
        match self {
            StepTime::Unix(seconds) => Ok(*seconds),
            StepTime::Text(text) => Ok(parse_timestamp(text)?),
        }
    }
}

/// What one step produced.
#[derive(Debug)]
pub struct StepOutcome {
    pub index: usize,
    pub caller: String,
    pub function: String,
    pub channel: String,
    /// Transaction time in unix seconds
    pub timestamp: i64,
    pub result: AuthResult<Value>,
    pub expected: Option<String>,
}

impl StepOutcome {
    pub fn outcome(&self) -> String {
        match &self.result {
            Ok(_) => "ok".to_string(),
            Err(e) => e.kind().to_string(),
        }
    }

    pub fn time(&self) -> String {
        format_timestamp(self.timestamp)
    }

    /// Steps without an expectation always match.
    pub fn matched(&self) -> bool {
        self.expected
            .as_deref()
            .is_none_or(|expected| expected == self.outcome())
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    fn identity(&self, name: &str) -> Result<StaticIdentity> {
        let caller = self
            .callers
            .get(name)
            .ok_or_else(|| anyhow!("Unknown caller {name:?}"))?;
        Ok(caller
            .attributes
            .iter()
            .fold(StaticIdentity::new(&caller.id), |identity, (k, v)| {
                identity.with_attribute(k, v)
            }))
    }

    /// Replays the steps in order. Each step runs in its own transaction,
    /// committed on success and discarded on error.
    pub fn replay(
        &self,
        gateway: &Gateway,
        ledger: &InMemoryLedger,
        keep_going: bool,
    ) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let identity = self.identity(&step.caller)?;
            let timestamp = step
                .timestamp
                .seconds()
                .with_context(|| format!("Step {index} has an invalid timestamp"))?;
            let args: Vec<String> = step.args.iter().map(argument).collect();

            let mut options = TransactionOptions::new(&step.channel, timestamp);
            if let Some(tx_id) = &step.tx_id {
                options = options.with_tx_id(tx_id);
            }
            let tx = ledger.begin(options);
            let invoked =
                gateway.invoke(Invocation::new(&tx, &tx, &identity), &step.function, &args);
            let result = match invoked {
                Ok(value) => tx.commit().map(|_| value).map_err(AuthError::from),
                Err(e) => {
                    tx.rollback();
                    Err(e)
                }
            };

            let outcome = StepOutcome {
                index,
                caller: step.caller.clone(),
                function: step.function.clone(),
                channel: step.channel.clone(),
                timestamp,
                result,
                expected: step.expect.clone(),
            };
            tracing::debug!(
                step = index,
                function = %outcome.function,
                outcome = %outcome.outcome(),
                "Step replayed"
            );
            let stop = !outcome.matched() && !keep_going;
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        Ok(outcomes)
    }
}

// Strings pass through; any other JSON value is handed over in its JSON text.
fn argument(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
