//! Contact-fetch helper
//!
//! Runs one fixed SOQL query through a [`Bridge`], normalizes whatever comes
//! back into a record sequence and prints a readable summary:
//!
//! ```text
//! build_query → bridge.query → ResultShape::classify → report
//!                     │
//!                     └─ error → log + capability dump → return error
//! ```
//!
//! Nothing is kept between calls.

use serde_json::Value;
use std::io::Write;
use tracing::debug;

use crate::bridge::Bridge;
use crate::{Error, Result};

/// Limit used when the caller does not pick one
pub const DEFAULT_LIMIT: u32 = 20;

/// Fields selected from each contact, in output order
pub const CONTACT_FIELDS: [&str; 5] = ["Id", "FirstName", "LastName", "Email", "Phone"];

/// How many capability names are printed when the bridge fails
const MAX_CAPABILITY_NAMES: usize = 200;

const PREFIX: &str = "[fetch_contacts]";

/// Build the contact query. `limit` is inserted as a plain decimal.
pub fn build_query(limit: u32) -> String {
    format!(
        "SELECT {} FROM Contact WHERE Email != NULL LIMIT {}",
        CONTACT_FIELDS.join(", "),
        limit
    )
}

/// Shape of a bridge result
#[derive(Debug, Clone, PartialEq)]
pub enum ResultShape {
    /// A mapping with a `records` sequence, e.g. `{"records": [...], "totalSize": n}`
    Records(Vec<Value>),
    /// The result is the sequence itself
    BareSequence(Vec<Value>),
    /// A mapping with a `records` entry that is not a sequence
    MalformedRecords(Value),
    /// Anything else, kept untouched
    Unexpected(Value),
}

impl ResultShape {
    /// Classify a bridge result
    ///
    /// A mapping whose `records` entry is not a sequence is malformed; only
    /// the `records` value is kept.
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => ResultShape::BareSequence(items),
            Value::Object(mut map) => match map.remove("records") {
                Some(Value::Array(records)) => ResultShape::Records(records),
                Some(other) => ResultShape::MalformedRecords(other),
                None => ResultShape::Unexpected(Value::Object(map)),
            },
            other => ResultShape::Unexpected(other),
        }
    }
}

/// What [`fetch_contacts`] hands back
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Normalized record sequence
    Records(Vec<Value>),
    /// The raw bridge result, returned as-is because its shape was not recognized
    Unexpected(Value),
}

impl FetchOutcome {
    /// The records, if the result was recognized
    pub fn records(&self) -> Option<&[Value]> {
        match self {
            FetchOutcome::Records(records) => Some(records),
            FetchOutcome::Unexpected(_) => None,
        }
    }

    /// Convert back into a single JSON value
    pub fn into_value(self) -> Value {
        match self {
            FetchOutcome::Records(records) => Value::Array(records),
            FetchOutcome::Unexpected(value) => value,
        }
    }
}

/// Fetch contacts, printing progress to stdout
pub async fn fetch_contacts<B>(bridge: &B, limit: u32) -> Result<FetchOutcome>
where
    B: Bridge + ?Sized,
{
    let mut out = std::io::stdout();
    fetch_contacts_to(bridge, limit, &mut out).await
}

/// Fetch contacts, printing progress to `out`
///
/// On a bridge failure, or when `records` is not a sequence of mappings, the
/// error is logged, the bridge's capability names are dumped (failures there
/// are ignored) and the error is returned.
pub async fn fetch_contacts_to<B, W>(bridge: &B, limit: u32, out: &mut W) -> Result<FetchOutcome>
where
    B: Bridge + ?Sized,
    W: Write + Send,
{
    let soql = build_query(limit);
    writeln!(out, "{} Running SOQL: {}", PREFIX, soql)?;

    debug!("Submitting contact query to {}", bridge.name());

    let result = match bridge.query(&soql).await {
        Ok(value) => value,
        Err(err) => return Err(report_failure(bridge, out, err)),
    };

    let records = match ResultShape::classify(result) {
        ResultShape::Records(records) | ResultShape::BareSequence(records) => records,
        ResultShape::MalformedRecords(value) => {
            let err = Error::Protocol(format!(
                "'records' is {}, not a sequence",
                json_type(&value)
            ));
            return Err(report_failure(bridge, out, err));
        }
        ResultShape::Unexpected(value) => {
            writeln!(
                out,
                "{} Unexpected result shape from MCP tool: {}",
                PREFIX,
                json_type(&value)
            )?;
            match &value {
                Value::String(s) => writeln!(out, "{}", s)?,
                other => writeln!(out, "{}", other)?,
            }
            return Ok(FetchOutcome::Unexpected(value));
        }
    };

    writeln!(out, "{} Retrieved {} contacts", PREFIX, records.len())?;
    for (i, record) in records.iter().enumerate() {
        if !record.is_object() {
            let err = Error::Protocol(format!(
                "record {} is {}, not a mapping",
                i,
                json_type(record)
            ));
            return Err(report_failure(bridge, out, err));
        }
        writeln!(out, "{}", format_record(record))?;
    }

    Ok(FetchOutcome::Records(records))
}

/// One output line per record: `Id | FirstName LastName | Email | Phone`
///
/// Missing or null fields print as `None`.
pub fn format_record(record: &Value) -> String {
    format!(
        "{} | {} {} | {} | {}",
        field(record, "Id"),
        field(record, "FirstName"),
        field(record, "LastName"),
        field(record, "Email"),
        field(record, "Phone"),
    )
}

fn field(record: &Value, key: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Log `err`, dump the bridge's capabilities and hand `err` back
fn report_failure<B, W>(bridge: &B, out: &mut W, err: Error) -> Error
where
    B: Bridge + ?Sized,
    W: Write,
{
    let _ = writeln!(out, "{} Error querying Salesforce: {}", PREFIX, err);
    dump_capabilities(bridge, out);
    err
}

fn dump_capabilities<B, W>(bridge: &B, out: &mut W)
where
    B: Bridge + ?Sized,
    W: Write,
{
    let _ = writeln!(
        out,
        "{} Inspecting salesforce_toolset methods for debugging:",
        PREFIX
    );

    match bridge.capability_names() {
        Ok(names) => {
            let shown: Vec<String> = names.into_iter().take(MAX_CAPABILITY_NAMES).collect();
            let _ = writeln!(out, "{:?}", shown);
        }
        Err(e) => debug!("Could not list bridge capabilities: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Bridge returning a canned answer and recording the queries it saw
    struct StubBridge {
        answer: std::result::Result<Value, String>,
        capabilities: std::result::Result<Vec<String>, String>,
        seen: Mutex<Vec<String>>,
    }

    impl StubBridge {
        fn returning(value: Value) -> Self {
            Self {
                answer: Ok(value),
                capabilities: Ok(vec!["query".to_string()]),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                answer: Err(message.to_string()),
                capabilities: Ok(vec!["call_tool".to_string(), "query".to_string()]),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn with_capabilities(
            mut self,
            capabilities: std::result::Result<Vec<String>, String>,
        ) -> Self {
            self.capabilities = capabilities;
            self
        }
    }

    #[async_trait]
    impl Bridge for StubBridge {
        fn name(&self) -> &str {
            "stub"
        }

        async fn query(&self, soql: &str) -> Result<Value> {
            self.seen.lock().unwrap().push(soql.to_string());
            self.answer.clone().map_err(Error::Bridge)
        }

        fn capability_names(&self) -> Result<Vec<String>> {
            self.capabilities.clone().map_err(Error::Bridge)
        }
    }

    async fn run(bridge: &StubBridge, limit: u32) -> (Result<FetchOutcome>, Vec<String>) {
        let mut out = Vec::new();
        let outcome = fetch_contacts_to(bridge, limit, &mut out).await;
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        (outcome, lines)
    }

    fn ada() -> Value {
        json!({
            "Id": "003A",
            "FirstName": "Ada",
            "LastName": "Lovelace",
            "Email": "ada@example.com",
            "Phone": "555-0100"
        })
    }

    fn grace() -> Value {
        json!({
            "Id": "003B",
            "FirstName": "Grace",
            "LastName": "Hopper",
            "Email": "grace@example.com"
        })
    }

    #[test]
    fn test_build_query_embeds_limit() {
        for limit in [1, 5, 20, 2000, u32::MAX] {
            let query = build_query(limit);
            assert!(query.ends_with(&format!("LIMIT {}", limit)));
        }
        assert_eq!(
            build_query(20),
            "SELECT Id, FirstName, LastName, Email, Phone FROM Contact WHERE Email != NULL LIMIT 20"
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            ResultShape::classify(json!({"records": [1, 2], "totalSize": 2})),
            ResultShape::Records(vec![json!(1), json!(2)])
        );
        assert_eq!(
            ResultShape::classify(json!([1])),
            ResultShape::BareSequence(vec![json!(1)])
        );
        assert_eq!(
            ResultShape::classify(json!("oops")),
            ResultShape::Unexpected(json!("oops"))
        );
        assert_eq!(
            ResultShape::classify(json!({"totalSize": 0})),
            ResultShape::Unexpected(json!({"totalSize": 0}))
        );
        assert_eq!(
            ResultShape::classify(json!({"records": null, "done": true})),
            ResultShape::MalformedRecords(Value::Null)
        );
    }

    #[test]
    fn test_format_record_missing_fields() {
        assert_eq!(
            format_record(&ada()),
            "003A | Ada Lovelace | ada@example.com | 555-0100"
        );
        assert_eq!(
            format_record(&grace()),
            "003B | Grace Hopper | grace@example.com | None"
        );
        assert_eq!(
            format_record(&json!({"Id": "003C", "Phone": null})),
            "003C | None None | None | None"
        );
    }

    #[tokio::test]
    async fn test_records_mapping() {
        let bridge = StubBridge::returning(json!({"records": [ada(), grace()], "totalSize": 2}));
        let (outcome, lines) = run(&bridge, 20).await;

        assert_eq!(outcome.unwrap(), FetchOutcome::Records(vec![ada(), grace()]));
        assert_eq!(
            lines,
            vec![
                "[fetch_contacts] Running SOQL: SELECT Id, FirstName, LastName, Email, Phone FROM Contact WHERE Email != NULL LIMIT 20",
                "[fetch_contacts] Retrieved 2 contacts",
                "003A | Ada Lovelace | ada@example.com | 555-0100",
                "003B | Grace Hopper | grace@example.com | None",
            ]
        );
        assert_eq!(bridge.seen.lock().unwrap().as_slice(), [build_query(20)]);
    }

    #[tokio::test]
    async fn test_bare_sequence() {
        let bridge = StubBridge::returning(json!([ada()]));
        let (outcome, lines) = run(&bridge, 5).await;

        assert_eq!(outcome.unwrap(), FetchOutcome::Records(vec![ada()]));
        assert_eq!(lines[1], "[fetch_contacts] Retrieved 1 contacts");
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn test_unexpected_shape_passes_through() {
        let bridge = StubBridge::returning(json!("Salesforce said hello"));
        let (outcome, lines) = run(&bridge, 5).await;

        assert_eq!(
            outcome.unwrap(),
            FetchOutcome::Unexpected(json!("Salesforce said hello"))
        );
        assert_eq!(
            lines[1],
            "[fetch_contacts] Unexpected result shape from MCP tool: string"
        );
        assert_eq!(lines[2], "Salesforce said hello");
        assert!(!lines.iter().any(|l| l.contains("Retrieved")));
    }

    #[tokio::test]
    async fn test_failure_is_reraised_after_diagnostics() {
        let bridge = StubBridge::failing("INVALID_LOGIN: bad password");
        let (outcome, lines) = run(&bridge, 5).await;

        assert!(matches!(
            outcome,
            Err(Error::Bridge(ref msg)) if msg == "INVALID_LOGIN: bad password"
        ));
        assert_eq!(
            lines[1],
            "[fetch_contacts] Error querying Salesforce: Bridge error: INVALID_LOGIN: bad password"
        );
        assert_eq!(
            lines[2],
            "[fetch_contacts] Inspecting salesforce_toolset methods for debugging:"
        );
        assert_eq!(lines[3], r#"["call_tool", "query"]"#);
    }

    #[tokio::test]
    async fn test_failing_introspection_is_tolerated() {
        let bridge = StubBridge::failing("timeout").with_capabilities(Err("gone".to_string()));
        let (outcome, lines) = run(&bridge, 5).await;

        assert!(matches!(outcome, Err(Error::Bridge(ref msg)) if msg == "timeout"));
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("[fetch_contacts] Inspecting"));
    }

    #[tokio::test]
    async fn test_capability_dump_is_capped() {
        let names = (0..250).map(|i| format!("tool_{}", i)).collect();
        let bridge = StubBridge::failing("boom").with_capabilities(Ok(names));
        let (_, lines) = run(&bridge, 5).await;

        assert!(lines[3].contains("\"tool_199\""));
        assert!(!lines[3].contains("\"tool_200\""));
    }

    #[tokio::test]
    async fn test_records_not_a_sequence_fails() {
        let bridge = StubBridge::returning(json!({"records": null, "totalSize": 0}));
        let (outcome, lines) = run(&bridge, 5).await;

        assert!(matches!(
            outcome,
            Err(Error::Protocol(ref msg)) if msg == "'records' is null, not a sequence"
        ));
        assert_eq!(
            lines[1],
            "[fetch_contacts] Error querying Salesforce: Protocol error: 'records' is null, not a sequence"
        );
        assert_eq!(
            lines[2],
            "[fetch_contacts] Inspecting salesforce_toolset methods for debugging:"
        );
        assert_eq!(lines[3], r#"["query"]"#);
        assert!(!lines.iter().any(|l| l.contains("Unexpected result shape")));
    }

    #[tokio::test]
    async fn test_non_mapping_record_fails() {
        let bridge = StubBridge::returning(json!([ada(), "003B", 7]));
        let (outcome, lines) = run(&bridge, 5).await;

        assert!(matches!(
            outcome,
            Err(Error::Protocol(ref msg)) if msg == "record 1 is string, not a mapping"
        ));
        assert_eq!(
            lines,
            vec![
                "[fetch_contacts] Running SOQL: SELECT Id, FirstName, LastName, Email, Phone FROM Contact WHERE Email != NULL LIMIT 5",
                "[fetch_contacts] Retrieved 3 contacts",
                "003A | Ada Lovelace | ada@example.com | 555-0100",
                "[fetch_contacts] Error querying Salesforce: Protocol error: record 1 is string, not a mapping",
                "[fetch_contacts] Inspecting salesforce_toolset methods for debugging:",
                r#"["query"]"#,
            ]
        );
    }

    #[tokio::test]
    async fn test_calls_are_independent() {
        let bridge = StubBridge::returning(json!({"records": [ada()], "totalSize": 1}));
        let (first, first_lines) = run(&bridge, 7).await;
        let (second, second_lines) = run(&bridge, 7).await;

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(first_lines, second_lines);
        assert_eq!(bridge.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = FetchOutcome::Records(vec![ada()]);
        assert_eq!(outcome.records().map(<[Value]>::len), Some(1));
        assert_eq!(outcome.into_value(), json!([ada()]));

        let raw = FetchOutcome::Unexpected(json!(42));
        assert!(raw.records().is_none());
        assert_eq!(raw.into_value(), json!(42));
    }
}
