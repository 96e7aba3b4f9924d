//! Wire types of the external verification API (`/v2/verify`).
//!
//! Requests are built from a stored compilation: its standard JSON input is
//! reassembled from the compiler settings and the source files, with the
//! settings the API rejects stripped out.

use crate::hex::to_prefixed_hex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Compiler setting that solc rejects but stored settings carry.
pub const REJECTED_SETTING: &str = "compilationTarget";

/// `customCode` reported by the API when the contract is already verified.
pub const ALREADY_VERIFIED_CODE: &str = "already_verified";

/// One source file in a standard JSON input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceContent {
    pub content: String,
}

/// Compiler standard JSON input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StdJsonInput {
    pub language: String,
    pub sources: BTreeMap<String, SourceContent>,
    pub settings: Value,
}

/// Body of `POST /v2/verify/{chainId}/{address}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub std_json_input: StdJsonInput,
    pub compiler_version: String,
    pub contract_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_transaction_hash: Option<String>,
}

/// The parts of a stored compilation needed to rebuild its verification request.
#[derive(Clone, Copy, Debug)]
pub struct CompilationInput<'a> {
    pub language: &'a str,
    pub version: &'a str,
    pub name: &'a str,
    pub fully_qualified_name: &'a str,
    pub compiler_settings: &'a Value,
}

/// Map a stored language to the label the compiler input expects.
pub fn language_label(language: &str) -> &'static str {
    if language.eq_ignore_ascii_case("solidity") {
        "Solidity"
    } else {
        "Vyper"
    }
}

/// Normalize stored compiler settings for submission.
///
/// Settings may be stored as a JSON object or as a JSON-encoded string.
/// `compilationTarget` is removed and every output is requested.
pub fn sanitize_settings(settings: &Value) -> crate::Result<Value> {
    let mut object: Map<String, Value> = match settings {
        Value::Object(map) => map.clone(),
        Value::String(raw) => match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(crate::Error::InvalidSettings(
                    "encoded settings are not an object".to_string(),
                ));
            }
            Err(e) => return Err(crate::Error::InvalidSettings(e.to_string())),
        },
        Value::Null => Map::new(),
        other => {
            return Err(crate::Error::InvalidSettings(format!(
                "expected an object, got {other}"
            )));
        }
    };
    object.remove(REJECTED_SETTING);
    object.insert("outputSelection".to_string(), json!({"*": {"*": ["*"]}}));
    Ok(Value::Object(object))
}

impl VerifyRequest {
    /// Build a request from a compilation, its `(path, content)` sources and
    /// the optional creation transaction hash.
    pub fn build<I>(
        compilation: CompilationInput<'_>,
        sources: I,
        creation_transaction_hash: Option<&[u8]>,
    ) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let sources = sources
            .into_iter()
            .map(|(path, content)| (path, SourceContent { content }))
            .collect();
        let contract_identifier = if compilation.fully_qualified_name.is_empty() {
            compilation.name.to_string()
        } else {
            compilation.fully_qualified_name.to_string()
        };
        Ok(Self {
            std_json_input: StdJsonInput {
                language: language_label(compilation.language).to_string(),
                sources,
                settings: sanitize_settings(compilation.compiler_settings)?,
            },
            compiler_version: compilation.version.to_string(),
            contract_identifier,
            creation_transaction_hash: creation_transaction_hash.map(to_prefixed_hex),
        })
    }
}

/// 202 body of a submission.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAccepted {
    pub verification_id: String,
}

/// Body of `GET /v2/verify/{jobId}`.
///
/// `contract` and `error` are kept as raw JSON: the service returns an error
/// object on most failures but plain strings on some.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    #[serde(default)]
    pub is_job_completed: bool,
    pub status: Option<String>,
    pub contract: Option<Value>,
    pub error: Option<Value>,
}

impl JobStatusResponse {
    /// `contract.match`, when it is a string.
    pub fn match_kind(&self) -> Option<&str> {
        self.contract.as_ref()?.get("match")?.as_str()
    }
}

/// Classified result of a job status query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// Completed with a non-null match.
    Verified { match_kind: String },
    /// The service already had this contract.
    AlreadyVerified,
    /// Terminal failure; carries the response body verbatim.
    Failed { error: String },
    /// Not finished, or the answer was transient. Check again next pass.
    Pending,
}

/// True for an error object whose `customCode` is `already_verified`.
fn is_already_verified(error: Option<&Value>) -> bool {
    error
        .and_then(|e| e.get("customCode"))
        .and_then(Value::as_str)
        .is_some_and(|code| code == ALREADY_VERIFIED_CODE)
}

/// Classify a job status response by HTTP status and raw body.
pub fn classify_job_status(http_status: u16, body: &str) -> JobOutcome {
    match http_status {
        200..=299 => {
            let Ok(job) = serde_json::from_str::<JobStatusResponse>(body) else {
                return JobOutcome::Pending;
            };
            if job.is_job_completed
                && let Some(match_kind) = job.match_kind()
            {
                return JobOutcome::Verified {
                    match_kind: match_kind.to_string(),
                };
            }
            if is_already_verified(job.error.as_ref()) {
                return JobOutcome::AlreadyVerified;
            }
            if job.is_job_completed {
                return JobOutcome::Failed {
                    error: body.to_string(),
                };
            }
            JobOutcome::Pending
        }
        400..=499 if http_status != 429 => {
            // Error responses carry the error object at the top level.
            let top_level = serde_json::from_str::<Value>(body).ok();
            let nested = top_level.as_ref().and_then(|value| value.get("error"));
            if is_already_verified(top_level.as_ref()) || is_already_verified(nested) {
                JobOutcome::AlreadyVerified
            } else {
                JobOutcome::Failed {
                    error: body.to_string(),
                }
            }
        }
        _ => JobOutcome::Pending,
    }
}

/// Extract a human-readable error from a rejection body.
pub fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Option<Value>,
        message: Option<String>,
    }
    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope {
            error: Some(Value::String(error)),
            ..
        }) => error,
        Ok(Envelope {
            message: Some(message),
            ..
        }) => message,
        Ok(Envelope {
            error: Some(error), ..
        }) => error.to_string(),
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compilation(settings: &Value) -> CompilationInput<'_> {
        CompilationInput {
            language: "solidity",
            version: "v0.8.19+commit.7dd6d404",
            name: "Token",
            fully_qualified_name: "contracts/Token.sol:Token",
            compiler_settings: settings,
        }
    }

    #[test]
    fn test_build_strips_compilation_target() {
        let settings = json!({
            "optimizer": {"enabled": true, "runs": 200},
            "compilationTarget": {"contracts/Token.sol": "Token"}
        });
        let request = VerifyRequest::build(
            compilation(&settings),
            vec![("contracts/Token.sol".to_string(), "contract Token {}".to_string())],
            Some(&[0xab, 0xcd]),
        )
        .unwrap();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["stdJsonInput"]["language"], "Solidity");
        assert!(body["stdJsonInput"]["settings"].get(REJECTED_SETTING).is_none());
        assert_eq!(body["stdJsonInput"]["settings"]["optimizer"]["runs"], 200);
        assert_eq!(
            body["stdJsonInput"]["settings"]["outputSelection"],
            json!({"*": {"*": ["*"]}})
        );
        assert_eq!(
            body["stdJsonInput"]["sources"]["contracts/Token.sol"]["content"],
            "contract Token {}"
        );
        assert_eq!(body["contractIdentifier"], "contracts/Token.sol:Token");
        assert_eq!(body["creationTransactionHash"], "0xabcd");
    }

    #[test]
    fn test_build_falls_back_to_plain_name() {
        let settings = json!("{\"evmVersion\":\"paris\"}");
        let mut input = compilation(&settings);
        input.fully_qualified_name = "";
        input.language = "vyper";
        let request = VerifyRequest::build(input, Vec::new(), None).unwrap();
        assert_eq!(request.contract_identifier, "Token");
        assert_eq!(request.std_json_input.language, "Vyper");
        assert_eq!(request.std_json_input.settings["evmVersion"], "paris");

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("creationTransactionHash").is_none());
    }

    #[test]
    fn test_sanitize_rejects_non_object() {
        assert!(sanitize_settings(&json!([1, 2])).is_err());
        assert!(sanitize_settings(&json!("not json")).is_err());
    }

    #[test]
    fn test_classify_completed_match() {
        let body = r#"{"isJobCompleted":true,"contract":{"match":"perfect"}}"#;
        assert_eq!(
            classify_job_status(200, body),
            JobOutcome::Verified {
                match_kind: "perfect".to_string()
            }
        );
    }

    #[test]
    fn test_classify_already_verified() {
        let nested = r#"{"isJobCompleted":true,"contract":{"match":null},
            "error":{"customCode":"already_verified","message":"done"}}"#;
        assert_eq!(classify_job_status(200, nested), JobOutcome::AlreadyVerified);

        let top_level = r#"{"customCode":"already_verified","message":"done"}"#;
        assert_eq!(classify_job_status(409, top_level), JobOutcome::AlreadyVerified);
    }

    #[test]
    fn test_classify_failed_keeps_body_verbatim() {
        let body = r#"{"isJobCompleted":true,"contract":{"match":null},"error":{"customCode":"no_match"}}"#;
        assert_eq!(
            classify_job_status(200, body),
            JobOutcome::Failed {
                error: body.to_string()
            }
        );
        assert_eq!(
            classify_job_status(404, "{\"customCode\":\"not_found\"}"),
            JobOutcome::Failed {
                error: "{\"customCode\":\"not_found\"}".to_string()
            }
        );
    }

    #[test]
    fn test_classify_string_error_is_terminal() {
        let body = r#"{"isJobCompleted":true,"contract":{"match":null},"error":"compilation failed"}"#;
        assert_eq!(
            classify_job_status(200, body),
            JobOutcome::Failed {
                error: body.to_string()
            }
        );

        let no_contract = r#"{"isJobCompleted":true,"error":"internal"}"#;
        assert_eq!(
            classify_job_status(200, no_contract),
            JobOutcome::Failed {
                error: no_contract.to_string()
            }
        );

        let string_4xx = r#"{"error":"Not found"}"#;
        assert_eq!(
            classify_job_status(404, string_4xx),
            JobOutcome::Failed {
                error: string_4xx.to_string()
            }
        );
    }

    #[test]
    fn test_classify_pending_and_transient() {
        let running = r#"{"isJobCompleted":false,"contract":{"match":null}}"#;
        assert_eq!(classify_job_status(200, running), JobOutcome::Pending);
        assert_eq!(classify_job_status(503, "unavailable"), JobOutcome::Pending);
        assert_eq!(classify_job_status(429, "{}"), JobOutcome::Pending);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"bad input"}"#), "bad input");
        assert_eq!(error_message(r#"{"message":"nope"}"#), "nope");
        assert_eq!(error_message("plain text"), "plain text");
    }
}
