//! Grounded structured generation of test cases.
//!
//! Combines the user's prompt, retrieved context snippets, and a requested
//! count into one instruction for the generative model, then parses the
//! model's raw text back into typed [`TestCase`] records. The model's
//! output is untrusted: code fences are tolerated and stripped, the payload
//! must parse as a JSON array, and every element must match the test-case
//! shape — one bad element rejects the whole batch, since a partial result
//! would misrepresent the requested count.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{api_key_from_env, GenerationConfig};
use crate::error::{Error, Result};
use crate::models::TestCase;

const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Client for the configured generative-model provider.
pub struct GenerationClient {
    http: reqwest::Client,
    config: GenerationConfig,
    api_key: Option<String>,
}

impl GenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env);
        if config.provider == "google" && api_key.is_none() {
            return Err(Error::provider(
                "google",
                format!("{} environment variable not set", config.api_key_env),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::provider(&config.provider, e))?;

        Ok(Self {
            http,
            config: config.clone(),
            api_key,
        })
    }

    /// Generate `count` test cases grounded in the given context snippets.
    ///
    /// The count instruction is advisory to the model; when the returned
    /// count diverges it is logged, or rejected when `strict_count` is
    /// configured.
    pub async fn generate_test_cases(
        &self,
        prompt: &str,
        context_snippets: &[String],
        count: usize,
    ) -> Result<Vec<TestCase>> {
        if prompt.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "prompt must not be empty".to_string(),
            ));
        }
        if count == 0 || count > self.config.max_count {
            return Err(Error::InvalidArgument(format!(
                "count must be in 1..={}",
                self.config.max_count
            )));
        }

        let full_prompt = build_prompt(prompt, context_snippets, count);
        let raw = match self.config.provider.as_str() {
            "google" => self.complete_google(&full_prompt).await?,
            "ollama" => self.complete_ollama(&full_prompt).await?,
            other => {
                return Err(Error::provider(
                    other,
                    "unknown generation provider".to_string(),
                ))
            }
        };

        let cases = parse_test_cases(&raw)?;

        if cases.len() != count {
            if self.config.strict_count {
                return Err(Error::SchemaValidation {
                    message: format!(
                        "requested {} test cases, model returned {}",
                        count,
                        cases.len()
                    ),
                    indices: Vec::new(),
                });
            }
            tracing::warn!(
                requested = count,
                returned = cases.len(),
                "model ignored the count instruction"
            );
        }

        Ok(cases)
    }

    async fn complete_google(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize, Deserialize)]
        struct Part {
            text: String,
        }

        #[derive(Serialize, Deserialize)]
        struct Content {
            #[serde(skip_serializing_if = "Option::is_none")]
            role: Option<String>,
            parts: Vec<Part>,
        }

        #[derive(Serialize)]
        struct Request {
            contents: Vec<Content>,
        }

        #[derive(Deserialize)]
        struct Candidate {
            content: Content,
        }

        #[derive(Deserialize)]
        struct Response {
            candidates: Option<Vec<Candidate>>,
        }

        let base = self.config.url.as_deref().unwrap_or(GOOGLE_BASE_URL);
        let key = self.api_key.as_deref().unwrap_or_default();
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            base, self.config.model, key
        );

        let request = Request {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::provider(
                "google",
                format!("HTTP {}: {}", status, body),
            ));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| Error::provider("google", e))?;

        result
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| Error::provider("google", "response contained no candidates"))
    }

    async fn complete_ollama(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
        }

        #[derive(Deserialize)]
        struct Response {
            response: String,
        }

        let base = self.config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        let url = format!("{}/api/generate", base);

        let resp = self
            .http
            .post(&url)
            .json(&Request {
                model: &self.config.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::provider(
                "ollama",
                format!("HTTP {}: {}", status, body),
            ));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| Error::provider("ollama", e))?;
        Ok(result.response)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout("generation", self.config.timeout_secs)
        } else {
            Error::provider(&self.config.provider, e)
        }
    }
}

/// Build the grounded instruction sent to the model: exact count, exact
/// record shape, JSON-array-only output, sequential IDs.
fn build_prompt(prompt: &str, context_snippets: &[String], count: usize) -> String {
    let context: String = context_snippets
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are an expert test case generator.

Based on the given user prompt and the related context from a document, generate exactly {count} test cases in valid JSON format. Follow this strict format exactly:

[
  {{
    "testcaseID": "TC-001",
    "description": "Brief description of what is being tested.",
    "steps": ["Step 1", "Step 2", "Step 3"],
    "expectedResults": "Expected outcome of the test.",
    "priority": "High/Medium/Low"
  }}
]

Strict rules:
- Return exactly {count} test cases.
- Only return a valid JSON array.
- Do NOT include any explanations, markdown, or comments.
- Use meaningful and unique test case IDs like TC-001, TC-002, etc.
- Ensure all test cases are relevant to the prompt and context.

---

User Prompt:
{prompt}

---

Context:
{context}"#
    )
}

/// Remove a wrapping markdown code fence (```` ``` ```` or ```` ```json ````)
/// if the model added one.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the fence's info string (e.g. "json") up to the first newline.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse and validate the model's raw output into test cases.
///
/// Fails with `MalformedOutput` when the payload is not a JSON array, and
/// with `SchemaValidation` listing every offending index when any element
/// fails shape validation.
pub fn parse_test_cases(raw: &str) -> Result<Vec<TestCase>> {
    let payload = strip_code_fences(raw);

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::MalformedOutput(format!("output is not valid JSON: {}", e)))?;
    let items = value
        .as_array()
        .ok_or_else(|| Error::MalformedOutput("output is not a JSON array".to_string()))?;

    let mut cases = Vec::with_capacity(items.len());
    let mut bad_indices = Vec::new();
    let mut first_problem = None;

    for (i, item) in items.iter().enumerate() {
        match validate_case(item) {
            Ok(case) => cases.push(case),
            Err(problem) => {
                if first_problem.is_none() {
                    first_problem = Some(format!("element {}: {}", i, problem));
                }
                bad_indices.push(i);
            }
        }
    }

    if !bad_indices.is_empty() {
        return Err(Error::SchemaValidation {
            message: first_problem.unwrap_or_else(|| "invalid test case".to_string()),
            indices: bad_indices,
        });
    }

    Ok(cases)
}

fn validate_case(value: &Value) -> std::result::Result<TestCase, String> {
    let case: TestCase =
        serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;

    if case.testcase_id.trim().is_empty() {
        return Err("testcaseID must not be empty".to_string());
    }
    if case.description.trim().is_empty() {
        return Err("description must not be empty".to_string());
    }
    if case.steps.is_empty() {
        return Err("steps must not be empty".to_string());
    }
    if case.steps.iter().any(|s| s.trim().is_empty()) {
        return Err("steps must not contain empty entries".to_string());
    }
    if case.expected_results.trim().is_empty() {
        return Err("expectedResults must not be empty".to_string());
    }

    Ok(case)
}
