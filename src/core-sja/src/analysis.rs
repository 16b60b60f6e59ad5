//! Script analysis: one model call per script, then strict validation of its output
//! with a bounded number of repair passes.

use data_model_sja::{ResultSchema, ScriptInfo};

use crate::Error;
use crate::common::LlmConfig;
use crate::llms::{ChatModel, LlmProvider, prompt_analyze_script, prompt_repair_output};

/// How many times unparseable model output is sent back for repair before the job is failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairPolicy {
    pub max_attempts: u32,
}

impl RepairPolicy {
    /// Fail on the first unparseable output.
    pub const NONE: RepairPolicy = RepairPolicy { max_attempts: 0 };
    /// One repair pass.
    pub const SINGLE: RepairPolicy = RepairPolicy { max_attempts: 1 };
}

impl Default for RepairPolicy {
    fn default() -> Self {
        RepairPolicy::SINGLE
    }
}

/// Renders the analysis prompt for `script_text` and returns the model's raw completion.
/// Model failures propagate unchanged; nothing is retried here.
pub async fn analyze<P: LlmProvider + ?Sized>(
    provider: &P,
    schema: &ResultSchema,
    script_text: &str,
) -> Result<String, Error> {
    let prompt = prompt_analyze_script(schema.format_instructions(), script_text)?;
    provider.complete_prompt(&prompt).await
}

/// Strictly parses `raw_output`. Output that fails to parse goes to `repair_provider`
/// up to `policy.max_attempts` times; each repaired completion is parsed again.
/// When every attempt fails the last parse error is returned as `Error::SchemaValidation`.
pub async fn validate<R: LlmProvider + ?Sized>(
    repair_provider: &R,
    schema: &ResultSchema,
    policy: RepairPolicy,
    raw_output: &str,
) -> Result<ScriptInfo, Error> {
    let mut parse_error = match schema.parse(raw_output) {
        Ok(info) => return Ok(info),
        Err(e) => e,
    };

    let mut completion = raw_output.to_string();
    for attempt in 1..=policy.max_attempts {
        tracing::warn!(
            "Model output failed validation ({}), repair attempt {}/{}",
            parse_error,
            attempt,
            policy.max_attempts
        );

        let prompt = prompt_repair_output(schema.format_instructions(), &completion, &parse_error.to_string())?;
        completion = repair_provider.complete_prompt(&prompt).await?;

        match schema.parse(&completion) {
            Ok(info) => {
                tracing::info!("Fixed parsing errors on repair attempt {}", attempt);
                return Ok(info);
            }
            Err(e) => parse_error = e,
        }
    }

    Err(Error::SchemaValidation(parse_error))
}

/// Bundles the providers, the result schema and the repair policy a worker needs.
pub struct ScriptAnalyzer<P, R = P> {
    provider: P,
    repair_provider: R,
    schema: ResultSchema,
    policy: RepairPolicy,
}

impl ScriptAnalyzer<ChatModel, ChatModel> {
    /// Chat models for analysis and repair from one endpoint configuration.
    pub fn from_config(config: &LlmConfig, policy: RepairPolicy) -> Result<Self, Error> {
        let schema = ResultSchema::new().map_err(Error::InvalidSchema)?;
        Ok(ScriptAnalyzer::new(
            ChatModel::new(config),
            ChatModel::new(&config.for_repair()),
            schema,
            policy,
        ))
    }
}

impl<P: LlmProvider, R: LlmProvider> ScriptAnalyzer<P, R> {
    pub fn new(provider: P, repair_provider: R, schema: ResultSchema, policy: RepairPolicy) -> Self {
        ScriptAnalyzer {
            provider,
            repair_provider,
            schema,
            policy,
        }
    }

    pub async fn analyze(&self, script_text: &str) -> Result<String, Error> {
        analyze(&self.provider, &self.schema, script_text).await
    }

    pub async fn validate(&self, raw_output: &str) -> Result<ScriptInfo, Error> {
        validate(&self.repair_provider, &self.schema, self.policy, raw_output).await
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn repair_provider(&self) -> &R {
        &self.repair_provider
    }

    pub fn policy(&self) -> RepairPolicy {
        self.policy
    }
}
