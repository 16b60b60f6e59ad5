use data_model_sja::SchemaError;

/// Errors raised while analyzing a job script.
#[derive(Debug)]
pub enum Error {
    /// The chat-completions call itself failed (connection refused, HTTP error, bad model name).
    ModelInvocation(async_openai::error::OpenAIError),

    /// The model service answered but produced no usable completion.
    ModelUnavailable(String),

    /// Model output did not conform to the result schema, even after repair.
    SchemaValidation(SchemaError),

    /// Internal error: the declared result fields disagree with `ScriptInfo`.
    InvalidSchema(SchemaError),

    /// Internal error: prompt substitution failed.
    PromptCreationFailure(subst::Error),
}

impl Error {
    /// True for failures of the model service, as opposed to bad output from a working model.
    pub fn is_model_failure(&self) -> bool {
        matches!(self, Error::ModelInvocation(_) | Error::ModelUnavailable(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ModelInvocation(err) => write!(f, "Error calling model: {}", err),
            Error::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            Error::SchemaValidation(err) => write!(f, "Schema validation failed: {}", err),
            Error::InvalidSchema(err) => write!(f, "Invalid result schema: {}", err),
            Error::PromptCreationFailure(err) => write!(f, "Failed to create prompt: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<async_openai::error::OpenAIError> for Error {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Error::ModelInvocation(err)
    }
}

impl From<subst::Error> for Error {
    fn from(err: subst::Error) -> Self {
        Error::PromptCreationFailure(err)
    }
}

/// Parsing model output is the only place a `SchemaError` arises at runtime.
impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::SchemaValidation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_failures_are_classified() {
        assert!(Error::ModelUnavailable("no choices".to_string()).is_model_failure());
        assert!(
            Error::ModelInvocation(async_openai::error::OpenAIError::InvalidArgument("bad".to_string()))
                .is_model_failure()
        );
        assert!(!Error::SchemaValidation(SchemaError::NoJsonFound).is_model_failure());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::SchemaValidation(SchemaError::NoJsonFound).to_string(),
            "Schema validation failed: Model output does not contain a JSON object"
        );
        assert_eq!(
            Error::ModelUnavailable("empty completion".to_string()).to_string(),
            "Model unavailable: empty completion"
        );
    }
}
