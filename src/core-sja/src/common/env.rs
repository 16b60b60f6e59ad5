/// True if the environment variable is set to a non-blank value.
pub fn is_env_set(var_name: &str) -> bool {
    std::env::var(var_name).is_ok_and(|value| !value.trim().is_empty())
}

/// Reads an environment variable, treating blank values as unset.
pub fn env_lookup(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
