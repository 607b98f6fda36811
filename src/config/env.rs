use std::fmt::Display;
use std::str::FromStr;

use zeroize::Zeroizing;

use super::merge::PartialConfig;

pub const ENV_SERVICE_URL: &str = "IBM_WATSON_STT_URL";
pub const ENV_INSTANCE_ID: &str = "IBM_WATSON_INSTANCE_ID";
pub const ENV_REGION: &str = "IBM_WATSON_REGION";
pub const ENV_API_KEY: &str = "IBM_WATSON_API_KEY";
pub const ENV_USERNAME: &str = "IBM_WATSON_USERNAME";
pub const ENV_PASSWORD: &str = "IBM_WATSON_PASSWORD";
pub const ENV_BEARER_TOKEN: &str = "IBM_WATSON_BEARER_TOKEN";
pub const ENV_LEARNING_OPT_OUT: &str = "IBM_WATSON_LEARNING_OPT_OUT";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "IBM_WATSON_CONNECT_TIMEOUT_SECS";
pub const ENV_INACTIVITY_TIMEOUT_SECS: &str = "IBM_WATSON_INACTIVITY_TIMEOUT_SECS";
pub const ENV_MALFORMED_FRAMES: &str = "IBM_WATSON_MALFORMED_FRAMES";
pub const ENV_AUDIO_CHUNK_SIZE: &str = "IBM_WATSON_AUDIO_CHUNK_SIZE";

/// Every variable read by [`from_env`].
pub const ALL_VARS: [&str; 12] = [
    ENV_SERVICE_URL,
    ENV_INSTANCE_ID,
    ENV_REGION,
    ENV_API_KEY,
    ENV_USERNAME,
    ENV_PASSWORD,
    ENV_BEARER_TOKEN,
    ENV_LEARNING_OPT_OUT,
    ENV_CONNECT_TIMEOUT_SECS,
    ENV_INACTIVITY_TIMEOUT_SECS,
    ENV_MALFORMED_FRAMES,
    ENV_AUDIO_CHUNK_SIZE,
];

pub(crate) fn from_env() -> Result<PartialConfig, Box<dyn std::error::Error>> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Build a partial configuration from `lookup`. Empty values count as unset.
pub(crate) fn from_lookup<F>(lookup: F) -> Result<PartialConfig, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let secret = |name: &str| get(name).map(Zeroizing::new);

    Ok(PartialConfig {
        service_url: get(ENV_SERVICE_URL),
        instance_id: get(ENV_INSTANCE_ID),
        region: get(ENV_REGION),
        api_key: secret(ENV_API_KEY),
        username: get(ENV_USERNAME),
        password: secret(ENV_PASSWORD),
        bearer_token: secret(ENV_BEARER_TOKEN),
        learning_opt_out: get(ENV_LEARNING_OPT_OUT)
            .map(|v| parse_bool(ENV_LEARNING_OPT_OUT, &v))
            .transpose()?,
        headers: None,
        connect_timeout_secs: get(ENV_CONNECT_TIMEOUT_SECS)
            .map(|v| parse_number(ENV_CONNECT_TIMEOUT_SECS, &v))
            .transpose()?,
        inactivity_timeout_secs: get(ENV_INACTIVITY_TIMEOUT_SECS)
            .map(|v| parse_number(ENV_INACTIVITY_TIMEOUT_SECS, &v))
            .transpose()?,
        malformed_frames: get(ENV_MALFORMED_FRAMES),
        audio_chunk_size: get(ENV_AUDIO_CHUNK_SIZE)
            .map(|v| parse_number(ENV_AUDIO_CHUNK_SIZE, &v))
            .transpose()?,
        audio_buffer: None,
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("Invalid boolean value for {name}: '{value}'")),
    }
}

fn parse_number<T>(name: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse::<T>()
        .map_err(|e| format!("Invalid value for {name}: '{value}' ({e})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_reads_all_fields() {
        let partial = from_lookup(lookup(&[
            (ENV_INSTANCE_ID, "inst"),
            (ENV_REGION, "eu-gb"),
            (ENV_API_KEY, "key"),
            (ENV_LEARNING_OPT_OUT, "yes"),
            (ENV_CONNECT_TIMEOUT_SECS, "12"),
            (ENV_INACTIVITY_TIMEOUT_SECS, "45"),
            (ENV_MALFORMED_FRAMES, "skip"),
            (ENV_AUDIO_CHUNK_SIZE, "4096"),
        ]))
        .unwrap();

        assert_eq!(partial.instance_id.as_deref(), Some("inst"));
        assert_eq!(partial.region.as_deref(), Some("eu-gb"));
        assert_eq!(partial.api_key.as_deref().map(String::as_str), Some("key"));
        assert_eq!(partial.learning_opt_out, Some(true));
        assert_eq!(partial.connect_timeout_secs, Some(12));
        assert_eq!(partial.inactivity_timeout_secs, Some(45));
        assert_eq!(partial.malformed_frames.as_deref(), Some("skip"));
        assert_eq!(partial.audio_chunk_size, Some(4096));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let partial = from_lookup(lookup(&[(ENV_SERVICE_URL, "  "), (ENV_API_KEY, "")])).unwrap();
        assert!(partial.service_url.is_none());
        assert!(partial.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(from_lookup(lookup(&[(ENV_LEARNING_OPT_OUT, "maybe")])).is_err());
        assert!(from_lookup(lookup(&[(ENV_CONNECT_TIMEOUT_SECS, "-3")])).is_err());
        assert!(from_lookup(lookup(&[(ENV_AUDIO_CHUNK_SIZE, "big")])).is_err());
    }
}
