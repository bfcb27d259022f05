use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

const RANDOM_SUFFIX_LEN: usize = 9;

/// Generate a device id of the form `<platform>_<unix millis>_<random>`.
pub fn generate_device_id(platform: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}_{}_{}", platform, Utc::now().timestamp_millis(), suffix)
}
